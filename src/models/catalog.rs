use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

use super::CaptureContext;

/// Courses offered under each field. A course is only selectable once its
/// field is chosen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CourseCatalog(BTreeMap<String, Vec<String>>);

impl Default for CourseCatalog {
    fn default() -> Self {
        Self::from_pairs([
            ("BTech", &["CSE", "Civil", "Mechanical"][..]),
            ("BCA", &["AI-ML", "Computer Applications", "Cyber Security"][..]),
            ("Nursing", &["General Nursing", "Pediatrics", "Psychiatric"][..]),
        ])
    }
}

impl CourseCatalog {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a [&'a str])>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(field, courses)| {
                    (
                        field.to_string(),
                        courses.iter().map(|c| c.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn courses(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Builds a context for a field/course pair this catalog offers.
    pub fn select(
        &self,
        field: &str,
        course: &str,
        delay_seconds: u32,
    ) -> Result<CaptureContext, WorkflowError> {
        let context = CaptureContext::new(field, course, delay_seconds)?;
        let Some(courses) = self.courses(field) else {
            return Err(WorkflowError::InvalidContext(format!(
                "unknown field '{field}'"
            )));
        };
        if !courses.iter().any(|offered| offered == course) {
            return Err(WorkflowError::InvalidContext(format!(
                "'{course}' is not offered under {field}"
            )));
        }
        Ok(context)
    }
}
