use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::models::{AttemptRecord, AttemptStatus};

use super::AttemptJournal;

fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

fn parse_status(value: &str) -> Result<AttemptStatus> {
    match value {
        "Scanning" => Ok(AttemptStatus::Scanning),
        "Counting" => Ok(AttemptStatus::Counting),
        "NoMatch" => Ok(AttemptStatus::NoMatch),
        "Cancelled" => Ok(AttemptStatus::Cancelled),
        "Superseded" => Ok(AttemptStatus::Superseded),
        "Marked" => Ok(AttemptStatus::Marked),
        "AlreadyMarked" => Ok(AttemptStatus::AlreadyMarked),
        "Closed" => Ok(AttemptStatus::Closed),
        "Failed" => Ok(AttemptStatus::Failed),
        "Interrupted" => Ok(AttemptStatus::Interrupted),
        other => Err(anyhow!("unknown attempt status {other}")),
    }
}

fn row_to_attempt(row: &Row) -> Result<AttemptRecord> {
    let status: String = row.get("status")?;
    let started_at: String = row.get("started_at")?;
    let finished_at: Option<String> = row.get("finished_at")?;

    Ok(AttemptRecord {
        id: row.get("id")?,
        field: row.get("field")?,
        course: row.get("course")?,
        status: parse_status(&status)?,
        user_id: row.get("user_id")?,
        display_name: row.get("display_name")?,
        message: row.get("message")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        finished_at: finished_at
            .map(|raw| parse_datetime(&raw, "finished_at"))
            .transpose()?,
    })
}

impl AttemptJournal {
    pub async fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        let record = attempt.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO attempts (id, field, course, status, user_id, display_name, message, started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.field,
                    record.course,
                    record.status.as_str(),
                    record.user_id,
                    record.display_name,
                    record.message,
                    record.started_at.to_rfc3339(),
                    record.finished_at.as_ref().map(|dt| dt.to_rfc3339()),
                ],
            )
            .with_context(|| "failed to insert attempt")?;
            Ok(())
        })
        .await
    }

    /// Records the latest status of an attempt. Terminal statuses also stamp
    /// `finished_at`.
    pub async fn update_attempt(
        &self,
        attempt_id: &str,
        status: AttemptStatus,
        user_id: Option<String>,
        display_name: Option<String>,
        message: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let attempt_id = attempt_id.to_string();
        let finished_at = status.is_terminal().then(|| updated_at.to_rfc3339());
        self.execute(move |conn| {
            conn.execute(
                "UPDATE attempts
                 SET status = ?1,
                     user_id = COALESCE(?2, user_id),
                     display_name = COALESCE(?3, display_name),
                     message = COALESCE(?4, message),
                     finished_at = COALESCE(?5, finished_at)
                 WHERE id = ?6",
                params![
                    status.as_str(),
                    user_id,
                    display_name,
                    message,
                    finished_at,
                    attempt_id,
                ],
            )
            .with_context(|| "failed to update attempt")?;
            Ok(())
        })
        .await
    }

    pub async fn get_attempt(&self, attempt_id: &str) -> Result<Option<AttemptRecord>> {
        let attempt_id = attempt_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, field, course, status, user_id, display_name, message, started_at, finished_at
                 FROM attempts WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![attempt_id])?;
            match rows.next()? {
                Some(row) => row_to_attempt(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn recent_attempts(&self, limit: u32) -> Result<Vec<AttemptRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, field, course, status, user_id, display_name, message, started_at, finished_at
                 FROM attempts
                 ORDER BY started_at DESC
                 LIMIT ?1",
            )?;
            let mut rows = stmt.query(params![limit])?;
            let mut attempts = Vec::new();
            while let Some(row) = rows.next()? {
                attempts.push(row_to_attempt(row)?);
            }
            Ok(attempts)
        })
        .await
    }
}

/// Marks attempts a previous run left mid-flight as `Interrupted`.
/// Runs on the journal thread while it opens.
pub(super) fn mark_interrupted(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    conn.execute(
        "UPDATE attempts
         SET status = ?1,
             finished_at = ?2
         WHERE status IN (?3, ?4)",
        params![
            AttemptStatus::Interrupted.as_str(),
            now.to_rfc3339(),
            AttemptStatus::Scanning.as_str(),
            AttemptStatus::Counting.as_str(),
        ],
    )
    .context("failed to recover incomplete attempts")
}
