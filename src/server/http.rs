use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::WorkflowError;

use super::{
    AttendanceServer, MarkRequest, MarkResponse, ScanRequest, ScanResponse,
    MARK_ATTENDANCE_PATH, SCAN_FACE_PATH,
};

/// `reqwest` client for the attendance server.
#[derive(Clone)]
pub struct HttpAttendanceServer {
    client: Client,
    base_url: Url,
}

impl HttpAttendanceServer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("invalid server url '{base_url}'"))?;
        // `join` replaces the last segment unless the path ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, WorkflowError> {
        self.base_url
            .join(path)
            .map_err(|err| WorkflowError::Network(format!("invalid endpoint {path}: {err}")))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<(StatusCode, R), WorkflowError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("POST {url}");

        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let parsed = serde_json::from_slice::<R>(&bytes);
        match parsed {
            Ok(value) => Ok((status, value)),
            Err(_) if !status.is_success() => {
                Err(WorkflowError::Network(format!("{path} returned HTTP {status}")))
            }
            Err(err) => Err(WorkflowError::Protocol(format!("{path}: {err}"))),
        }
    }
}

#[async_trait]
impl AttendanceServer for HttpAttendanceServer {
    async fn scan_face(&self, request: &ScanRequest) -> Result<ScanResponse, WorkflowError> {
        let (status, response): (StatusCode, ScanResponse) =
            self.post_json(SCAN_FACE_PATH, request).await?;

        if status == StatusCode::BAD_REQUEST && response.status == "bad-image" {
            return Err(WorkflowError::CaptureFailed(
                "server could not decode the image".into(),
            ));
        }
        if !status.is_success() {
            return Err(WorkflowError::Network(format!(
                "{SCAN_FACE_PATH} returned HTTP {status}"
            )));
        }
        Ok(response)
    }

    async fn mark_attendance(
        &self,
        request: &MarkRequest,
    ) -> Result<MarkResponse, WorkflowError> {
        let (status, response): (StatusCode, MarkResponse) =
            self.post_json(MARK_ATTENDANCE_PATH, request).await?;

        if !status.is_success() {
            return Err(WorkflowError::Network(format!(
                "{MARK_ATTENDANCE_PATH} returned HTTP {status}"
            )));
        }
        Ok(response)
    }
}
