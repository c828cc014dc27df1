use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;

use crate::error::WorkflowError;

use super::{CameraSource, RawFrame, StreamConstraints, VideoStream};

/// Camera backed by an image file. The file is decoded again on every frame
/// so it can be swapped while the kiosk runs.
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

async fn load_frame(path: &Path) -> Result<RawFrame, String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let image = image::open(&path).map_err(|err| format!("{}: {err}", path.display()))?;
        let rgb = image.to_rgb8();
        Ok(RawFrame {
            width: rgb.width(),
            height: rgb.height(),
            rgb: rgb.into_raw(),
        })
    })
    .await
    .map_err(|err| format!("image decoder task failed: {err}"))?
}

#[async_trait]
impl CameraSource for StillImageCamera {
    async fn acquire(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, WorkflowError> {
        let frame = load_frame(&self.path)
            .await
            .map_err(WorkflowError::DeviceUnavailable)?;

        info!(
            "Still camera {} opened at {}x{} (requested {}x{})",
            self.path.display(),
            frame.width,
            frame.height,
            constraints.ideal_width,
            constraints.ideal_height
        );

        Ok(Box::new(StillImageStream {
            path: self.path.clone(),
        }))
    }
}

struct StillImageStream {
    path: PathBuf,
}

#[async_trait]
impl VideoStream for StillImageStream {
    fn describe(&self) -> String {
        format!("image file {}", self.path.display())
    }

    async fn frame(&mut self) -> Result<Option<RawFrame>, WorkflowError> {
        load_frame(&self.path)
            .await
            .map(Some)
            .map_err(WorkflowError::CaptureFailed)
    }
}
