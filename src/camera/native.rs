use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
};

use async_trait::async_trait;
use log::{error, info, warn};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
    Camera,
};
use tokio::sync::oneshot;

use crate::error::WorkflowError;

use super::{CameraSource, RawFrame, StreamConstraints, VideoStream};

type FrameReply = oneshot::Sender<Result<RawFrame, String>>;

enum CameraCommand {
    Grab(FrameReply),
    Shutdown,
}

/// Device camera. The `nokhwa` handle lives on its own thread; frames are
/// requested over a channel.
pub struct NativeCamera {
    index: u32,
}

impl NativeCamera {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

fn open_camera(index: u32, constraints: StreamConstraints) -> Result<Camera, String> {
    let preferred = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(constraints.ideal_width, constraints.ideal_height),
            FrameFormat::MJPEG,
            30,
        ),
    ));

    let mut camera = match Camera::new(CameraIndex::Index(index), preferred) {
        Ok(camera) => camera,
        Err(err) => {
            warn!(
                "Camera {index} rejected {}x{}, falling back to device default: {err}",
                constraints.ideal_width, constraints.ideal_height
            );
            let fallback = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
            Camera::new(CameraIndex::Index(index), fallback)
                .map_err(|err| format!("camera {index}: {err}"))?
        }
    };

    camera
        .open_stream()
        .map_err(|err| format!("camera {index} stream: {err}"))?;
    Ok(camera)
}

fn grab(camera: &mut Camera) -> Result<RawFrame, String> {
    let buffer = camera.frame().map_err(|err| err.to_string())?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|err| err.to_string())?;
    Ok(RawFrame {
        width: decoded.width(),
        height: decoded.height(),
        rgb: decoded.into_raw(),
    })
}

#[async_trait]
impl CameraSource for NativeCamera {
    async fn acquire(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, WorkflowError> {
        let index = self.index;
        let (command_tx, command_rx) = mpsc::channel::<CameraCommand>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<String, String>>();

        let worker = thread::Builder::new()
            .name("scanmark-camera".into())
            .spawn(move || {
                let mut camera = match open_camera(index, constraints) {
                    Ok(camera) => camera,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                let description = format!(
                    "{} ({})",
                    camera.info().human_name(),
                    camera.camera_format()
                );
                if ready_tx.send(Ok(description)).is_err() {
                    error!("Camera readiness receiver dropped");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        CameraCommand::Grab(reply) => {
                            let _ = reply.send(grab(&mut camera));
                        }
                        CameraCommand::Shutdown => break,
                    }
                }

                if let Err(err) = camera.stop_stream() {
                    warn!("Failed to stop camera stream: {err}");
                }
                info!("Camera thread shutting down");
            })
            .map_err(|err| WorkflowError::DeviceUnavailable(err.to_string()))?;

        let description = ready_rx
            .await
            .map_err(|_| {
                WorkflowError::DeviceUnavailable("camera thread exited before opening".into())
            })?
            .map_err(WorkflowError::DeviceUnavailable)?;

        info!("Native camera opened: {description}");

        Ok(Box::new(NativeStream {
            description,
            sender: command_tx,
            worker: Some(worker),
        }))
    }
}

struct NativeStream {
    description: String,
    sender: mpsc::Sender<CameraCommand>,
    worker: Option<JoinHandle<()>>,
}

#[async_trait]
impl VideoStream for NativeStream {
    fn describe(&self) -> String {
        self.description.clone()
    }

    async fn frame(&mut self) -> Result<Option<RawFrame>, WorkflowError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(CameraCommand::Grab(reply_tx))
            .map_err(|_| WorkflowError::DeviceUnavailable("camera thread stopped".into()))?;

        reply_rx
            .await
            .map_err(|_| WorkflowError::DeviceUnavailable("camera thread stopped".into()))?
            .map(Some)
            .map_err(WorkflowError::CaptureFailed)
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            if self.sender.send(CameraCommand::Shutdown).is_err() {
                return;
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join camera thread: {join_err:?}");
            }
        }
    }
}
