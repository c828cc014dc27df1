use async_trait::async_trait;

use crate::error::WorkflowError;

#[cfg(feature = "native-camera")]
pub mod native;
pub mod still;

#[cfg(feature = "native-camera")]
pub use native::NativeCamera;
pub use still::StillImageCamera;

pub const PREFERRED_WIDTH: u32 = 640;
pub const PREFERRED_HEIGHT: u32 = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Front camera, pointed at the person in front of the kiosk.
    User,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing: Facing::User,
            ideal_width: PREFERRED_WIDTH,
            ideal_height: PREFERRED_HEIGHT,
        }
    }
}

/// One decoded frame as packed RGB8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl RawFrame {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

#[async_trait]
pub trait VideoStream: Send {
    /// Human-readable description for the operator, e.g. the device name.
    fn describe(&self) -> String;

    /// Latest rendered frame, or `None` if nothing has been rendered yet.
    async fn frame(&mut self) -> Result<Option<RawFrame>, WorkflowError>;
}

#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Opens a live stream. Fails with `DeviceUnavailable` when there is no
    /// camera or access is denied; never retried automatically.
    async fn acquire(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, WorkflowError>;
}
