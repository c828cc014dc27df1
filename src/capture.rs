use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType};

use crate::camera::{RawFrame, VideoStream};
use crate::error::WorkflowError;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

const DATA_URL_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

/// A still image encoded as a `data:image/...;base64,` URL. Only constructed
/// from a non-empty, decodable payload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload(String);

impl ImagePayload {
    pub fn from_data_url(data_url: impl Into<String>) -> Result<Self, WorkflowError> {
        let data_url = data_url.into();
        let rest = data_url
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| WorkflowError::CaptureFailed("payload is not an image data URL".into()))?;
        let (mime, body) = rest
            .split_once(BASE64_MARKER)
            .ok_or_else(|| WorkflowError::CaptureFailed("payload is not base64 encoded".into()))?;

        if mime.is_empty() {
            return Err(WorkflowError::CaptureFailed("payload has no image type".into()));
        }
        let bytes = STANDARD
            .decode(body)
            .map_err(|err| WorkflowError::CaptureFailed(format!("invalid base64: {err}")))?;
        if bytes.is_empty() {
            return Err(WorkflowError::CaptureFailed("payload is empty".into()));
        }

        Ok(Self(data_url))
    }

    pub fn from_jpeg(bytes: &[u8]) -> Result<Self, WorkflowError> {
        Self::from_data_url(format!(
            "{DATA_URL_PREFIX}jpeg{BASE64_MARKER}{}",
            STANDARD.encode(bytes)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or_default()
    }
}

// Payloads are large; keep logs readable.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime", &self.mime_type())
            .field("len", &self.0.len())
            .finish()
    }
}

/// Snapshots one frame of a live stream into a JPEG data URL.
#[derive(Debug, Clone, Copy)]
pub struct FrameCapturer {
    quality: u8,
}

impl Default for FrameCapturer {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameCapturer {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub async fn capture(
        &self,
        stream: &mut dyn VideoStream,
    ) -> Result<ImagePayload, WorkflowError> {
        let frame = stream
            .frame()
            .await?
            .ok_or_else(|| WorkflowError::CaptureFailed("camera has not rendered a frame yet".into()))?;
        self.encode(&frame)
    }

    pub fn encode(&self, frame: &RawFrame) -> Result<ImagePayload, WorkflowError> {
        validate_frame(frame)?;

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(&frame.rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|err| WorkflowError::CaptureFailed(format!("jpeg encoding failed: {err}")))?;

        ImagePayload::from_jpeg(&jpeg)
    }
}

fn validate_frame(frame: &RawFrame) -> Result<(), WorkflowError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(WorkflowError::CaptureFailed("frame has zero size".into()));
    }
    if frame.rgb.len() != frame.expected_len() {
        return Err(WorkflowError::CaptureFailed(format!(
            "frame buffer holds {} bytes, expected {}",
            frame.rgb.len(),
            frame.expected_len()
        )));
    }
    // A stream that has not started rendering yields an all-black canvas.
    if frame.rgb.iter().all(|&byte| byte == 0) {
        return Err(WorkflowError::CaptureFailed("frame is blank".into()));
    }
    Ok(())
}
