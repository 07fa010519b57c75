mod camera;
mod upload;

pub use camera::{capture_still, CameraBackend, CameraError, CaptureDevice, OpenCvCamera};
pub use upload::{decode_upload, UploadedFile};

use image::DynamicImage;
use opencv::core::Mat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Unsupported image format: {0}. Supported formats are JPG, JPEG and PNG")]
    UnsupportedFormat(String),
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("Could not access webcam {index}: {reason}. Please check your camera permissions and ensure no other application is using the camera")]
    DeviceUnavailable { index: i32, reason: String },
    #[error("Could not capture image from webcam: {0}")]
    CaptureFailed(String),
}

pub struct SourceImage {
    pub pixels: DynamicImage,
    pub canvas: Mat,
    pub jpeg: Vec<u8>,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .field("jpeg_len", &self.jpeg.len())
            .finish()
    }
}
