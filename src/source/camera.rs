use super::{SourceError, SourceImage};
use crate::{config::CameraConfig, cv_utils};
use opencv::{core::Mat, prelude::*, videoio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    OpenCameraFailed(String),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(String),
}

impl From<opencv::Error> for CameraError {
    fn from(err: opencv::Error) -> Self {
        CameraError::ReadFrameFailed(err.to_string())
    }
}

pub trait CaptureDevice: Send {
    // `Ok(None)` means the device answered with no image.
    fn read_frame(&mut self) -> Result<Option<Mat>, CameraError>;

    fn release(&mut self);
}

pub trait CameraBackend: Send + Sync + 'static {
    fn open(&self, index: i32) -> Result<Box<dyn CaptureDevice>, CameraError>;
}

struct DeviceGuard {
    device: Box<dyn CaptureDevice>,
}

impl DeviceGuard {
    fn read_frame(&mut self) -> Result<Option<Mat>, CameraError> {
        self.device.read_frame()
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.device.release();
    }
}

pub fn capture_still(
    backend: &dyn CameraBackend,
    camera_config: &CameraConfig,
) -> Result<SourceImage, SourceError> {
    let index = camera_config.device_index;
    let device = backend.open(index).map_err(|e| {
        tracing::error!("Failed to open camera {}: {:?}", index, e);
        SourceError::DeviceUnavailable {
            index,
            reason: e.to_string(),
        }
    })?;

    let frame = {
        let mut guard = DeviceGuard { device };
        guard.read_frame()
    };

    let frame = match frame {
        Ok(Some(frame)) if !frame.empty() => frame,
        Ok(_) => return Err(SourceError::CaptureFailed("empty frame".into())),
        Err(e) => return Err(SourceError::CaptureFailed(e.to_string())),
    };

    let canvas = cv_utils::resize(&frame, camera_config.width, camera_config.height)
        .map_err(|e| SourceError::CaptureFailed(e.to_string()))?;
    let pixels =
        cv_utils::to_rgb_image(&canvas).map_err(|e| SourceError::CaptureFailed(e.to_string()))?;
    let jpeg =
        cv_utils::encode_jpg(&canvas).map_err(|e| SourceError::CaptureFailed(e.to_string()))?;

    Ok(SourceImage {
        pixels,
        canvas,
        jpeg,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvCamera;

struct OpenCvDevice {
    capture: videoio::VideoCapture,
}

impl CameraBackend for OpenCvCamera {
    fn open(&self, index: i32) -> Result<Box<dyn CaptureDevice>, CameraError> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|e| CameraError::OpenCameraFailed(e.to_string()))?;
        let opened = capture
            .is_opened()
            .map_err(|e| CameraError::OpenCameraFailed(e.to_string()))?;
        if !opened {
            return Err(CameraError::OpenCameraFailed(format!(
                "device {} is not available",
                index
            )));
        }
        tracing::debug!("Opened camera {}", index);
        Ok(Box::new(OpenCvDevice { capture }))
    }
}

impl CaptureDevice for OpenCvDevice {
    fn read_frame(&mut self) -> Result<Option<Mat>, CameraError> {
        let mut frame = Mat::default();
        if self.capture.read(&mut frame)? && !frame.empty() {
            return Ok(Some(frame));
        }
        Ok(None)
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("Failed to release camera: {:?}", e);
        }
    }
}
