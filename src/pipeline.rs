use crate::{
    config::OutputConfig,
    detection::Detection,
    detector::{DetectError, Detector},
    render::{self, RenderError, Rendering},
    source::{SourceError, SourceImage},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Upload,
    Capture,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Upload => "upload",
            Flow::Capture => "capture",
        }
    }

    pub fn download_name(&self) -> &'static str {
        match self {
            Flow::Upload => "traffic_analysis.jpg",
            Flow::Capture => "live_traffic_analysis.jpg",
        }
    }
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Inference(#[from] DetectError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl FlowError {
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::Source(SourceError::UnsupportedFormat(_)) => "UnsupportedFormat",
            FlowError::Source(SourceError::Decode(_)) => "DecodeError",
            FlowError::Source(SourceError::DeviceUnavailable { .. }) => "DeviceUnavailable",
            FlowError::Source(SourceError::CaptureFailed(_)) => "CaptureFailed",
            FlowError::Inference(_) => "InferenceError",
            FlowError::Render(_) => "RenderError",
        }
    }
}

#[derive(Debug)]
pub struct Analysis {
    pub flow: Flow,
    pub detections: Vec<Detection>,
    pub rendering: Rendering,
    pub original_jpeg: Vec<u8>,
    pub saved_to: Option<PathBuf>,
    pub save_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub source: Flow,
    pub detections: Vec<Detection>,
    pub lines: Vec<String>,
    pub original: String,
    pub annotated: String,
    pub download_name: &'static str,
    pub saved_to: Option<String>,
    pub save_error: Option<String>,
}

impl From<Analysis> for AnalysisReport {
    fn from(analysis: Analysis) -> Self {
        Self {
            source: analysis.flow,
            detections: analysis.detections,
            lines: analysis.rendering.lines,
            original: jpeg_data_url(&analysis.original_jpeg),
            annotated: jpeg_data_url(&analysis.rendering.annotated_jpeg),
            download_name: analysis.flow.download_name(),
            saved_to: analysis.saved_to.map(|p| p.display().to_string()),
            save_error: analysis.save_error,
        }
    }
}

fn jpeg_data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

pub fn analyze(
    detector: &dyn Detector,
    image: SourceImage,
    flow: Flow,
    output: &OutputConfig,
) -> Result<Analysis, FlowError> {
    let detections = detector.detect(&image.pixels)?;
    let rendering = render::render(&image, &detections)?;

    let (saved_to, save_error) = if output.save_annotated {
        match save_annotated(output, flow, &rendering.annotated_jpeg) {
            Ok(path) => (Some(path), None),
            Err(e) => {
                tracing::error!("Failed to save annotated image: {}", e);
                (None, Some(e))
            }
        }
    } else {
        (None, None)
    };

    Ok(Analysis {
        flow,
        detections,
        rendering,
        original_jpeg: image.jpeg,
        saved_to,
        save_error,
    })
}

fn save_annotated(output: &OutputConfig, flow: Flow, jpeg: &[u8]) -> Result<PathBuf, String> {
    let path = output
        .directory
        .join(format!("{}_{}.jpg", flow.as_str(), uuid::Uuid::new_v4()));

    std::fs::create_dir_all(&output.directory)
        .and_then(|_| std::fs::write(&path, jpeg))
        .map_err(|e| format!("could not write {}: {}", path.display(), e))?;

    tracing::debug!("Saved annotated image to {}", path.display());
    Ok(path)
}
