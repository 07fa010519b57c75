use crate::{cv_utils, cv_utils::CvUtilsError, detection::Detection, source::SourceImage};
use opencv::{
    core::{Mat, Point, Rect, Scalar},
    imgproc,
    prelude::*,
};
use thiserror::Error;

pub const NO_OBJECTS_DETECTED: &str = "No objects detected";

const BOX_THICKNESS: i32 = 2;
const FONT_SCALE: f64 = 0.5;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to annotate image: {0}")]
    Annotate(#[from] opencv::Error),
    #[error("Failed to encode annotated image: {0}")]
    Encode(#[from] CvUtilsError),
}

#[derive(Debug, Clone)]
pub struct Rendering {
    pub annotated_jpeg: Vec<u8>,
    pub lines: Vec<String>,
}

/// Confidence as a percentage with two decimals, clamped to `[0.00, 100.00]`.
pub fn format_confidence(confidence: f32) -> String {
    let percent = if confidence.is_finite() {
        (confidence as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    format!("{:.2}%", percent)
}

pub fn describe(detections: &[Detection]) -> Vec<String> {
    if detections.is_empty() {
        return vec![NO_OBJECTS_DETECTED.to_string()];
    }

    detections
        .iter()
        .map(|d| format!("{} — {}", d.class_name, format_confidence(d.confidence)))
        .collect()
}

pub fn annotate(canvas: &Mat, detections: &[Detection]) -> Result<Mat, RenderError> {
    let mut mat = canvas.try_clone()?;

    for detection in detections {
        let bbox = &detection.bbox;
        let x1 = bbox.x_min as i32;
        let y1 = bbox.y_min as i32;
        let x2 = bbox.x_max as i32;
        let y2 = bbox.y_max as i32;
        let label = format!("{} {:.2}", detection.class_name, detection.confidence);

        let color = Scalar::new(
            detection.color.blue as f64,
            detection.color.green as f64,
            detection.color.red as f64,
            0.0,
        );

        imgproc::rectangle(
            &mut mat,
            Rect::new(x1, y1, (x2 - x1).max(1), (y2 - y1).max(1)),
            color,
            BOX_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;

        // Labels of boxes touching the top edge go inside the box.
        let baseline_y = if y1 > 12 { y1 - 5 } else { y1 + 15 };

        imgproc::put_text(
            &mut mat,
            &label,
            Point::new(x1, baseline_y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            FONT_SCALE,
            color,
            1,
            imgproc::LINE_AA,
            false,
        )?;
    }

    Ok(mat)
}

pub fn render(image: &SourceImage, detections: &[Detection]) -> Result<Rendering, RenderError> {
    let annotated = annotate(&image.canvas, detections)?;
    let annotated_jpeg = cv_utils::encode_jpg(&annotated)?;

    Ok(Rendering {
        annotated_jpeg,
        lines: describe(detections),
    })
}
