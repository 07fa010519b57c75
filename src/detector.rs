use crate::detection::{BoundingBox, ColorLabel, Detection};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array, ArrayViewD, Axis, Ix2, Ix4};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Inference failed: {0}")]
    Inference(String),
}

pub trait Detector: Send + Sync + 'static {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectError>;

    fn labels(&self) -> &[ColorLabel];
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    pub input_size: u32,
    pub min_probability: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

pub fn transform_image(image: &DynamicImage, size: u32) -> Array<f32, Ix4> {
    let img = image
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    let mut input = Array::zeros((1, 3, size as usize, size as usize));
    for (x, y, pixel) in img.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

// Output is `[1, 4 + classes, anchors]`; boxes come back in source pixels.
pub fn decode_output(
    output: ArrayViewD<'_, f32>,
    img_width: u32,
    img_height: u32,
    params: &DecodeParams,
    labels: &[ColorLabel],
) -> Result<Vec<Detection>, DetectError> {
    let shape = output.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
        return Err(DetectError::Inference(format!(
            "unexpected output shape {:?}",
            shape
        )));
    }

    let output = output
        .index_axis(Axis(0), 0)
        .into_dimensionality::<Ix2>()
        .map_err(|e| DetectError::Inference(format!("invalid output tensor: {}", e)))?;

    let scale_x = img_width as f32 / params.input_size as f32;
    let scale_y = img_height as f32 / params.input_size as f32;

    let mut candidates = Vec::new();
    for column in output.axis_iter(Axis(1)) {
        let Some((class_id, prob)) = column
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
        else {
            continue;
        };

        if prob.is_nan() || prob < params.min_probability {
            continue;
        }

        let bbox = BoundingBox::from_center(
            column[0] * scale_x,
            column[1] * scale_y,
            column[2] * scale_x,
            column[3] * scale_y,
        )
        .clamp_to(img_width as f32, img_height as f32);

        candidates.push((class_id, prob, bbox));
    }

    let kept = non_max_suppression(candidates, params.iou_threshold, params.max_detections);

    Ok(kept
        .into_iter()
        .map(|(class_id, prob, bbox)| Detection::labelled(class_id, prob, bbox, labels))
        .collect())
}

fn non_max_suppression(
    mut boxes: Vec<(usize, f32, BoundingBox)>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<(usize, f32, BoundingBox)> {
    boxes.sort_by(|box1, box2| box2.1.total_cmp(&box1.1));

    let mut result: Vec<(usize, f32, BoundingBox)> = Vec::new();
    for candidate in boxes {
        if result.len() >= max_detections {
            break;
        }
        if result
            .iter()
            .all(|kept| kept.2.iou(&candidate.2) < iou_threshold)
        {
            result.push(candidate);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::LabelColor;
    use image::{ImageBuffer, Rgb};
    use ndarray::Array3;

    fn labels() -> Vec<ColorLabel> {
        ["car", "person"]
            .iter()
            .map(|name| ColorLabel {
                label: name.to_string(),
                color: LabelColor::FALLBACK,
            })
            .collect()
    }

    fn params() -> DecodeParams {
        DecodeParams {
            input_size: 640,
            min_probability: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }

    fn raw_output(anchors: &[[f32; 6]]) -> Array3<f32> {
        let mut output = Array3::zeros((1, 6, anchors.len()));
        for (i, anchor) in anchors.iter().enumerate() {
            for (row, value) in anchor.iter().enumerate() {
                output[[0, row, i]] = *value;
            }
        }
        output
    }

    #[test]
    fn test_transform_image() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 50, Rgb([255, 0, 0]));
        let input = transform_image(&DynamicImage::ImageRgb8(img), 640);

        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert_eq!(input[[0, 0, 10, 10]], 1.0);
        assert_eq!(input[[0, 1, 10, 10]], 0.0);
    }

    #[test]
    fn test_decode_output_scales_and_labels() {
        let output = raw_output(&[
            [320., 320., 64., 64., 0.91, 0.02],
            [100., 100., 20., 40., 0.10, 0.78],
            [500., 500., 10., 10., 0.05, 0.10],
        ]);

        let detections =
            decode_output(output.view().into_dyn(), 1280, 640, &params(), &labels()).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_name, "car");
        assert!((detections[0].confidence - 0.91).abs() < 1e-6);
        assert_eq!(detections[0].bbox.x_min, 576.);
        assert_eq!(detections[0].bbox.x_max, 704.);
        assert_eq!(detections[0].bbox.y_min, 288.);
        assert_eq!(detections[1].class_name, "person");
    }

    #[test]
    fn test_overlapping_boxes_are_suppressed() {
        let output = raw_output(&[
            [320., 320., 100., 100., 0.60, 0.0],
            [322., 320., 100., 100., 0.90, 0.0],
            [100., 100., 50., 50., 0.0, 0.50],
        ]);

        let detections =
            decode_output(output.view().into_dyn(), 640, 640, &params(), &labels()).unwrap();

        assert_eq!(detections.len(), 2);
        assert!((detections[0].confidence - 0.90).abs() < 1e-6);
        assert_eq!(detections[1].class_name, "person");
    }

    #[test]
    fn test_max_detections_caps_output() {
        let output = raw_output(&[
            [50., 50., 10., 10., 0.9, 0.0],
            [200., 200., 10., 10., 0.8, 0.0],
            [400., 400., 10., 10., 0.7, 0.0],
        ]);
        let params = DecodeParams {
            max_detections: 2,
            ..params()
        };

        let detections =
            decode_output(output.view().into_dyn(), 640, 640, &params, &labels()).unwrap();

        assert_eq!(detections.len(), 2);
    }

    #[test]
    fn test_nan_scores_are_discarded() {
        let output = raw_output(&[
            [320., 320., 64., 64., f32::NAN, 0.10],
            [100., 100., 20., 40., 0.10, 0.78],
        ]);

        let detections =
            decode_output(output.view().into_dyn(), 640, 640, &params(), &labels()).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_name, "person");
    }

    #[test]
    fn test_rejects_unexpected_shape() {
        let output = Array3::<f32>::zeros((1, 4, 10));

        let result = decode_output(output.view().into_dyn(), 640, 640, &params(), &labels());

        assert!(matches!(result, Err(DetectError::Inference(_))));
    }
}
