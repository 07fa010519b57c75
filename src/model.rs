use crate::{
    config::ModelConfig,
    detection::{ColorLabel, Detection},
    detector::{decode_output, transform_image, DecodeParams, DetectError, Detector},
    labels::load_labels,
};
use image::{DynamicImage, GenericImageView};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file '{}' not found", .0.display())]
    ModelNotFound(PathBuf),
    #[error("Error loading model: {0}")]
    ModelLoadError(String),
}

impl From<ort::Error> for ModelError {
    fn from(err: ort::Error) -> Self {
        ModelError::ModelLoadError(err.to_string())
    }
}

static SHARED_MODEL: OnceCell<Arc<ModelHandle>> = OnceCell::const_new();

pub struct ModelHandle {
    session: Mutex<Session>,
    labels: Vec<ColorLabel>,
    params: DecodeParams,
    path: PathBuf,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("path", &self.path)
            .field("classes", &self.labels.len())
            .field("params", &self.params)
            .finish()
    }
}

pub fn load_model(model_config: &ModelConfig) -> Result<ModelHandle, ModelError> {
    let model_path = model_config.get_model_path();
    if !model_path.exists() {
        return Err(ModelError::ModelNotFound(model_path));
    }

    let labels_path = model_config.get_labels_path();
    let labels = load_labels(&labels_path).map_err(|e| {
        ModelError::ModelLoadError(format!(
            "failed to load labels from {}: {}",
            labels_path.display(),
            e
        ))
    })?;

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(&model_path)?;

    tracing::info!(
        "Loaded model {} with {} classes",
        model_path.display(),
        labels.len()
    );

    Ok(ModelHandle {
        session: Mutex::new(session),
        labels,
        params: DecodeParams {
            input_size: model_config.input_size,
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
            max_detections: model_config.max_detections,
        },
        path: model_path,
    })
}

impl ModelHandle {
    pub async fn shared(model_config: &ModelConfig) -> Result<Arc<ModelHandle>, ModelError> {
        SHARED_MODEL
            .get_or_try_init(|| async {
                let model_config = model_config.clone();
                let model = tokio::task::spawn_blocking(move || load_model(&model_config))
                    .await
                    .map_err(|e| ModelError::ModelLoadError(e.to_string()))??;
                Ok::<_, ModelError>(Arc::new(model))
            })
            .await
            .cloned()
    }

    fn run_inference(
        &self,
        input: &Array<f32, Ix4>,
    ) -> Result<ndarray::ArrayD<f32>, DetectError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| DetectError::Inference(format!("session mutex poisoned: {}", e)))?;

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("failed to extract tensor: {}", e)))?;

        let ix = shape.to_ixdyn();
        ndarray::ArrayD::from_shape_vec(ix, data.to_vec())
            .map_err(|e| DetectError::Inference(format!("invalid tensor shape: {}", e)))
    }
}

impl Detector for ModelHandle {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectError> {
        let (img_width, img_height) = image.dimensions();
        let input = transform_image(image, self.params.input_size);

        let outputs = self.run_inference(&input)?;
        let detections = decode_output(
            outputs.view(),
            img_width,
            img_height,
            &self.params,
            &self.labels,
        )?;

        tracing::debug!("Returning {} detections", detections.len());
        for (i, detection) in detections.iter().enumerate() {
            tracing::debug!(
                "Detection {}: class={}, confidence={:.3}, bbox=({:.1}, {:.1}, {:.1}, {:.1})",
                i,
                detection.class_name,
                detection.confidence,
                detection.bbox.x_min,
                detection.bbox.y_min,
                detection.bbox.x_max,
                detection.bbox.y_max
            );
        }

        Ok(detections)
    }

    fn labels(&self) -> &[ColorLabel] {
        &self.labels
    }
}
