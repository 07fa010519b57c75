use super::ApiError;
use crate::{
    pipeline::{AnalysisReport, Flow},
    server::SharedState,
    source::{decode_upload, UploadedFile},
};
use axum::{
    extract::{Multipart, State},
    response::Json,
};
use tracing::instrument;

const IMAGE_FIELD: &str = "image";

#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisReport>, ApiError> {
    let file = read_image_field(&mut multipart).await?;
    tracing::debug!(
        "Received upload {:?} ({} bytes)",
        file.file_name,
        file.bytes.len()
    );

    let analysis = state
        .run_flow(Flow::Upload, move |_| decode_upload(&file))
        .await?;

    Ok(Json(AnalysisReport::from(analysis)))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Multipart(e.to_string()))?;

        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::Multipart(format!(
        "missing `{}` field",
        IMAGE_FIELD
    )))
}
