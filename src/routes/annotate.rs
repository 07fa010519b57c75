use super::ApiError;
use crate::{
    pipeline::Flow,
    server::SharedState,
    source::{decode_upload, UploadedFile},
};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap},
    response::Response,
};
use tracing::instrument;

#[instrument(skip(state, headers, image_data))]
pub async fn annotate_image(
    State(state): State<SharedState>,
    headers: HeaderMap,
    image_data: Bytes,
) -> Result<Response, ApiError> {
    let mut file = UploadedFile::new(image_data.to_vec());
    if let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        file = file.with_content_type(content_type);
    }

    let analysis = state
        .run_flow(Flow::Upload, move |_| decode_upload(&file))
        .await?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                analysis.flow.download_name()
            ),
        )
        .body(Body::from(analysis.rendering.annotated_jpeg))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(response)
}
