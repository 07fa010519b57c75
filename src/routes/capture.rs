use super::ApiError;
use crate::{
    pipeline::{AnalysisReport, Flow},
    server::SharedState,
    source::capture_still,
};
use axum::{extract::State, response::Json};
use tracing::instrument;

#[instrument(skip(state))]
pub async fn capture(
    State(state): State<SharedState>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let analysis = state
        .run_flow(Flow::Capture, |state| {
            capture_still(state.camera.as_ref(), &state.camera_config)
        })
        .await?;

    Ok(Json(AnalysisReport::from(analysis)))
}
