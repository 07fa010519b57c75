use crate::server::SharedState;
use axum::{extract::State, response::Json};

pub async fn labels(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(
        state
            .detector
            .labels()
            .iter()
            .map(|color_label| color_label.label.clone())
            .collect(),
    )
}
