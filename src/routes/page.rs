use crate::server::StartupFailure;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn startup_error(State(state): State<StartupFailure>) -> impl IntoResponse {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Html(startup_error_page(&state.message)),
    )
}

fn startup_error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Traffic AI Vision</title></head>
<body style="font-family: sans-serif; max-width: 48rem; margin: 3rem auto;">
<h1>Traffic AI Vision</h1>
<p style="color: #b00020;"><strong>Model not loaded.</strong> {}</p>
<p>Place the exported ONNX model and its label file in the configured model directory and restart the server.</p>
</body>
</html>"#,
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
