use crate::config::Config;
use crate::model::ModelHandle;
use crate::server::{
    build_router, build_startup_failure_router, HttpServer, SharedState, StartupFailure,
};
use crate::source::OpenCvCamera;
use crate::telemetry::Metrics;

use axum::Router;
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let metrics = Arc::new(Metrics::new()?);
    let router = build_app_router(&config, metrics).await;

    let server = HttpServer::new(router, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn build_app_router(config: &Config, metrics: Arc<Metrics>) -> Router {
    match ModelHandle::shared(&config.model).await {
        Ok(model) => {
            let state = SharedState::new(model, Arc::new(OpenCvCamera), config, metrics);
            build_router(state)
        }
        Err(e) => {
            tracing::error!("Failed to load model: {}. Detection flows are disabled", e);
            build_startup_failure_router(StartupFailure {
                message: e.to_string(),
                metrics,
            })
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogLevel, ModelConfig, ServerConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_missing_model_serves_startup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            log_level: LogLevel::Info,
            model: ModelConfig {
                model_dir: dir.path().to_path_buf(),
                ..ModelConfig::default()
            },
            camera: Default::default(),
            output: Default::default(),
        };

        let app = build_app_router(&config, Arc::new(Metrics::new().unwrap())).await;

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("not found"));

        let response = app
            .oneshot(Request::post("/api/upload").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
