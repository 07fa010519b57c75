use crate::{
    config::{CameraConfig, Config, OutputConfig},
    detector::Detector,
    pipeline::{analyze, Analysis, Flow, FlowError},
    routes::{api_routes, startup_failure_routes, ApiError},
    source::{CameraBackend, SourceError, SourceImage},
    telemetry::Metrics,
};
use axum::{extract::FromRef, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{sync::Arc, time::Instant};
use tokio::{
    net::TcpListener,
    sync::{broadcast::Receiver, Mutex},
    task::JoinHandle,
};

#[derive(Clone)]
pub struct SharedState {
    pub detector: Arc<dyn Detector>,
    pub camera: Arc<dyn CameraBackend>,
    pub camera_config: CameraConfig,
    pub output_config: OutputConfig,
    pub metrics: Arc<Metrics>,
    flow_lock: Arc<Mutex<()>>,
}

#[derive(Clone)]
pub struct StartupFailure {
    pub message: String,
    pub metrics: Arc<Metrics>,
}

impl FromRef<SharedState> for Arc<Metrics> {
    fn from_ref(state: &SharedState) -> Self {
        state.metrics.clone()
    }
}

impl FromRef<StartupFailure> for Arc<Metrics> {
    fn from_ref(state: &StartupFailure) -> Self {
        state.metrics.clone()
    }
}

impl SharedState {
    pub fn new(
        detector: Arc<dyn Detector>,
        camera: Arc<dyn CameraBackend>,
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            detector,
            camera,
            camera_config: config.camera.clone(),
            output_config: config.output.clone(),
            metrics,
            flow_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn run_flow<F>(&self, flow: Flow, acquire: F) -> Result<Analysis, ApiError>
    where
        F: FnOnce(&SharedState) -> Result<SourceImage, SourceError> + Send + 'static,
    {
        let route = flow.as_str();
        self.metrics.record_request(route);

        // Held until the blocking work ends, even if the request is dropped.
        let guard = self.flow_lock.clone().lock_owned().await;
        let started = Instant::now();

        let state = self.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<Analysis, FlowError> {
            let _guard = guard;
            let image = acquire(&state)?;
            analyze(state.detector.as_ref(), image, flow, &state.output_config)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("flow task failed: {}", e)))?;

        match result {
            Ok(analysis) => {
                self.metrics
                    .record_inference_duration(started.elapsed().as_millis() as u64, route);
                self.metrics
                    .record_detections(analysis.detections.len(), route);
                tracing::info!(
                    "{} flow finished with {} detections in {:?}",
                    route,
                    analysis.detections.len(),
                    started.elapsed()
                );
                Ok(analysis)
            }
            Err(e) => {
                self.metrics.record_failure(route, e.kind());
                tracing::error!("{} flow failed: {}", route, e);
                Err(ApiError::Flow(e))
            }
        }
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new().merge(api_routes()).with_state(state)
}

pub fn build_startup_failure_router(state: StartupFailure) -> Router {
    Router::new()
        .merge(startup_failure_routes())
        .with_state(state)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(router: Router, config: &Config) -> anyhow::Result<Self> {
        let addr = config.server.get_address();
        let metrics_layer = HttpMetricsLayerBuilder::new().build();

        let router = router.layer(metrics_layer);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}
