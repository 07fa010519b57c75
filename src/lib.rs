mod labels;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod cv_utils;
pub mod detection;
pub mod detector;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod source;

pub use app::start_app;
