use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    #[serde(default = "default_onnx_file")]
    pub onnx_file: String,
    #[serde(default = "default_labels_file")]
    pub labels_file: String,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_min_probability")]
    pub min_probability: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_onnx_file() -> String {
    "best.onnx".into()
}

fn default_labels_file() -> String {
    "labels.txt".into()
}

fn default_input_size() -> u32 {
    640
}

fn default_min_probability() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.7
}

fn default_max_detections() -> usize {
    300
}

impl ModelConfig {
    pub fn get_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    pub fn get_labels_path(&self) -> PathBuf {
        self.model_dir.join(&self.labels_file)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            onnx_file: default_onnx_file(),
            labels_file: default_labels_file(),
            input_size: default_input_size(),
            min_probability: default_min_probability(),
            iou_threshold: default_iou_threshold(),
            max_detections: default_max_detections(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: i32,
    #[serde(default = "default_capture_width")]
    pub width: i32,
    #[serde(default = "default_capture_height")]
    pub height: i32,
}

fn default_capture_width() -> i32 {
    640
}

fn default_capture_height() -> i32 {
    480
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_capture_width(),
            height: default_capture_height(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub save_annotated: bool,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            save_annotated: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("TV")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    config.try_deserialize::<Config>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize::<Config>()
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse(
            r#"
server:
  host: 127.0.0.1
  port: 8501
log_level: info
model:
  model_dir: models
"#,
        )
        .unwrap();

        assert_eq!(config.server.get_address(), "127.0.0.1:8501");
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(
            config.model.get_model_path(),
            PathBuf::from("models/best.onnx")
        );
        assert_eq!(
            config.model.get_labels_path(),
            PathBuf::from("models/labels.txt")
        );
        assert_eq!(config.model.input_size, 640);
        assert_eq!(config.camera.device_index, 0);
        assert_eq!((config.camera.width, config.camera.height), (640, 480));
        assert!(!config.output.save_annotated);
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let result = parse(
            r#"
server:
  host: 0.0.0.0
  port: 8501
log_level: trace
model: {}
"#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_environment_parsing() {
        let env: Environment = "Production".to_string().try_into().unwrap();
        assert_eq!(env.as_str(), "production");
        assert!(Environment::try_from("staging".to_string()).is_err());
    }
}
