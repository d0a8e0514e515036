use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::Thresholds;
use crate::ingest::CaptureMode;

const DEFAULT_HOST: &str = "192.168.1.1";
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_RTSP_PORT: u16 = 554;
const DEFAULT_USERNAME: &str = "username";
const DEFAULT_PASSWORD: &str = "password";
const DEFAULT_CHANNEL: u32 = 2;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 500;
const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STOP_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_FIRST_FRAME_GRACE_MS: u64 = 10_000;
const DEFAULT_IDLE_POLL_MS: u64 = 1;
const DEFAULT_NETWORK_PATH: &str = "./yolo/yolo.onnx";
const DEFAULT_LABELS_PATH: &str = "./yolo/coco.names";
const DEFAULT_INPUT_SIZE: u32 = 320;
const DEFAULT_QUIT_KEY: char = 'q';

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "CAMWATCH_CONFIG";

/// On-disk settings. Every field is optional and resolved against the
/// defaults above. The flat NVR keys keep the historical `settings.json`
/// spelling (`ip`, `http-port`, ...).
#[derive(Debug, Deserialize, Serialize, Default)]
struct ConfigFile {
    #[serde(alias = "host", skip_serializing_if = "Option::is_none")]
    ip: Option<String>,
    #[serde(rename = "http-port", alias = "http_port", skip_serializing_if = "Option::is_none")]
    http_port: Option<NumberOrString>,
    #[serde(rename = "rtsp-port", alias = "rtsp_port", skip_serializing_if = "Option::is_none")]
    rtsp_port: Option<NumberOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<NumberOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    capture: Option<CaptureConfigFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<ModelConfigFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct CaptureConfigFile {
    mode: Option<String>,
    snapshot_interval_ms: Option<u64>,
    target_fps: Option<u32>,
    read_timeout_ms: Option<u64>,
    stop_timeout_ms: Option<u64>,
    first_frame_grace_ms: Option<u64>,
    idle_poll_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ModelConfigFile {
    network: Option<PathBuf>,
    weights: Option<PathBuf>,
    labels: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    objectness: Option<bool>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct DisplayConfigFile {
    output_dir: Option<PathBuf>,
    font_path: Option<PathBuf>,
    quit_key: Option<char>,
}

/// Older settings files store ports and channel numbers as strings.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

impl NumberOrString {
    fn parse<T: TryFrom<u64>>(&self, field: &str) -> Result<T> {
        let value = match self {
            NumberOrString::Number(n) => *n,
            NumberOrString::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("{} must be an integer, got '{}'", field, s))?,
        };
        T::try_from(value).map_err(|_| anyhow!("{} is out of range: {}", field, value))
    }
}

#[derive(Debug, Clone)]
pub struct CamwatchConfig {
    pub nvr: NvrSettings,
    pub capture: CaptureSettings,
    pub model: ModelSettings,
    pub display: DisplaySettings,
}

/// Connection parameters for the recorder that fronts all cameras.
#[derive(Debug, Clone)]
pub struct NvrSettings {
    pub host: String,
    pub http_port: u16,
    pub rtsp_port: u16,
    pub username: String,
    pub password: String,
    /// Stream channel suffix (`1` main stream, `2` sub stream).
    pub channel: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub mode: CaptureMode,
    /// Pacing for synthetic streams; `0` disables pacing.
    pub target_fps: u32,
    pub read_timeout: Duration,
    pub stop_timeout: Duration,
    pub first_frame_grace: Duration,
    pub idle_poll: Duration,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub network: PathBuf,
    pub weights: Option<PathBuf>,
    pub labels: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    pub objectness: bool,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub output_dir: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub quit_key: char,
}

impl CamwatchConfig {
    /// Load from `CAMWATCH_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit path, falling back to `CAMWATCH_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write a settings file populated with every default value.
    pub fn write_default(path: &Path) -> Result<()> {
        let file = ConfigFile {
            ip: Some(DEFAULT_HOST.to_string()),
            http_port: Some(NumberOrString::Number(DEFAULT_HTTP_PORT as u64)),
            rtsp_port: Some(NumberOrString::Number(DEFAULT_RTSP_PORT as u64)),
            username: Some(DEFAULT_USERNAME.to_string()),
            password: Some(DEFAULT_PASSWORD.to_string()),
            channel: Some(NumberOrString::Number(DEFAULT_CHANNEL as u64)),
            request_timeout_ms: Some(DEFAULT_REQUEST_TIMEOUT_MS),
            capture: Some(CaptureConfigFile {
                mode: Some("stream".to_string()),
                snapshot_interval_ms: Some(DEFAULT_SNAPSHOT_INTERVAL_MS),
                target_fps: Some(DEFAULT_TARGET_FPS),
                read_timeout_ms: Some(DEFAULT_READ_TIMEOUT_MS),
                stop_timeout_ms: Some(DEFAULT_STOP_TIMEOUT_MS),
                first_frame_grace_ms: Some(DEFAULT_FIRST_FRAME_GRACE_MS),
                idle_poll_ms: Some(DEFAULT_IDLE_POLL_MS),
            }),
            model: Some(ModelConfigFile {
                network: Some(PathBuf::from(DEFAULT_NETWORK_PATH)),
                weights: None,
                labels: Some(PathBuf::from(DEFAULT_LABELS_PATH)),
                input_width: Some(DEFAULT_INPUT_SIZE),
                input_height: Some(DEFAULT_INPUT_SIZE),
                objectness: Some(false),
                confidence_threshold: Some(Thresholds::default().confidence),
                iou_threshold: Some(Thresholds::default().iou),
            }),
            display: Some(DisplayConfigFile {
                output_dir: None,
                font_path: None,
                quit_key: Some(DEFAULT_QUIT_KEY),
            }),
        };
        let json = serde_json::to_string_pretty(&file).context("serialize default settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let nvr = NvrSettings {
            host: file.ip.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            http_port: match &file.http_port {
                Some(v) => v.parse("http-port")?,
                None => DEFAULT_HTTP_PORT,
            },
            rtsp_port: match &file.rtsp_port {
                Some(v) => v.parse("rtsp-port")?,
                None => DEFAULT_RTSP_PORT,
            },
            username: file.username.unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: file.password.unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            channel: match &file.channel {
                Some(v) => v.parse("channel")?,
                None => DEFAULT_CHANNEL,
            },
            request_timeout: Duration::from_millis(
                file.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
        };

        let capture_file = file.capture.unwrap_or_default();
        let snapshot_interval = Duration::from_millis(
            capture_file
                .snapshot_interval_ms
                .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_MS),
        );
        let mode = match capture_file.mode.as_deref() {
            None | Some("stream") => CaptureMode::Stream,
            Some("snapshot") => CaptureMode::Snapshot {
                interval: snapshot_interval,
            },
            Some(other) => {
                return Err(anyhow!(
                    "capture.mode must be 'stream' or 'snapshot', got '{}'",
                    other
                ))
            }
        };
        let capture = CaptureSettings {
            mode,
            target_fps: capture_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            read_timeout: Duration::from_millis(
                capture_file.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
            ),
            stop_timeout: Duration::from_millis(
                capture_file.stop_timeout_ms.unwrap_or(DEFAULT_STOP_TIMEOUT_MS),
            ),
            first_frame_grace: Duration::from_millis(
                capture_file
                    .first_frame_grace_ms
                    .unwrap_or(DEFAULT_FIRST_FRAME_GRACE_MS),
            ),
            idle_poll: Duration::from_millis(
                capture_file.idle_poll_ms.unwrap_or(DEFAULT_IDLE_POLL_MS),
            ),
        };

        let model_file = file.model.unwrap_or_default();
        let defaults = Thresholds::default();
        let model = ModelSettings {
            network: model_file
                .network
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NETWORK_PATH)),
            weights: model_file.weights,
            labels: model_file
                .labels
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH)),
            input_width: model_file.input_width.unwrap_or(DEFAULT_INPUT_SIZE),
            input_height: model_file.input_height.unwrap_or(DEFAULT_INPUT_SIZE),
            objectness: model_file.objectness.unwrap_or(false),
            thresholds: Thresholds {
                confidence: model_file
                    .confidence_threshold
                    .unwrap_or(defaults.confidence),
                iou: model_file.iou_threshold.unwrap_or(defaults.iou),
            },
        };

        let display_file = file.display.unwrap_or_default();
        let display = DisplaySettings {
            output_dir: display_file.output_dir,
            font_path: display_file.font_path,
            quit_key: display_file.quit_key.unwrap_or(DEFAULT_QUIT_KEY),
        };

        Ok(Self {
            nvr,
            capture,
            model,
            display,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(host) = non_empty_env("CAMWATCH_HOST") {
            self.nvr.host = host;
        }
        if let Some(username) = non_empty_env("CAMWATCH_USERNAME") {
            self.nvr.username = username;
        }
        if let Ok(password) = std::env::var("CAMWATCH_PASSWORD") {
            self.nvr.password = password;
        }
        if let Some(channel) = non_empty_env("CAMWATCH_CHANNEL") {
            self.nvr.channel = channel
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAMWATCH_CHANNEL must be an integer channel number"))?;
        }
        if let Some(network) = non_empty_env("CAMWATCH_MODEL") {
            self.model.network = PathBuf::from(network);
        }
        if let Some(labels) = non_empty_env("CAMWATCH_LABELS") {
            self.model.labels = PathBuf::from(labels);
        }
        if let Some(dir) = non_empty_env("CAMWATCH_OUTPUT_DIR") {
            self.display.output_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.nvr.host.trim().is_empty() {
            return Err(anyhow!("NVR host must not be empty"));
        }
        if self.nvr.http_port == 0 || self.nvr.rtsp_port == 0 {
            return Err(anyhow!("NVR ports must be greater than zero"));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        let t = self.model.thresholds;
        if !(0.0..=1.0).contains(&t.confidence) || !(0.0..=1.0).contains(&t.iou) {
            return Err(anyhow!(
                "detection thresholds must lie in [0, 1] (confidence={}, iou={})",
                t.confidence,
                t.iou
            ));
        }
        if self.capture.stop_timeout.is_zero() {
            return Err(anyhow!("capture.stop_timeout_ms must be greater than zero"));
        }
        if let CaptureMode::Snapshot { interval } = self.capture.mode {
            if interval.is_zero() {
                return Err(anyhow!(
                    "capture.snapshot_interval_ms must be greater than zero"
                ));
            }
        }
        if self.display.quit_key.is_whitespace() {
            return Err(anyhow!("display.quit_key must be a printable character"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_resolves_to_defaults() {
        let cfg = CamwatchConfig::from_file(ConfigFile::default()).unwrap();
        assert_eq!(cfg.nvr.host, DEFAULT_HOST);
        assert_eq!(cfg.nvr.http_port, 8080);
        assert_eq!(cfg.nvr.rtsp_port, 554);
        assert_eq!(cfg.nvr.channel, 2);
        assert_eq!(cfg.capture.mode, CaptureMode::Stream);
        assert_eq!(cfg.model.input_width, 320);
        assert_eq!(cfg.model.thresholds, Thresholds::default());
        assert_eq!(cfg.display.quit_key, 'q');
    }

    #[test]
    fn legacy_string_ports_are_accepted() {
        let file: ConfigFile = serde_json::from_str(
            r#"{"ip": "10.0.0.2", "http-port": "80", "rtsp-port": 8554, "channel": "1"}"#,
        )
        .unwrap();
        let cfg = CamwatchConfig::from_file(file).unwrap();
        assert_eq!(cfg.nvr.host, "10.0.0.2");
        assert_eq!(cfg.nvr.http_port, 80);
        assert_eq!(cfg.nvr.rtsp_port, 8554);
        assert_eq!(cfg.nvr.channel, 1);
    }

    #[test]
    fn rejects_non_numeric_port() {
        let file: ConfigFile = serde_json::from_str(r#"{"http-port": "eighty"}"#).unwrap();
        assert!(CamwatchConfig::from_file(file).is_err());
    }

    #[test]
    fn rejects_unknown_capture_mode() {
        let file: ConfigFile =
            serde_json::from_str(r#"{"capture": {"mode": "carrier-pigeon"}}"#).unwrap();
        assert!(CamwatchConfig::from_file(file).is_err());
    }

    #[test]
    fn snapshot_mode_carries_interval() {
        let file: ConfigFile = serde_json::from_str(
            r#"{"capture": {"mode": "snapshot", "snapshot_interval_ms": 250}}"#,
        )
        .unwrap();
        let cfg = CamwatchConfig::from_file(file).unwrap();
        assert_eq!(
            cfg.capture.mode,
            CaptureMode::Snapshot {
                interval: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn validate_rejects_out_of_range_thresholds() {
        let mut cfg = CamwatchConfig::from_file(ConfigFile::default()).unwrap();
        cfg.model.thresholds.iou = 1.5;
        assert!(cfg.validate().is_err());
    }
}
