use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use ragchat_core::{Settings, UploadPolicy};
use ragchat_engine::{DocumentSettings, EngineSettings, ReconnectPolicy};
use ragchat_logging::chat_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LogDestination;
use super::ui::surfaces::SurfaceKind;

const MIN_RECONNECT_ATTEMPTS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of `ragchat.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub api_base_url: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub reconnect_delay_max_ms: u64,
    pub connect_timeout_secs: u64,
    pub heartbeat_secs: u64,
    pub query_timeout_secs: u64,
    pub completion_grace_ms: u64,
    pub hide_hold_ms: u64,
    pub hide_fade_ms: u64,
    pub upload_status_clear_ms: u64,
    pub upload_ramp_step: u8,
    pub upload_ramp_interval_ms: u64,
    pub upload_ramp_cap: u8,
    pub max_upload_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub upload_timeout_secs: u64,
    pub surfaces: Vec<SurfaceKind>,
    pub log_destination: LogDestination,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let settings = Settings::default();
        let reconnect = ReconnectPolicy::default();
        let documents = DocumentSettings::default();
        Self {
            server_url: EngineSettings::default().server_url,
            api_base_url: documents.base_url,
            reconnect_attempts: reconnect.max_attempts,
            reconnect_delay_ms: millis(reconnect.delay_floor),
            reconnect_delay_max_ms: millis(reconnect.delay_ceiling),
            connect_timeout_secs: reconnect.connect_timeout.as_secs(),
            heartbeat_secs: settings.heartbeat_interval.as_secs(),
            query_timeout_secs: settings.query_timeout.as_secs(),
            completion_grace_ms: millis(settings.completion_grace),
            hide_hold_ms: millis(settings.hide_hold),
            hide_fade_ms: millis(settings.hide_fade),
            upload_status_clear_ms: millis(settings.upload_status_clear),
            upload_ramp_step: settings.upload.ramp_step,
            upload_ramp_interval_ms: millis(settings.upload.ramp_interval),
            upload_ramp_cap: settings.upload.ramp_cap,
            max_upload_bytes: settings.upload.max_bytes,
            allowed_extensions: settings.upload.allowed_extensions,
            upload_timeout_secs: documents.request_timeout.as_secs(),
            surfaces: vec![SurfaceKind::Desktop],
            log_destination: LogDestination::File,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Reads the file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                chat_info!("no configuration at {:?}; using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(content)
    }

    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
    }

    pub fn apply_overrides(
        &mut self,
        server_url: Option<String>,
        api_base_url: Option<String>,
        log_level: Option<String>,
    ) {
        if let Some(url) = server_url {
            self.server_url = url;
        }
        if let Some(url) = api_base_url {
            self.api_base_url = url;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "server_url must be a ws:// or wss:// address, got {:?}",
                self.server_url
            )));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must be an http:// or https:// address, got {:?}",
                self.api_base_url
            )));
        }
        if self.reconnect_attempts < MIN_RECONNECT_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "reconnect_attempts must be at least {MIN_RECONNECT_ATTEMPTS}, got {}",
                self.reconnect_attempts
            )));
        }
        if self.reconnect_delay_max_ms < self.reconnect_delay_ms {
            return Err(ConfigError::Invalid(
                "reconnect_delay_max_ms must not be below reconnect_delay_ms".to_string(),
            ));
        }
        for (name, value) in [
            ("reconnect_delay_ms", self.reconnect_delay_ms),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("heartbeat_secs", self.heartbeat_secs),
            ("query_timeout_secs", self.query_timeout_secs),
            ("upload_ramp_interval_ms", self.upload_ramp_interval_ms),
            ("upload_timeout_secs", self.upload_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.upload_ramp_cap >= 100 {
            return Err(ConfigError::Invalid(
                "upload_ramp_cap must stay below 100".to_string(),
            ));
        }
        if self.surfaces.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one surface is required".to_string(),
            ));
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.log_level)))
    }

    pub fn core_settings(&self) -> Settings {
        Settings {
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            completion_grace: Duration::from_millis(self.completion_grace_ms),
            hide_hold: Duration::from_millis(self.hide_hold_ms),
            hide_fade: Duration::from_millis(self.hide_fade_ms),
            upload_status_clear: Duration::from_millis(self.upload_status_clear_ms),
            upload: UploadPolicy {
                allowed_extensions: self
                    .allowed_extensions
                    .iter()
                    .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
                max_bytes: self.max_upload_bytes,
                ramp_step: self.upload_ramp_step,
                ramp_interval: Duration::from_millis(self.upload_ramp_interval_ms),
                ramp_cap: self.upload_ramp_cap,
            },
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            server_url: self.server_url.clone(),
            reconnect: ReconnectPolicy {
                max_attempts: self.reconnect_attempts,
                delay_floor: Duration::from_millis(self.reconnect_delay_ms),
                delay_ceiling: Duration::from_millis(self.reconnect_delay_max_ms),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            },
            documents: DocumentSettings {
                base_url: self.api_base_url.clone(),
                request_timeout: Duration::from_secs(self.upload_timeout_secs),
                ..DocumentSettings::default()
            },
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
