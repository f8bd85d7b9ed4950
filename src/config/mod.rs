use chrono_tz::Tz;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::errors::{AppError, AppResult};
use crate::models::{Channel, ChannelCatalog, ScheduleWindow, clamp_days};
use crate::pipeline::stages::NormalizeSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Read the raw export from `artifacts.raw_path` instead of contacting the upstream
    #[serde(default)]
    pub developer_mode: bool,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub xmltv: XmltvConfig,
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    /// Days requested per cycle, clamped to 1..=7
    pub lookahead_days: u32,
    /// Connection establishment timeout; the transfer itself is unbounded
    #[serde(with = "duration_serde::duration")]
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    /// IANA zone used for the window and for programme timestamps
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    pub path: PathBuf,
    pub uri_prefix: String,
    pub tags: String,
}

/// Locations of the four stage artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub raw_path: PathBuf,
    pub intermediate_path: PathBuf,
    pub normalized_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmltvConfig {
    pub generator_name: String,
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            developer_mode: false,
            upstream: UpstreamConfig::default(),
            schedule: ScheduleConfig::default(),
            playlist: PlaylistConfig::default(),
            artifacts: ArtifactsConfig::default(),
            xmltv: XmltvConfig::default(),
            channels: default_channels(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            connect_timeout: humantime::parse_duration(DEFAULT_CONNECT_TIMEOUT)
                .unwrap_or(Duration::from_secs(10)),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start_hour: DEFAULT_START_HOUR,
            end_hour: DEFAULT_END_HOUR,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PLAYLIST_PATH),
            uri_prefix: DEFAULT_URI_PREFIX.to_string(),
            tags: DEFAULT_PLAYLIST_TAGS.to_string(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from(DEFAULT_RAW_PATH),
            intermediate_path: PathBuf::from(DEFAULT_INTERMEDIATE_PATH),
            normalized_path: PathBuf::from(DEFAULT_NORMALIZED_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

impl Default for XmltvConfig {
    fn default() -> Self {
        Self {
            generator_name: DEFAULT_GENERATOR_NAME.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

fn default_channels() -> Vec<Channel> {
    DEFAULT_CHANNELS
        .iter()
        .map(|(number, name, epg_id, source)| Channel {
            number: *number,
            name: name.to_string(),
            epg_id: epg_id.to_string(),
            source: source.to_string(),
            stream_uri: None,
            include_in_playlist: true,
        })
        .collect()
}

impl Config {
    /// Load configuration from `config_file`, creating it with defaults when missing
    ///
    /// Values from the file are layered over the defaults, then environment
    /// variables prefixed with `MOVISTAR_XMLTV_` (nested keys split on `__`).
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AppResult<Self> {
        let config_file = config_file.as_ref();
        if !config_file.exists() {
            let contents = toml::to_string_pretty(&Self::default()).map_err(|e| {
                AppError::configuration(format!("Failed to render default config: {e}"))
            })?;
            std::fs::write(config_file, contents).map_err(|e| AppError::io(config_file, e))?;
            info!("Created default config file: {}", config_file.display());
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler or the pipeline cannot work with
    pub fn validate(&self) -> AppResult<()> {
        for (name, hour) in [
            ("schedule.start_hour", self.schedule.start_hour),
            ("schedule.end_hour", self.schedule.end_hour),
        ] {
            if hour > 23 {
                return Err(AppError::configuration(format!(
                    "{name} must be between 0 and 23, got {hour}"
                )));
            }
        }

        self.timezone()?;

        url::Url::parse(&self.upstream.url).map_err(|e| {
            AppError::configuration(format!("Invalid upstream.url '{}': {e}", self.upstream.url))
        })?;

        if self.catalog().is_empty() {
            warn!("No channels configured, the guide and playlist will be empty");
        }
        for channel in &self.channels {
            let duplicates = self
                .channels
                .iter()
                .filter(|c| c.epg_id == channel.epg_id)
                .count();
            if duplicates > 1 {
                return Err(AppError::configuration(format!(
                    "Channel code '{}' is declared {duplicates} times",
                    channel.epg_id
                )));
            }
        }

        Ok(())
    }

    pub fn timezone(&self) -> AppResult<Tz> {
        self.schedule.timezone.parse::<Tz>().map_err(|e| {
            AppError::configuration(format!(
                "Invalid schedule.timezone '{}': {e}",
                self.schedule.timezone
            ))
        })
    }

    pub fn window(&self) -> ScheduleWindow {
        ScheduleWindow::new(self.schedule.start_hour, self.schedule.end_hour)
    }

    /// Requested lookahead clamped to the supported range
    pub fn lookahead_days(&self) -> u32 {
        let days = clamp_days(self.upstream.lookahead_days);
        if days != self.upstream.lookahead_days {
            warn!(
                "upstream.lookahead_days {} is out of range, using {}",
                self.upstream.lookahead_days, days
            );
        }
        days
    }

    pub fn catalog(&self) -> ChannelCatalog {
        ChannelCatalog::new(self.channels.clone())
    }

    pub fn normalize_settings(&self) -> AppResult<NormalizeSettings> {
        Ok(NormalizeSettings {
            timezone: self.timezone()?,
            language: self.xmltv.language.clone(),
            generator_name: self.xmltv.generator_name.clone(),
            source_url: self.upstream.url.clone(),
        })
    }
}
