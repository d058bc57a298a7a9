//! Layered configuration for the Coursewright host.

use config::{Config, Environment, File, FileFormat};
use coursewright_error::{ConfigError, ConfigErrorKind};
use coursewright_generation::GenerationSettings;
use coursewright_models::ModelSettings;
use coursewright_retry::{RequestLimiter, RetryPolicy};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Bundled defaults, the lowest-precedence layer.
const DEFAULT_CONFIG: &str = include_str!("../coursewright.toml");

/// The `[rate_limit]` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Getters, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Attempts started per minute; 0 means unlimited
    #[serde(default)]
    requests_per_minute: u32,
}

impl RateLimitConfig {
    /// Limiter for the retry executor, if one is configured.
    pub fn limiter(&self) -> Option<RequestLimiter> {
        RequestLimiter::per_minute(self.requests_per_minute)
    }
}

fn default_lms_timeout_secs() -> u64 {
    60
}

/// The `[lms]` section.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct LmsConfig {
    /// Per-request timeout for LMS calls
    #[serde(default = "default_lms_timeout_secs")]
    request_timeout_secs: u64,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_lms_timeout_secs(),
        }
    }
}

impl LmsConfig {
    /// Timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_telemetry_capacity() -> usize {
    1_024
}

/// The `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Checkpoint directory; the platform data directory when unset
    #[serde(default)]
    path: Option<PathBuf>,
    /// JSON-lines telemetry file, relative to `path` unless absolute.
    /// Telemetry goes to the log when unset.
    #[serde(default)]
    telemetry_file: Option<PathBuf>,
    /// Events buffered ahead of the telemetry writer
    #[serde(default = "default_telemetry_capacity")]
    telemetry_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            telemetry_file: None,
            telemetry_capacity: default_telemetry_capacity(),
        }
    }
}

impl StorageConfig {
    /// Directory the checkpoint store lives in.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("coursewright")
        })
    }

    /// Telemetry file, resolved against [`StorageConfig::resolved_path`].
    pub fn resolved_telemetry_file(&self) -> Option<PathBuf> {
        self.telemetry_file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                self.resolved_path().join(file)
            }
        })
    }
}

fn default_hide_after_ms() -> u64 {
    5_000
}

/// The `[status]` section.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct StatusConfig {
    /// How long a finished run's status stays visible
    #[serde(default = "default_hide_after_ms")]
    hide_after_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            hide_after_ms: default_hide_after_ms(),
        }
    }
}

impl StatusConfig {
    /// Auto-hide delay as a duration.
    pub fn hide_after(&self) -> Duration {
        Duration::from_millis(self.hide_after_ms)
    }
}

/// Top-level Coursewright configuration.
///
/// Sources in order of precedence (later sources override earlier):
/// 1. Bundled defaults (`coursewright.toml` shipped with the crate)
/// 2. `~/.config/coursewright/coursewright.toml`
/// 3. `./coursewright.toml`
/// 4. `COURSEWRIGHT__<SECTION>__<KEY>` environment variables
///
/// # Example
///
/// ```no_run
/// use coursewright::CoursewrightConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CoursewrightConfig::load()?;
/// println!("Retries: {}", config.retry().max_retries());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Getters, Serialize, Deserialize)]
pub struct CoursewrightConfig {
    /// Provider endpoints and models
    #[serde(default)]
    models: ModelSettings,
    /// Retry policy for every external call
    #[serde(default)]
    retry: RetryPolicy,
    /// Global request cap
    #[serde(default)]
    rate_limit: RateLimitConfig,
    /// LMS client settings
    #[serde(default)]
    lms: LmsConfig,
    /// Prompting and pacing
    #[serde(default)]
    generation: GenerationSettings,
    /// Checkpoint and telemetry locations
    #[serde(default)]
    storage: StorageConfig,
    /// Status display
    #[serde(default)]
    status: StatusConfig,
}

impl CoursewrightConfig {
    /// Load the bundled defaults, then user files, then the environment.
    ///
    /// User config files are optional and silently skipped if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file or variable cannot be parsed.
    #[instrument]
    pub fn load() -> Result<Self, ConfigError> {
        debug!("Loading configuration: env > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/coursewright/coursewright.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("coursewright").required(false))
            .add_source(
                Environment::with_prefix("COURSEWRIGHT")
                    .separator("__")
                    .try_parsing(true),
            );

        finish(builder)
    }

    /// Load the bundled defaults overlaid with a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading configuration from file");

        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()));

        finish(builder)
    }

    /// The bundled defaults alone.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled file itself is broken.
    pub fn bundled() -> Result<Self, ConfigError> {
        finish(Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml)))
    }
}

fn finish(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<CoursewrightConfig, ConfigError> {
    builder
        .build()
        .map_err(|e| ConfigError::new(ConfigErrorKind::Load(e.to_string())))?
        .try_deserialize()
        .map_err(|e| ConfigError::new(ConfigErrorKind::Deserialize(e.to_string())))
}
