//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/capyupload/config.toml`
//! - Windows: `%APPDATA%/capyupload/config.toml`
//!
//! Every field is optional. Command-line flags override file values and
//! library defaults fill whatever is left.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use capyupload_uploader::UploadConfig;

/// CLI configuration (file contents or command-line overrides).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Endpoint receiving the uploads.
    pub url: Option<String>,
    pub workers: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub use_md5: Option<bool>,
    /// Per-attempt HTTP timeout.
    pub request_timeout_secs: Option<u64>,
    /// Deadline for the whole batch.
    pub batch_timeout_secs: Option<u64>,
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("config file not found: {}", path.display());
            }
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Returns `self` with every field set in `overrides` replaced.
    pub fn merge(self, overrides: CliConfig) -> CliConfig {
        CliConfig {
            url: overrides.url.or(self.url),
            workers: overrides.workers.or(self.workers),
            max_retries: overrides.max_retries.or(self.max_retries),
            retry_delay_ms: overrides.retry_delay_ms.or(self.retry_delay_ms),
            use_md5: overrides.use_md5.or(self.use_md5),
            request_timeout_secs: overrides.request_timeout_secs.or(self.request_timeout_secs),
            batch_timeout_secs: overrides.batch_timeout_secs.or(self.batch_timeout_secs),
        }
    }

    /// Builds the manager configuration, falling back to library defaults.
    pub fn upload_config(&self) -> UploadConfig {
        let defaults = UploadConfig::default();
        UploadConfig {
            workers: self.workers.unwrap_or(defaults.workers),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: self
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            use_md5: self.use_md5.unwrap_or(defaults.use_md5),
            request_timeout: self
                .request_timeout_secs
                .map(Duration::from_secs)
                .or(defaults.request_timeout),
            connect_timeout: defaults.connect_timeout,
        }
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_secs.map(Duration::from_secs)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("capyupload").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("capyupload")
            .join("config.toml")
    }
}
