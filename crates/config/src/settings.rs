use crate::error::{ErrorKind, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use ossky_richtext::StargazerPlacement;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "OSSKY_";
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bluesky: BlueskySettings,
    pub storage: StorageSettings,
    pub github: GithubSettings,
    pub cache: CacheSettings,
    pub schedule: ScheduleSettings,
    pub post: PostSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueskySettings {
    pub service: String,
    /// Handle or email to log in with.
    pub identifier: String,
    /// An app password; account passwords are refused by the server.
    pub app_password: String,
    pub langs: Vec<String>,
}

impl Default for BlueskySettings {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".to_string(),
            identifier: String::new(),
            app_password: String::new(),
            langs: vec!["en-UK".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub bucket: String,
    /// Key prefix inside the bucket; empty for the bucket root.
    pub prefix: String,
    pub region: String,
    /// S3-compatible endpoint. Leave unset for AWS itself.
    pub endpoint: Option<String>,
    pub key_id: String,
    pub key_secret: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            bucket: "ossky-cache".to_string(),
            prefix: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            key_id: String::new(),
            key_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub token: String,
    pub language: String,
    pub min_stars: u32,
    /// How long before a project may be announced again.
    #[serde(with = "crate::duration")]
    pub republish_after: Duration,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            language: "go".to_string(),
            min_stars: 100,
            republish_after: 30 * DAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL for entries written without one.
    #[serde(with = "crate::duration")]
    pub default_ttl: Duration,
    /// Time between janitor sweeps.
    #[serde(with = "crate::duration")]
    pub cleanup_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { default_ttl: DAY, cleanup_interval: DAY }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Pause between two polls. This is also the back-off after a rate limit.
    #[serde(with = "crate::duration")]
    pub check_interval: Duration,
    /// Pause before logging in again after a fatal error.
    #[serde(with = "crate::duration")]
    pub reconnect_delay: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            check_interval: HOUR / 4,
            reconnect_delay: Duration::from_secs(2 * 60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSettings {
    pub stargazers: StargazerPlacement,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `tracing` filter directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::default() }
    }
}

impl Settings {
    /// Platform config file location, e.g. `~/.config/ossky/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ossky").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Layered providers: built-in defaults, then the TOML file, then
    /// `OSSKY_`-prefixed environment variables (`__` separates sections, so
    /// `OSSKY_GITHUB__LANGUAGE=rust`).
    ///
    /// An explicit `config_file` must exist; the default location is
    /// optional. Callers can merge further providers on top before
    /// extracting with [`Settings::from_figment`].
    pub fn figment(config_file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        match config_file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::FileNotFound(path.display().to_string()));
                }
                tracing::debug!(path = %path.display(), "Loading configuration file");
                figment = figment.merge(Toml::file(path));
            },
            None => {
                if let Some(path) = Self::default_path() {
                    figment = figment.merge(Toml::file(path));
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        figment.extract().map_err(|e| exn::Exn::from(ErrorKind::Invalid(e.to_string())))
    }

    /// [`figment`](Self::figment) and [`from_figment`](Self::from_figment)
    /// in one go.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(config_file)?)
    }

    /// Settings needed to reach the cache bucket.
    pub fn validate_storage(&self) -> Result<()> {
        require(&self.storage.bucket, "storage.bucket")?;
        require(&self.storage.key_id, "storage.key_id")?;
        require(&self.storage.key_secret, "storage.key_secret")?;
        if self.cache.cleanup_interval.is_zero() {
            exn::bail!(ErrorKind::Invalid("cache.cleanup_interval must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Settings needed to discover and publish.
    pub fn validate_publishing(&self) -> Result<()> {
        require(&self.bluesky.identifier, "bluesky.identifier")?;
        require(&self.bluesky.app_password, "bluesky.app_password")?;
        require(&self.github.token, "github.token")?;
        require(&self.github.language, "github.language")?;
        if self.schedule.check_interval.is_zero() {
            exn::bail!(ErrorKind::Invalid("schedule.check_interval must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Everything the bot needs to run.
    pub fn validate(&self) -> Result<()> {
        self.validate_storage()?;
        self.validate_publishing()
    }
}

fn require(value: &str, name: &'static str) -> Result<()> {
    match value.trim().is_empty() {
        true => exn::bail!(ErrorKind::Missing(name)),
        false => Ok(()),
    }
}
