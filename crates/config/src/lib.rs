pub mod duration;
pub mod error;
mod settings;

pub use crate::settings::{
    BlueskySettings, CacheSettings, ENV_PREFIX, GithubSettings, LogFormat, LoggingSettings, PostSettings,
    ScheduleSettings, Settings, StorageSettings,
};
// Re-exported so callers can layer their own providers on [`Settings::figment`].
pub use figment::{Figment, providers::Serialized};
