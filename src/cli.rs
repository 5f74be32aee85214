//! Command-line interface.

use clap::{Args, Parser, Subcommand};
use ossky_config::{Figment, Serialized};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ossky", version, about = "Posts interesting open-source projects to Bluesky")]
pub struct Cli {
    /// Configuration file (TOML). Defaults to the platform config directory.
    #[arg(long, short, global = true, env = "OSSKY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub credentials: Credentials,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll for projects and publish them until interrupted (default).
    Run,
    /// Run a single cache cleanup cycle and print what it did.
    Sweep,
    /// Encode a post and print it without publishing.
    Preview(PreviewArgs),
}

/// Credentials, kept compatible with the environment variables the bot has
/// always been deployed with. Anything given here wins over the config file
/// and `OSSKY_*` variables.
#[derive(Debug, Default, Args)]
pub struct Credentials {
    #[arg(long, global = true, env = "BLUESKY_HANDLE")]
    pub bluesky_handle: Option<String>,
    #[arg(long, global = true, env = "BLUESKY_APP_KEY", hide_env_values = true)]
    pub bluesky_app_key: Option<String>,
    #[arg(long, global = true, env = "AWS_ENDPOINT")]
    pub aws_endpoint: Option<String>,
    #[arg(long, global = true, env = "AWS_ACCESS_KEY_ID")]
    pub aws_access_key_id: Option<String>,
    #[arg(long, global = true, env = "AWS_SECRET_KEY", hide_env_values = true)]
    pub aws_secret_key: Option<String>,
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

impl Credentials {
    /// Merge every flag that was given on top of `figment`.
    pub fn layer(&self, figment: Figment) -> Figment {
        [
            ("bluesky.identifier", &self.bluesky_handle),
            ("bluesky.app_password", &self.bluesky_app_key),
            ("storage.endpoint", &self.aws_endpoint),
            ("storage.key_id", &self.aws_access_key_id),
            ("storage.key_secret", &self.aws_secret_key),
            ("github.token", &self.github_token),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|value| (key, value)))
        .fold(figment, |figment, (key, value)| figment.merge(Serialized::default(key, value)))
    }
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[arg(long)]
    pub title: String,
    /// Project URL; defaults to `https://github.com/<title>`.
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Author handle, e.g. `@octocat`.
    #[arg(long)]
    pub author: Option<String>,
    #[arg(long)]
    pub stargazers: Option<String>,
    /// Space-separated, e.g. `"#rust #cli"`.
    #[arg(long)]
    pub hashtags: Option<String>,
}
