mod bot;
mod cli;
mod content;
mod error;
mod telemetry;

use crate::bot::{BlueskyLogin, Bot};
use crate::cli::{Cli, Command, PreviewArgs};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use ossky_cache::{Cache, ExpiringStore, Janitor};
use ossky_config::Settings;
use ossky_discovery::{GithubProvider, GithubQuery};
use ossky_richtext::{EncoderOptions, PostDraft, encode};
use ossky_storage::BackendHandle;
use ossky_storage::backend::S3Backend;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher};

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        },
    }
}

/// Log a fatal error, even if it happened before logging was set up.
fn report(error: &error::Error) {
    if dispatcher::has_been_set() {
        tracing::error!(error = ?error, "{error}");
        return;
    }
    let dispatch = Dispatch::new(tracing_subscriber::fmt().with_max_level(Level::ERROR).finish());
    dispatcher::with_default(&dispatch, || tracing::error!(error = ?error, "{error}"));
}

async fn run(cli: Cli) -> Result<()> {
    let figment = Settings::figment(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let settings = Settings::from_figment(&cli.credentials.layer(figment)).or_raise(|| ErrorKind::Config)?;
    telemetry::init(&settings.logging)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_bot(settings).await,
        Command::Sweep => sweep(settings).await,
        Command::Preview(args) => preview(&settings, args),
    }
}

async fn storage(settings: &Settings) -> Result<BackendHandle> {
    let storage = &settings.storage;
    let prefix = Some(storage.prefix.trim_matches('/').to_string()).filter(|prefix| !prefix.is_empty());
    let backend = S3Backend::new(
        "s3",
        &storage.bucket,
        prefix,
        &storage.region,
        storage.endpoint.clone(),
        &storage.key_id,
        &storage.key_secret,
    )
    .await
    .or_raise(|| ErrorKind::Storage)?;
    backend.ensure_bucket().await.or_raise(|| ErrorKind::Storage)?;
    Ok(Arc::new(backend))
}

async fn run_bot(settings: Settings) -> Result<()> {
    settings.validate().or_raise(|| ErrorKind::Config)?;
    let backend = storage(&settings).await?;

    let cache: Arc<dyn Cache> = Arc::new(ExpiringStore::new(backend.clone()).with_default_ttl(settings.cache.default_ttl));
    let query = GithubQuery {
        language: settings.github.language.clone(),
        min_stars: settings.github.min_stars,
    };
    let provider = GithubProvider::new(settings.github.token.clone(), query, cache)
        .or_raise(|| ErrorKind::Discovery)?
        .with_republish_after(settings.github.republish_after);

    let shutdown = interrupted();
    let janitor = Janitor::new(backend).with_interval(settings.cache.cleanup_interval).start(shutdown.clone());
    Bot::new(Arc::new(provider), Box::new(BlueskyLogin::from_settings(&settings)))
        .with_check_interval(settings.schedule.check_interval)
        .with_reconnect_delay(settings.schedule.reconnect_delay)
        .run(shutdown)
        .await;
    janitor.stop().await;
    Ok(())
}

/// A flag raised on Ctrl-C.
fn interrupted() -> watch::Receiver<bool> {
    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted; shutting down");
                let _ = stop.send(true);
            },
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
                // Keep the sender; the flag now stays down until killed.
                std::future::pending::<()>().await;
            },
        }
    });
    shutdown
}

async fn sweep(settings: Settings) -> Result<()> {
    settings.validate_storage().or_raise(|| ErrorKind::Config)?;
    let backend = storage(&settings).await?;
    let report = Janitor::new(backend).sweep(&interrupted()).await.or_raise(|| ErrorKind::Sweep)?;
    println!("{report}");
    Ok(())
}

fn preview(settings: &Settings, args: PreviewArgs) -> Result<()> {
    let url = args.url.unwrap_or_else(|| format!("https://github.com/{}", args.title));
    let mut draft = PostDraft::new(args.title, url).with_description(args.description.unwrap_or_default());
    draft.author = args.author;
    draft.stargazers = args.stargazers;
    draft.hashtags = args.hashtags;

    let options = EncoderOptions { stargazers: settings.post.stargazers, ..Default::default() };
    let post = encode(&draft, &options).or_raise(|| ErrorKind::Encode)?;
    println!("{}", post.text);
    println!("---");
    println!("{} bytes", post.text.len());
    for facet in &post.facets {
        let json = serde_json::to_string(facet).or_raise(|| ErrorKind::Encode)?;
        println!("{json}");
    }
    Ok(())
}
