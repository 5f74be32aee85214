//! The poll loop: log in, publish one project per tick, log in again when the
//! session breaks.

use crate::content::publish_next;
use async_trait::async_trait;
use ossky_bluesky::{Publish, Publisher, XrpcClient};
use ossky_config::Settings;
use ossky_discovery::ContentProvider;
use ossky_richtext::EncoderOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2 * 60);

/// Produces a fresh, logged-in publisher.
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self) -> ossky_bluesky::error::Result<Arc<dyn Publish>>;
}

/// Logs in to a Bluesky PDS with an app password.
pub struct BlueskyLogin {
    service: String,
    identifier: String,
    app_password: String,
    langs: Vec<String>,
    options: EncoderOptions,
}

impl BlueskyLogin {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            service: settings.bluesky.service.clone(),
            identifier: settings.bluesky.identifier.clone(),
            app_password: settings.bluesky.app_password.clone(),
            langs: settings.bluesky.langs.clone(),
            options: EncoderOptions { stargazers: settings.post.stargazers, ..Default::default() },
        }
    }
}

#[async_trait]
impl Connect for BlueskyLogin {
    async fn connect(&self) -> ossky_bluesky::error::Result<Arc<dyn Publish>> {
        let agent = XrpcClient::new(&self.service)?.login(&self.identifier, &self.app_password).await?;
        let publisher = Publisher::new(agent).with_options(self.options).with_langs(self.langs.clone());
        Ok(Arc::new(publisher))
    }
}

pub struct Bot {
    provider: Arc<dyn ContentProvider>,
    connector: Box<dyn Connect>,
    check_interval: Duration,
    reconnect_delay: Duration,
}

impl Bot {
    pub fn new(provider: Arc<dyn ContentProvider>, connector: Box<dyn Connect>) -> Self {
        Self {
            provider,
            connector,
            check_interval: DEFAULT_CHECK_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    /// Run until `shutdown` is raised.
    ///
    /// Nothing in here is fatal. A failed login or a broken session waits
    /// `reconnect_delay` and logs in again; a provider failure or a rejected
    /// post just waits for the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            let publisher = tokio::select! {
                biased;
                () = raised(&mut shutdown) => break,
                connected = self.connector.connect() => connected,
            };
            let publisher = match publisher {
                Ok(publisher) => publisher,
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to connect to Bluesky");
                    tracing::info!(delay = ?self.reconnect_delay, "Retrying connection");
                    if pause(&mut shutdown, self.reconnect_delay).await {
                        break;
                    }
                    continue;
                },
            };
            if self.serve(publisher.as_ref(), &mut shutdown).await {
                break;
            }
        }
        tracing::info!("Bot stopped");
    }

    /// Poll with one session until it breaks (`false`) or shutdown (`true`).
    async fn serve(&self, publisher: &dyn Publish, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            tracing::debug!("Checking for content");
            let outcome = tokio::select! {
                biased;
                () = raised(shutdown) => return true,
                outcome = publish_next(self.provider.as_ref(), publisher) => outcome,
            };
            match outcome {
                Ok(()) => {},
                Err(e) if e.is_retryable() => tracing::debug!("Backing off"),
                Err(e) => {
                    tracing::error!(error = ?e, "Error during content check");
                    return pause(shutdown, self.reconnect_delay).await;
                },
            }
            if pause(shutdown, self.check_interval).await {
                return true;
            }
        }
    }
}

/// Resolves once the flag is raised. A dropped sender never raises it.
async fn raised(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sleep for `duration`; `true` if shutdown was raised meanwhile.
async fn pause(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        biased;
        () = raised(shutdown) => true,
        () = tokio::time::sleep(duration) => false,
    }
}
