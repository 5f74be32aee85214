use crate::error::{ErrorKind, Result};
use ossky_config::{LogFormat, LoggingSettings};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(logging: &LoggingSettings) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level).map_err(|e| exn::Exn::from(ErrorKind::Telemetry(e.to_string())))?,
    };

    let output = match logging.format {
        LogFormat::Json => fmt::layer().json().with_current_span(true).with_span_list(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(|e| exn::Exn::from(ErrorKind::Telemetry(e.to_string())))
}
