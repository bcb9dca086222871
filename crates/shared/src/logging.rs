use std::env;
use std::str::FromStr;

use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

const DEFAULT_FILTER: &str = "info";

/// Output format selected by `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    /// Anything but `json` falls back to text
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        })
    }
}

fn env_filter(directives: Option<&str>) -> Result<EnvFilter, anyhow::Error> {
    let directives = directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    Ok(EnvFilter::from_str(directives)?)
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` selects the filter (defaults to `info`) and `LOG_FORMAT=json`
/// switches the output to one JSON object per line.
pub fn configure_logging() -> Result<(), anyhow::Error> {
    let filter = env_filter(env::var("RUST_LOG").ok().as_deref())?;
    let format = env::var("LOG_FORMAT")
        .ok()
        .and_then(|f| f.parse().ok())
        .unwrap_or(LogFormat::Text);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stdout);

    let installed = match format {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Text => subscriber.try_init(),
    };

    if let Err(e) = installed {
        warn!(error = %e, "Logging already initialized, keeping the existing subscriber");
    }
    Ok(())
}
