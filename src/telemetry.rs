//! Tracing setup shared by the binaries.

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Set to `1` or `true` for JSON log lines.
pub const JSON_LOG_ENV: &str = "FALLGUARD_JSON_LOG";

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` (default `info`). Output is human-readable
/// unless [`JSON_LOG_ENV`] is set.
pub fn init_tracing(service: &str) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(JSON_LOG_ENV)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true),
            )
            .try_init()?;
    }

    info!(service, "tracing initialized");
    Ok(())
}
