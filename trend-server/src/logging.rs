//! Log output setup
//!
//! All diagnostics, including the 500-path `error!` events, go to stderr.

use std::io;
use tracing_subscriber::fmt::{
    self,
    format::{DefaultFields, Format},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "trend_server=info,trend_common=info,tower_http=info";

pub type LogWriter = fn() -> io::Stderr;

/// Formatting layer bound to stderr
pub fn fmt_layer<S>() -> fmt::Layer<S, DefaultFields, Format, LogWriter> {
    fmt::layer().with_writer(io::stderr as LogWriter)
}

/// Install the global subscriber. Call once, first thing in `main`.
pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(fmt_layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;

    #[test]
    fn test_layer_emits_to_stderr() {
        let subscriber = tracing_subscriber::registry().with(fmt_layer::<Registry>());
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("Request failed: stderr check");
        });

        let writer: LogWriter = io::stderr;
        let _stderr: io::Stderr = writer();
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
