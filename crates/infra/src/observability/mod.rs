//! Tracing initialisation
//!
//! Library code only emits `tracing` events; binaries call [`init_tracing`]
//! once at startup to install a subscriber.
//!
//! The filter comes from `RUST_LOG` when set. Otherwise it is built from the
//! requested verbosity: `sunga=info` by default, `sunga=debug` with one `-v`,
//! `trace` for everything with two or more.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines on stderr
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
}

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "sunga=info,sunga_infra=info,sunga_common=info,warn",
        1 => "sunga=debug,sunga_infra=debug,sunga_common=debug,info",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed (tests, embedding
/// applications); the existing one stays in place.
pub fn init_tracing(format: LogFormat, verbosity: u8) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .try_init(),
    };
    result.is_ok()
}
