//! `tracing` subscriber setup for `synthex-node`.
//!
//! Output goes to stderr; `init` and `version` print their results on stdout.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. `synthex_contracts=debug` shows
/// every price read and collaborator call made by the engine.
pub const DEFAULT_DIRECTIVES: &str =
    "synthex_node=info,synthex_contracts=info,synthex_protocol=info,tower_http=info";

/// Filter for the one-shot `init` command.
pub const INIT_DIRECTIVES: &str = "synthex_node=info";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Installs the global subscriber. Must run once, before the first event.
pub fn init_logging(directives: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    tracing::debug!(?format, directives, "logging initialized");
}
