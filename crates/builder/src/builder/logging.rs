//! Tracing subscriber setup for the binary.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Targets, prelude::*};

/// Environment variable holding a `Targets` directive, e.g. `openfst_builder=debug`.
pub const LOG_VAR: &str = "OPENFST_BUILDER_LOG";

/// Initialize tracing. Logs go to stderr, at `info` unless `var_name` says otherwise.
pub fn setup(var_name: &str) {
    let targets_layer = std::env::var(var_name)
        .ok()
        .and_then(|filter| filter.parse::<Targets>().ok())
        .unwrap_or_else(|| Targets::new().with_default(LevelFilter::INFO));

    let format_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(targets_layer)
        .with(format_layer)
        .init();
}
