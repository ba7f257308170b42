//! Diagnostic logging to stderr
//!
//! `RUST_LOG` wins when set; otherwise only warnings show, or everything
//! down to debug with `--debug`. Stdout stays reserved for command output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "warn" }
}

pub(crate) fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
