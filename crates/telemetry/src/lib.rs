//! Tracing bootstrap for bookshelf binaries.

use bookshelf_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured filter. Returns `false` when a
/// subscriber was already installed, which is not an error.
pub fn init(settings: &TelemetrySettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match settings.log_format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.try_init().is_ok(),
    };

    if installed {
        tracing::info!(
            target: "bookshelf-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );
    }
    installed
}
