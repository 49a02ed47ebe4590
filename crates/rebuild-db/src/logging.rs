//! tracing setup: console output plus an optional plain-text log file.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "rebuild_db=info,shuffle_db=info";

/// Install the global subscriber.
///
/// When `log_file` is given and can be created, every event is mirrored
/// there without ANSI colours. A log file that cannot be created only costs
/// the file; the run continues with console output. Returns whether the file
/// layer is active.
pub fn init(log_file: Option<&Path>) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (file_layer, file_error) = match log_file.map(File::create) {
        Some(Ok(file)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .without_time()
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Some(Err(err)) => (None, Some(err)),
        None => (None, None),
    };
    let active = file_layer.is_some();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time(),
        )
        .with(file_layer)
        .init();

    if let (Some(path), Some(err)) = (log_file, file_error) {
        tracing::warn!(path = %path.display(), %err, "cannot create log file, logging to console only");
    }
    active
}
