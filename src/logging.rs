use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

static LOG_FILE: OnceCell<Option<PathBuf>> = OnceCell::new();

/// Initialise logging. The default level is `info`; `debug` is enabled via
/// the settings file, in which case `RUST_LOG` may override it. When
/// `log_file` is given, output is also appended to that file.
///
/// Only the first call installs a subscriber; later calls are ignored.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    if LOG_FILE.get().is_some() {
        return;
    }

    // Without debug logging we force `info` regardless of `RUST_LOG` so a
    // stray variable in the user's environment cannot flood the console.
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let file_layer = log_file.as_deref().and_then(|path| {
        let dir = path.parent()?.to_path_buf();
        let name = path.file_name()?.to_owned();
        let appender = tracing_appender::rolling::never(dir, name);
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(appender),
        )
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .is_ok();
    let _ = LOG_FILE.set(if installed { log_file } else { None });
}

/// File receiving log output, if logging was initialised with one.
pub fn active_log_file() -> Option<&'static Path> {
    LOG_FILE.get()?.as_deref()
}
