use std::sync::Mutex;

use slog::Drain;
use slog::Fuse;
use slog_async::Async;
use slog_json::Json;

pub use slog::{debug, error, info, o, trace, warn, Logger};

pub fn initialize_logger() -> slog::Logger {
    // TODO is this the correct sequence?
    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);
    #[cfg(feature = "env_logging")]
    let drain = slog_envlogger::new(drain);
    let drain = Async::new(drain).build().fuse();

    Logger::root(
        drain,
        o!("version" => info::VERSION, "revision" => info::REVISION, "build_timestamp" => info::BUILD_TIMESTAMP),
    )
}

/// Installs `logger` as the global `slog-scope` logger for code that
/// logs outside an explicit context.
#[cfg(feature = "env_logging")]
pub fn initialize_global_logger(logger: Logger) -> slog_scope::GlobalLoggerGuard {
    slog_scope::set_global_logger(logger)
}

/// Returns a logger that swallows everything. Useful in tests.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}
