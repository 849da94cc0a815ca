//! Forwarding of the library's `log` records to a host-supplied logger.

use std::sync::{Arc, OnceLock};

/// Sink for the library's log records.
///
/// Implement this in the host application and install it with [`set_logger`].
/// With the `ffi` feature it is exported via `UniFFI`, so Swift and Kotlin
/// hosts can forward records into their own logging.
///
/// # Examples
///
/// ```rust
/// use keychainkit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Swift
///
/// ```swift
/// final class KeychainKitLogger: KeychainKit.Logger {
///     func log(level: KeychainKit.LogLevel, message: String) {
///         os_log("%{public}@", type: level.osLogType, message)
///     }
/// }
///
/// KeychainKit.setLogger(logger: KeychainKitLogger()) // once, at launch
/// ```
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait Logger: Sync + Send {
    /// Receives one formatted record.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity of the record.
    /// * `message` - The formatted message. Never contains stored item bytes.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded record.
///
/// Mirrors `log::Level` so hosts can map it onto their own levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Debugging output, e.g. one line per keychain round trip.
    Debug,
    /// Informational output.
    Info,
    /// Unexpected statuses and failed authentication.
    Warn,
    /// Errors.
    Error,
}

impl From<log::Level> for LogLevel {
    /// Converts a `log::Level` to the matching `LogLevel`.
    ///
    /// # Arguments
    ///
    /// * `level` - The `log::Level` to convert.
    ///
    /// # Returns
    ///
    /// The `LogLevel` of the same severity.
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

/// A `log::Log` implementation that forwards records to the installed [`Logger`].
///
/// Registered with the `log` crate by [`set_logger`]. Records emitted before a
/// host logger is installed go to stderr.
struct ForeignLogger;

/// Decides whether a record is forwarded to the host.
///
/// Debug and trace records are only forwarded when they come from this
/// library; dependencies can be chatty at those levels.
///
/// # Arguments
///
/// * `module_path` - Module that emitted the record, if known.
/// * `level` - Severity of the record.
///
/// # Returns
///
/// `true` if the record should reach the host logger.
fn should_forward(module_path: Option<&str>, level: log::Level) -> bool {
    let verbose = matches!(level, log::Level::Debug | log::Level::Trace);
    !verbose || module_path.is_some_and(|path| path.starts_with("keychainkit"))
}

impl log::Log for ForeignLogger {
    /// Determines if a record with the given metadata should be logged.
    ///
    /// Every record is enabled here; filtering by origin happens in `log`.
    ///
    /// # Arguments
    ///
    /// * `_metadata` - Metadata about the record.
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    /// Forwards a record to the host logger.
    ///
    /// Drops debug and trace records from dependencies, then hands the
    /// formatted message to the installed [`Logger`], or prints it to stderr
    /// when none is installed.
    ///
    /// # Arguments
    ///
    /// * `record` - The log record containing the message and metadata.
    fn log(&self, record: &log::Record) {
        if !should_forward(record.module_path(), record.level()) {
            return;
        }
        match LOGGER_INSTANCE.get() {
            Some(logger) => logger.log(record.level().into(), record.args().to_string()),
            None => eprintln!("Logger not set: {}", record.args()),
        }
    }

    /// Flushes buffered records.
    ///
    /// Does nothing; records are forwarded as they arrive.
    fn flush(&self) {}
}

/// The host logger installed through [`set_logger`].
///
/// Read by `ForeignLogger` on every record. Set at most once.
static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs the host's logger.
///
/// Registers the forwarding logger with the `log` crate and enables every
/// level. Call it once, before the first keychain operation.
///
/// # Arguments
///
/// * `logger` - An `Arc` containing the host's [`Logger`] implementation.
///
/// # Note
///
/// Only the first call has an effect. Later calls print a message to stderr
/// and return.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

/// Registers `ForeignLogger` with the `log` crate at the most verbose level.
///
/// # Errors
///
/// Returns a `log::SetLoggerError` if another `log` implementation was
/// already registered.
fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
