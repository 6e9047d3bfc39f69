// Logging System for Starling
//
// This module provides the logging setup used by Starling pools. It's built on
// top of the `tracing` ecosystem, which offers structured logging.
//
// # Usage Examples
//
// ## Basic Initialization
//
// ```rust
// use starling::logging;
//
// // Initialize with default settings (INFO level, console output)
// logging::init_default();
//
// // Or initialize with custom settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## Using Log Macros
//
// ```rust
// use starling::{log_lifecycle, log_pool, pool_span};
//
// let span = pool_span!("my_crate::Rehasher", size = 4);
// let _guard = span.enter();
//
// log_pool!("resize", "completed", size = 6);
// ```

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[doc(hidden)]
pub use tracing as __tracing;

/// Configuration for the Starling logging system
///
/// # Examples
///
/// ```rust
/// use starling::logging::LogConfig;
/// use tracing::Level;
///
/// let custom_config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("starling=debug,starling::pool=trace".to_string()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.trim().parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }
    env_filter
}

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else if config.show_time {
            Box::new(
                registry.with(
                    fmt::layer()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        } else {
            Box::new(
                registry.with(
                    fmt::layer()
                        .without_time()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        };

        set_global_subscriber(subscriber);
    });
}

// Helper function to set the global subscriber
fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Utility function to create a file writer for logs
///
/// Opens the file in append mode, creating it if it doesn't exist.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Box::new(file))
}

/// Initialize logging with both console and file output
///
/// Console output respects the ansi color setting, while file output is always plain.
///
/// # Errors
/// Returns an error if the log file cannot be opened.
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    // Fail early on an unusable path instead of silently logging to stderr.
    file_writer(log_file)?;

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(std::io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// Initialize default logging: INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// Initialize logging optimized for development environments
///
/// DEBUG level for Starling, TRACE for the pool manager, file/line info.
pub fn init_development() {
    let config = LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("starling=debug,starling::pool=trace".to_string()),
    };
    init(config);
}

/// Initialize logging optimized for production environments
///
/// JSON output for log aggregators, no file/line information.
pub fn init_production() {
    let config = LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    };
    init(config);
}

/// Initialize logging for testing
///
/// Only warnings and errors, no timestamps, to keep test output compact.
///
/// ```rust
/// #[test]
/// fn my_test() {
///     starling::logging::init_test();
///     // Your test code...
/// }
/// ```
pub fn init_test() {
    let config = LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    };
    init(config);
}

/// Create a span covering the operations of one pool
///
/// ```rust
/// use starling::pool_span;
///
/// let span = pool_span!("my_crate::Rehasher");
/// let _guard = span.enter();
///
/// let span = pool_span!("my_crate::Rehasher", size = 4);
/// ```
#[macro_export]
macro_rules! pool_span {
    ($worker_type:expr) => {
        $crate::logging::__tracing::info_span!("pool", worker_type = $worker_type)
    };
    ($worker_type:expr, $($fields:tt)*) => {
        $crate::logging::__tracing::info_span!("pool", worker_type = $worker_type, $($fields)*)
    };
}

/// Log worker lifecycle events - started, stopped
#[macro_export]
macro_rules! log_lifecycle {
    ($worker_type:expr, $worker_id:expr, $event:expr) => {
        $crate::logging::__tracing::info!(worker_type = $worker_type, worker_id = %$worker_id, event = $event)
    };
    ($worker_type:expr, $worker_id:expr, $event:expr, $($fields:tt)*) => {
        $crate::logging::__tracing::info!(worker_type = $worker_type, worker_id = %$worker_id, event = $event, $($fields)*)
    };
}

/// Log pool manager events - resize, shutdown
///
/// ```rust
/// use starling::log_pool;
///
/// log_pool!("resize", "completed");
/// log_pool!("resize", "completed", from = 3, to = 6);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($operation:expr, $status:expr) => {
        $crate::logging::__tracing::info!(operation = $operation, status = $status)
    };
    ($operation:expr, $status:expr, $($fields:tt)*) => {
        $crate::logging::__tracing::info!(operation = $operation, status = $status, $($fields)*)
    };
}

/// Log error events - use for all error conditions
///
/// ```rust
/// use starling::log_error;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
/// log_error!(error);
/// log_error!(error, component = "pool", operation = "respawn");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        $crate::logging::__tracing::error!(error = %$error)
    };
    ($error:expr, $($fields:tt)*) => {
        $crate::logging::__tracing::error!(error = %$error, $($fields)*)
    };
}

/// Get the current tracing dispatcher
///
/// Useful when spawning threads that need the current tracing configuration.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}
