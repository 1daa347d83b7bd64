//! Structured logging for the QuackView server
//!
//! Pretty console output for development, JSON for production, daily
//! rotated log files, and per-module level filtering.

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE: &str = "quackview-server.log";

/// Directives appended to every filter to quiet third-party crates
const QUIET_DIRECTIVES: &[&str] = &["hyper=warn", "tokio=warn", "runtime=warn", "tower=warn", "h2=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for production
    Json,
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|v| Self::parse(&v))
            .unwrap_or(LogFormat::Pretty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl LogOutput {
    pub fn parse(value: &str) -> Self {
        match value {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stdout,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_OUTPUT")
            .map(|v| Self::parse(&v))
            .unwrap_or(LogOutput::Stdout)
    }
}

fn env_filter() -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in QUIET_DIRECTIVES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

fn file_appender() -> RollingFileAppender {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&log_dir).ok();
    RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE)
}

/// Initialize the global subscriber
///
/// Environment variables:
/// - `RUST_LOG`: Log level (e.g., "debug", "info", "quack_sql=debug")
/// - `LOG_FORMAT`: Output format ("pretty", "json", "compact")
/// - `LOG_OUTPUT`: Where to write logs ("stdout", "file", "both")
/// - `LOG_DIR`: Directory for log files (default: "./logs")
///
/// ```bash
/// # Compiled SQL for every request
/// RUST_LOG=info,quack_sql=debug cargo run -p quack-server
///
/// # Production: JSON to rotated files
/// LOG_FORMAT=json LOG_OUTPUT=file LOG_DIR=/var/log/quackview cargo run -p quack-server
/// ```
pub fn init() {
    let format = LogFormat::from_env();
    let output = LogOutput::from_env();
    let env_filter = env_filter();

    match (output, format) {
        (LogOutput::Stdout, LogFormat::Pretty) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_thread_ids(true).with_target(true))
                .init();
        }
        (LogOutput::Stdout, LogFormat::Json) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_current_span(true))
                .init();
        }
        (LogOutput::Stdout, LogFormat::Compact) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact())
                .init();
        }
        (LogOutput::File, LogFormat::Json) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(file_appender()))
                .init();
        }
        (LogOutput::File, _) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(file_appender()).with_ansi(false))
                .init();
        }
        (LogOutput::Both, format) => {
            let stdout_layer = match format {
                LogFormat::Pretty => fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_target(true)
                    .boxed(),
                LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
                LogFormat::Compact => fmt::layer().compact().boxed(),
            };

            let file_layer = fmt::layer()
                .with_writer(file_appender())
                .with_ansi(false)
                .boxed();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
    }

    tracing::info!(format = ?format, output = ?output, "logging initialized");
    tracing::debug!(
        rust_log = %std::env::var("RUST_LOG").unwrap_or_else(|_| "not set".to_string()),
        log_dir = %std::env::var("LOG_DIR").unwrap_or_else(|_| "not set".to_string()),
        "logging environment"
    );
}

/// Emit a named event with structured fields
///
/// ```ignore
/// log_event!(
///     level: tracing::Level::INFO,
///     event: "analysis_completed",
///     table: "sales",
///     rows: 12
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    (level: $level:expr, event: $event:expr $(, $key:ident: $value:expr)* $(,)?) => {
        tracing::event!(
            $level,
            event = $event
            $(, $key = ?$value)*
        );
    };
}
