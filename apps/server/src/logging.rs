//! Logging initialization for the server binaries.
//!
//! Supports JSON or human-readable console output, optional file logging with
//! rotation, and `RUST_LOG` overrides.

use std::fs;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Guard that keeps the non-blocking file writer alive for the program
/// duration. Dropping it flushes buffered log lines.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize logging based on configuration.
///
/// The returned guard must be kept alive for the program duration when file
/// logging is enabled.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let env_filter = build_env_filter(config);
    let subscriber = tracing_subscriber::registry().with(env_filter);

    let file_guard = if config.json {
        let console_layer = fmt::layer().json().with_writer(std::io::stdout);
        if config.file_enabled {
            let (file_appender, file_guard) = create_file_appender(config)?;
            let file_layer = fmt::layer().json().with_writer(file_appender);
            subscriber.with(console_layer).with(file_layer).init();
            Some(file_guard)
        } else {
            subscriber.with(console_layer).init();
            None
        }
    } else {
        let console_layer = fmt::layer().with_target(true).with_writer(std::io::stdout);
        if config.file_enabled {
            let (file_appender, file_guard) = create_file_appender(config)?;
            let file_layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(file_appender);
            subscriber.with(console_layer).with(file_layer).init();
            Some(file_guard)
        } else {
            subscriber.with(console_layer).init();
            None
        }
    };

    tracing::info!(
        level = %config.level,
        json = config.json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Suppress verbose PostgreSQL/sqlx debug logs by default.
        EnvFilter::new(format!(
            "setu={},tower_http=info,sqlx=warn",
            config.level
        ))
    })
}

fn create_file_appender(
    config: &LoggingConfig,
) -> anyhow::Result<(
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
)> {
    fs::create_dir_all(&config.file_directory)?;

    let file_appender = match config.file_rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.file_directory, &config.file_prefix),
        "minutely" => {
            tracing_appender::rolling::minutely(&config.file_directory, &config.file_prefix)
        }
        "never" => tracing_appender::rolling::never(
            &config.file_directory,
            format!("{}.log", config.file_prefix),
        ),
        _ => tracing_appender::rolling::daily(&config.file_directory, &config.file_prefix),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    Ok((non_blocking, guard))
}

/// Lightweight env-only initialization for auxiliary binaries (the seeder).
pub fn init_simple_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "setu=info,sqlx=warn".into()),
        )
        .with(fmt::layer())
        .init();
}
