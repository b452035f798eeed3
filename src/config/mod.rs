use std::env;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Session lifecycle settings.
    pub session: SessionConfig,
    /// Segmentation settings.
    pub parser: ParserConfig,
    /// Upstream stream settings.
    pub stream: StreamConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Session lifecycle configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum concurrent non-terminal sessions allowed per client IP.
    pub max_concurrent_per_ip: usize,
    /// Sessions older than this many hours are removed by the sweep.
    pub cleanup_hours: i64,
}

/// Segmentation configuration
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Minimum word count before a segment is considered complete.
    pub min_segment_words: usize,
}

/// Upstream stream configuration, surfaced for the embedding client
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Token budget the external stream client should request for thinking.
    pub thinking_budget_tokens: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format for the stderr layer.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let session = SessionConfig {
            max_concurrent_per_ip: env::var("MAX_CONCURRENT_SESSIONS_PER_IP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            cleanup_hours: env::var("SESSION_CLEANUP_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        };

        let parser = ParserConfig {
            min_segment_words: env::var("SEGMENT_MIN_WORDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
        };

        let stream = StreamConfig {
            thinking_budget_tokens: env::var("THINKING_BUDGET_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10000),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Config {
            session,
            parser,
            stream,
            logging,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session: SessionConfig::default(),
            parser: ParserConfig::default(),
            stream: StreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_ip: 3,
            cleanup_hours: 1,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_segment_words: 20,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            thinking_budget_tokens: 10000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Initialize tracing/logging for the configured level and format
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
