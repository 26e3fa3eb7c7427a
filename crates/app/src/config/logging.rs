//! Logging Config

use clap::Args;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs, one object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Log every SQL statement sqlx runs
    #[arg(long, env = "LOG_SQL", default_value_t = false)]
    pub log_sql: bool,
}

impl LoggingConfig {
    /// Filter directives used when `RUST_LOG` is not set.
    #[must_use]
    pub fn directives(&self) -> String {
        let sqlx = if self.log_sql { "debug" } else { "warn" };

        format!("{},sqlx={sqlx}", self.log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_sql: bool) -> LoggingConfig {
        LoggingConfig {
            log_level: "debug".to_string(),
            log_format: LogFormat::Json,
            log_sql,
        }
    }

    #[test]
    fn sqlx_is_quiet_unless_asked() {
        assert_eq!(config(false).directives(), "debug,sqlx=warn");
        assert_eq!(config(true).directives(), "debug,sqlx=debug");
    }
}
