// src/logging.rs

//! Process-wide `tracing` subscriber.
//!
//! The level comes from the caller (normally `[logging] level`), then from
//! `JOBDISPATCH_LOG`, and is `info` otherwise. Output goes to stderr with
//! thread ids, since connection callbacks arrive on several threads.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::types::LogLevel;

/// Environment variable consulted when no level is configured.
pub const LOG_ENV_VAR: &str = "JOBDISPATCH_LOG";

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Pick the effective level. Unparsable environment values are ignored.
pub fn resolve_level(configured: Option<LogLevel>, env: Option<&str>) -> Level {
    configured
        .or_else(|| env.and_then(|raw| raw.parse::<LogLevel>().ok()))
        .map_or(Level::INFO, Level::from)
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let level = resolve_level(level, env.as_deref());

    fmt()
        .with_max_level(level)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}
