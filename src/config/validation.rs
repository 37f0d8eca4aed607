//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (resolution > 0, bucket count, timeouts)
//! - Keep the tick cadence within one scheduler tick
//! - Check the bind address parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidBindAddress(String),
    ZeroResolution,
    TooFewBuckets(usize),
    ZeroTickInterval,
    TickIntervalAboveResolution { tick_interval_ms: u64, resolution_ms: u64 },
    ZeroMaxPending,
    SleepCeilingBelowResolution { max_sleep_ms: u64, resolution_ms: u64 },
    EmptyIndexFile,
    ZeroMaxConcurrentScripts,
    EmptyFallbackIndex,
    ZeroProcessTimeout,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(addr) => write!(f, "invalid bind address '{}'", addr),
            ValidationError::ZeroResolution => write!(f, "scheduler.resolution_ms must be > 0"),
            ValidationError::TooFewBuckets(n) => write!(f, "scheduler.bucket_count must be >= 2 (got {})", n),
            ValidationError::ZeroTickInterval => write!(f, "scheduler.tick_interval_ms must be > 0"),
            ValidationError::TickIntervalAboveResolution { tick_interval_ms, resolution_ms } => write!(
                f,
                "scheduler.tick_interval_ms ({}) must not exceed scheduler.resolution_ms ({})",
                tick_interval_ms, resolution_ms
            ),
            ValidationError::ZeroMaxPending => write!(f, "scheduler.max_pending must be > 0"),
            ValidationError::SleepCeilingBelowResolution { max_sleep_ms, resolution_ms } => write!(
                f,
                "scheduler.max_sleep_ms ({}) is below one tick ({} ms)",
                max_sleep_ms, resolution_ms
            ),
            ValidationError::EmptyIndexFile => write!(f, "script.index_file must not be empty"),
            ValidationError::ZeroMaxConcurrentScripts => write!(f, "script.max_concurrent must be > 0"),
            ValidationError::EmptyFallbackIndex => write!(f, "vhost.fallback_index must not be empty"),
            ValidationError::ZeroProcessTimeout => write!(f, "timeouts.process_secs must be > 0"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }

    let scheduler = &config.scheduler;
    if scheduler.resolution_ms == 0 {
        errors.push(ValidationError::ZeroResolution);
    }
    if scheduler.bucket_count < 2 {
        errors.push(ValidationError::TooFewBuckets(scheduler.bucket_count));
    }
    if scheduler.tick_interval_ms == 0 {
        errors.push(ValidationError::ZeroTickInterval);
    }
    if scheduler.resolution_ms > 0 && scheduler.tick_interval_ms > scheduler.resolution_ms {
        errors.push(ValidationError::TickIntervalAboveResolution {
            tick_interval_ms: scheduler.tick_interval_ms,
            resolution_ms: scheduler.resolution_ms,
        });
    }
    if scheduler.max_pending == 0 {
        errors.push(ValidationError::ZeroMaxPending);
    }
    if scheduler.resolution_ms > 0 && scheduler.max_sleep_ms < scheduler.resolution_ms {
        errors.push(ValidationError::SleepCeilingBelowResolution {
            max_sleep_ms: scheduler.max_sleep_ms,
            resolution_ms: scheduler.resolution_ms,
        });
    }

    if config.script.index_file.trim().is_empty() {
        errors.push(ValidationError::EmptyIndexFile);
    }
    if config.script.max_concurrent == 0 {
        errors.push(ValidationError::ZeroMaxConcurrentScripts);
    }
    if config.vhost.fallback_index.trim().is_empty() {
        errors.push(ValidationError::EmptyFallbackIndex);
    }
    if config.timeouts.process_secs == 0 {
        errors.push(ValidationError::ZeroProcessTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
