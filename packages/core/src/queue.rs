//! Queue configuration and statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, JobState};

/// Configuration for queue behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of concurrent workers. One worker gives strict FIFO execution.
    pub workers: u32,
    /// How long a finished job stays queryable (seconds).
    pub job_ttl_secs: u64,
    /// How often the retention sweep runs (seconds).
    pub sweep_interval_secs: u64,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            job_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            event_capacity: 1024,
        }
    }
}

impl QueueConfig {
    pub fn with_workers(mut self, workers: u32) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_job_ttl(mut self, ttl: Duration) -> Self {
        self.job_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_secs = interval.as_secs();
        self
    }

    pub fn job_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.job_ttl_secs).unwrap_or(i64::MAX))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep interval must be at least 1 second".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Build a config from environment variables.
    ///
    /// - `JOB_WORKERS` (default: 1)
    /// - `JOB_TTL_SECS` (default: 86400)
    /// - `JOB_SWEEP_INTERVAL_SECS` (default: 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`QueueConfig::from_env`] with a caller-supplied variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cfg = Self {
            workers: parse_var(&lookup, "JOB_WORKERS")?.unwrap_or(defaults.workers),
            job_ttl_secs: parse_var(&lookup, "JOB_TTL_SECS")?.unwrap_or(defaults.job_ttl_secs),
            sweep_interval_secs: parse_var(&lookup, "JOB_SWEEP_INTERVAL_SECS")?
                .unwrap_or(defaults.sweep_interval_secs),
            event_capacity: defaults.event_capacity,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        })
}

/// Per-state job counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl QueueStats {
    /// Count one job in the given state.
    pub fn record(&mut self, state: JobState) {
        match state {
            JobState::Queued => self.queued += 1,
            JobState::Running => self.running += 1,
            JobState::Completed => self.completed += 1,
            JobState::Failed => self.failed += 1,
            JobState::Cancelled => self.cancelled += 1,
        }
    }

    /// Jobs still in flight (queued + running).
    pub fn active(&self) -> u64 {
        self.queued + self.running
    }

    /// Total tracked jobs.
    pub fn total(&self) -> u64 {
        self.active() + self.completed + self.failed + self.cancelled
    }
}
