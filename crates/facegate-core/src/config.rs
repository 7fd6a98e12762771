use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::frame::RetryPolicy;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("poll interval ({poll_ms} ms) must be shorter than the deadline ({deadline_ms} ms)")]
    PollNotBelowDeadline { poll_ms: u64, deadline_ms: u64 },
    #[error("{name} must be within [0, 100], got {value}")]
    OutOfRange { name: &'static str, value: f32 },
}

/// Tunables for one liveness session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Period of the detection poll.
    pub poll_interval_ms: u64,
    /// Inactivity deadline; rearmed on every qualifying detection.
    pub deadline_ms: u64,
    /// Consecutive qualifying detections needed before capture.
    pub required_consistent: u32,
    /// A face qualifies only with confidence strictly above this.
    pub confidence_threshold: f32,
    /// Passed to the comparison capability.
    pub similarity_threshold: f32,
    /// Minimum spacing of "no face" alerts.
    pub alert_interval_ms: u64,
    pub alerts_enabled: bool,
    /// Frame capture attempts before a device error escalates.
    pub capture_attempts: u32,
    pub capture_backoff_ms: u64,
    /// Delay before a denied permission is reported as a failure.
    pub permission_settle_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            deadline_ms: 30_000,
            required_consistent: 3,
            confidence_threshold: 90.0,
            similarity_threshold: 70.0,
            alert_interval_ms: 5_000,
            alerts_enabled: true,
            capture_attempts: 3,
            capture_backoff_ms: 100,
            permission_settle_ms: 3_000,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.deadline_ms == 0 {
            return Err(ConfigError::Zero("deadline_ms"));
        }
        if self.required_consistent == 0 {
            return Err(ConfigError::Zero("required_consistent"));
        }
        if self.capture_attempts == 0 {
            return Err(ConfigError::Zero("capture_attempts"));
        }
        if self.poll_interval_ms >= self.deadline_ms {
            return Err(ConfigError::PollNotBelowDeadline {
                poll_ms: self.poll_interval_ms,
                deadline_ms: self.deadline_ms,
            });
        }
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("similarity_threshold", self.similarity_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_millis(self.alert_interval_ms)
    }

    pub fn permission_settle(&self) -> Duration {
        Duration::from_millis(self.permission_settle_ms)
    }

    pub fn capture_retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.capture_attempts,
            backoff: Duration::from_millis(self.capture_backoff_ms),
        }
    }
}
