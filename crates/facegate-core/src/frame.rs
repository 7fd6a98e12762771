use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::DeviceError;

/// One encoded frame as delivered by a [`FrameSource`]. Not validated yet.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            captured_at: Utc::now(),
        }
    }
}

/// Camera-like device that hands out the current frame on demand.
pub trait FrameSource: Send + Sync {
    /// Ask for permission to use the device.
    fn request_access(&self) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Resolve once the device delivers frames.
    fn wait_ready(&self) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Grab the current frame. May fail transiently while the device is busy.
    fn capture(&self) -> impl Future<Output = Result<Frame, DeviceError>> + Send;
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Capture a frame, retrying transient failures up to `policy.attempts` times.
///
/// A denied permission is not transient and is returned immediately. After the
/// last failed attempt the last error is returned.
pub async fn capture_with_retry<S: FrameSource>(
    source: &S,
    policy: RetryPolicy,
) -> Result<Frame, DeviceError> {
    let attempts = policy.attempts.max(1);
    let mut last_err = DeviceError::Busy;

    for attempt in 1..=attempts {
        match source.capture().await {
            Ok(frame) => return Ok(frame),
            Err(e @ DeviceError::PermissionDenied(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(attempt, max = attempts, error = %e, "frame capture failed");
                last_err = e;
            }
        }
        if attempt < attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(last_err)
}
