//! Liveness verification core.
//!
//! A session samples frames from a [`FrameSource`], requires several
//! consecutive single-face detections from a [`FaceAnalyzer`], confirms one
//! final frame, and compares it with an enrolled reference through a
//! [`FaceComparer`]. The [`LivenessOrchestrator`] drives the [`Session`] state
//! machine; the capabilities are traits so transports and devices can be
//! swapped.

pub mod accumulator;
pub mod analysis;
pub mod config;
pub mod encoded;
pub mod error;
pub mod frame;
pub mod notifier;
pub mod orchestrator;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod testing;

pub use accumulator::ConsistencyAccumulator;
pub use analysis::{
    BoundingBox, ComparisonResult, DetectedFace, DetectionResult, FaceAnalyzer, FaceComparer,
    FaceMatch, Qualification, UnmatchedFace,
};
pub use config::{ConfigError, SessionConfig};
pub use encoded::{EncodedImage, ImageFormat};
pub use error::{DeviceError, FaceError, ServiceError, ValidationError};
pub use frame::{capture_with_retry, Frame, FrameSource, RetryPolicy};
pub use notifier::DebouncedNotifier;
pub use orchestrator::LivenessOrchestrator;
pub use scheduler::{PollScheduler, SchedulerEvent};
pub use session::{
    FailureReason, Outcome, Phase, PermissionState, PollStep, Session, SessionEvent, StatusCode,
};

pub use tokio_util::sync::CancellationToken;
