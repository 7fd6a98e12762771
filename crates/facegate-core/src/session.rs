//! The liveness session as an explicit state machine.
//!
//! [`Session`] owns every attribute of one verification attempt. It performs no
//! I/O and holds no timers: the orchestrator feeds it results through the
//! named `apply_*` transitions and acts on what they return. Once the session
//! is resolved or disposed, every transition is a no-op, so late results from
//! cancelled calls cannot change it.

use std::fmt;

use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::accumulator::ConsistencyAccumulator;
use crate::analysis::{ComparisonResult, DetectionResult, Qualification};
use crate::config::SessionConfig;
use crate::error::FaceError;
use crate::notifier::DebouncedNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

/// Stable reason codes for a failed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PermissionDenied,
    Timeout,
    CaptureUnavailable,
    InvalidImage,
    LivenessConfirmationFailed,
    ConfirmationError,
    NoMatch,
    VerificationError,
}

impl FailureReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::Timeout => "timeout",
            Self::CaptureUnavailable => "capture_unavailable",
            Self::InvalidImage => "invalid_image",
            Self::LivenessConfirmationFailed => "liveness_confirmation_failed",
            Self::ConfirmationError => "confirmation_error",
            Self::NoMatch => "no_match",
            Self::VerificationError => "verification_error",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::PermissionDenied => "camera permission denied",
            Self::Timeout => "no face registered before the deadline",
            Self::CaptureUnavailable => "capture unavailable",
            Self::InvalidImage => "image rejected",
            Self::LivenessConfirmationFailed => "liveness confirmation failed",
            Self::ConfirmationError => "liveness confirmation error",
            Self::NoMatch => "no match",
            Self::VerificationError => "verification error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        similarity: f32,
    },
    Failure {
        reason: FailureReason,
        message: String,
    },
}

impl Outcome {
    fn failure(reason: FailureReason, detail: impl fmt::Display) -> Self {
        Self::Failure {
            reason,
            message: format!("{}: {detail}", reason.describe()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason, .. } => Some(*reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Init,
    AwaitingPermission,
    Polling,
    Capturing,
    Verifying,
    Resolved(Outcome),
    Disposed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::AwaitingPermission => "awaiting_permission",
            Self::Polling => "polling",
            Self::Capturing => "capturing",
            Self::Verifying => "verifying",
            Self::Resolved(Outcome::Success { .. }) => "success",
            Self::Resolved(Outcome::Failure { .. }) => "failure",
            Self::Disposed => "disposed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Disposed)
    }
}

/// User-facing status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Waiting,
    PermissionRequired,
    CameraError,
    FaceDetected,
    NoFace,
    MultipleFaces,
    LowConfidence,
    CameraUnavailable,
    InvalidFrame,
    DetectionError,
    Capturing,
    Verifying,
    Verified,
    Failed(FailureReason),
}

impl StatusCode {
    pub fn text(self) -> &'static str {
        match self {
            Self::Waiting => "Bring your face closer to the camera.",
            Self::PermissionRequired => {
                "Please allow camera access. Check your camera settings."
            }
            Self::CameraError => "Camera error. Check that the camera is connected.",
            Self::FaceDetected => "Face detected! Hold your position.",
            Self::NoFace => "No face detected. Bring your face closer to the camera.",
            Self::MultipleFaces => "Only one face should be visible.",
            Self::LowConfidence => "Face not clear enough. Look straight at the camera.",
            Self::CameraUnavailable => {
                "Cannot take a picture from the camera. Check that it is connected."
            }
            Self::InvalidFrame => "Camera picture was unreadable. Retrying.",
            Self::DetectionError => "Face detection failed. Retrying.",
            Self::Capturing => "Hold still, confirming.",
            Self::Verifying => "Comparing with the enrolled photo.",
            Self::Verified => "Face verified successfully!",
            Self::Failed(FailureReason::Timeout) => {
                "No face was registered within the time limit."
            }
            Self::Failed(FailureReason::PermissionDenied) => "Camera permission denied.",
            Self::Failed(FailureReason::NoMatch) => "Face does not match the enrolled photo.",
            Self::Failed(FailureReason::LivenessConfirmationFailed) => {
                "Face confirmation failed."
            }
            Self::Failed(FailureReason::CaptureUnavailable) => {
                "Could not take the final picture."
            }
            Self::Failed(_) => "An error occurred during verification.",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Something observers of the session should hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(&'static str),
    Status(StatusCode),
    /// Throttled, user-facing alert.
    Alert(StatusCode),
    Resolved(Outcome),
}

/// What a polling result did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Session not polling (or already concluded); result discarded.
    Ignored,
    /// Qualifying detection; the run is now `count` long.
    Qualified { count: u32 },
    /// Qualifying detection that completed the run. Polling must stop.
    CaptureTriggered,
    /// Disqualifying result or error; the run was reset.
    Disqualified,
}

impl PollStep {
    /// Whether this step extends the session deadline.
    pub fn extends_deadline(self) -> bool {
        matches!(self, Self::Qualified { .. } | Self::CaptureTriggered)
    }
}

/// State of one verification attempt.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    phase: Phase,
    permission: PermissionState,
    webcam_ready: bool,
    captured: bool,
    detection_in_flight: bool,
    confidence_threshold: f32,
    accumulator: ConsistencyAccumulator,
    no_face_alert: DebouncedNotifier,
    status: StatusCode,
    outbox: Vec<SessionEvent>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Init,
            permission: PermissionState::Unknown,
            webcam_ready: false,
            captured: false,
            detection_in_flight: false,
            confidence_threshold: config.confidence_threshold,
            accumulator: ConsistencyAccumulator::new(config.required_consistent),
            no_face_alert: DebouncedNotifier::new(config.alert_interval(), config.alerts_enabled),
            status: StatusCode::Waiting,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn webcam_ready(&self) -> bool {
        self.webcam_ready
    }

    pub fn captured(&self) -> bool {
        self.captured
    }

    pub fn consistent_count(&self) -> u32 {
        self.accumulator.count()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn last_alert(&self) -> Option<Instant> {
        self.no_face_alert.last_fired()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.phase {
            Phase::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// `Init -> AwaitingPermission`.
    pub fn begin(&mut self) -> bool {
        if self.phase != Phase::Init {
            return false;
        }
        self.enter(Phase::AwaitingPermission);
        true
    }

    pub fn permission_granted(&mut self) -> bool {
        if self.phase != Phase::AwaitingPermission {
            return false;
        }
        self.permission = PermissionState::Granted;
        true
    }

    /// Record a denial (or a device that failed to come up). The failure is
    /// reported later by [`conclude_permission_denied`](Self::conclude_permission_denied).
    pub fn permission_denied(&mut self, status: StatusCode) -> bool {
        if self.phase != Phase::AwaitingPermission {
            return false;
        }
        self.permission = PermissionState::Denied;
        self.webcam_ready = false;
        self.set_status(status);
        true
    }

    pub fn conclude_permission_denied(&mut self, detail: impl fmt::Display) -> bool {
        if self.phase != Phase::AwaitingPermission || self.permission != PermissionState::Denied {
            return false;
        }
        self.resolve(Outcome::failure(FailureReason::PermissionDenied, detail))
    }

    /// Device-ready signal. Starts polling once permission is granted.
    pub fn device_ready(&mut self) -> bool {
        if self.phase != Phase::AwaitingPermission || self.permission != PermissionState::Granted {
            return false;
        }
        self.webcam_ready = true;
        self.enter(Phase::Polling);
        self.set_status(StatusCode::Waiting);
        true
    }

    /// Claim the single detection slot for a scheduler tick.
    ///
    /// Returns false when the tick must be dropped: not polling, device not
    /// ready, capture already begun, or a detection still in flight.
    pub fn begin_detection(&mut self) -> bool {
        if self.phase != Phase::Polling
            || !self.webcam_ready
            || self.captured
            || self.detection_in_flight
        {
            return false;
        }
        self.detection_in_flight = true;
        true
    }

    pub fn detection_in_flight(&self) -> bool {
        self.detection_in_flight
    }

    /// Apply one polling result (frame capture plus detection).
    pub fn apply_detection(
        &mut self,
        result: Result<DetectionResult, FaceError>,
        now: Instant,
    ) -> PollStep {
        if self.phase != Phase::Polling {
            return PollStep::Ignored;
        }
        self.detection_in_flight = false;

        let detection = match result {
            Ok(detection) => detection,
            Err(e) => {
                self.accumulator.reset();
                self.set_status(match e {
                    FaceError::Validation(_) => StatusCode::InvalidFrame,
                    FaceError::Device(_) => StatusCode::CameraUnavailable,
                    FaceError::Service(_) => StatusCode::DetectionError,
                });
                return PollStep::Disqualified;
            }
        };

        match detection.qualify(self.confidence_threshold) {
            Qualification::Qualified { .. } => {
                if self.accumulator.record_qualifying() {
                    self.captured = true;
                    self.enter(Phase::Capturing);
                    self.set_status(StatusCode::Capturing);
                    PollStep::CaptureTriggered
                } else {
                    self.set_status(StatusCode::FaceDetected);
                    PollStep::Qualified {
                        count: self.accumulator.count(),
                    }
                }
            }
            Qualification::NoFace => {
                self.accumulator.reset();
                self.set_status(StatusCode::NoFace);
                if self.no_face_alert.try_fire(now) {
                    self.outbox.push(SessionEvent::Alert(StatusCode::NoFace));
                }
                PollStep::Disqualified
            }
            Qualification::MultipleFaces { .. } => {
                self.accumulator.reset();
                self.set_status(StatusCode::MultipleFaces);
                PollStep::Disqualified
            }
            Qualification::LowConfidence { .. } => {
                self.accumulator.reset();
                self.set_status(StatusCode::LowConfidence);
                PollStep::Disqualified
            }
        }
    }

    /// Apply the one-shot confirmation of the captured frame. Returns true when
    /// the session moved on to verification.
    pub fn apply_confirmation(&mut self, result: Result<DetectionResult, FaceError>) -> bool {
        if self.phase != Phase::Capturing {
            return false;
        }
        let detection = match result {
            Ok(detection) => detection,
            Err(FaceError::Device(e)) => {
                self.resolve(Outcome::failure(FailureReason::CaptureUnavailable, e));
                return false;
            }
            Err(FaceError::Validation(e)) => {
                self.resolve(Outcome::failure(FailureReason::InvalidImage, e));
                return false;
            }
            Err(FaceError::Service(e)) => {
                self.resolve(Outcome::failure(FailureReason::ConfirmationError, e));
                return false;
            }
        };

        let detail = match detection.qualify(self.confidence_threshold) {
            Qualification::Qualified { .. } => {
                self.enter(Phase::Verifying);
                self.set_status(StatusCode::Verifying);
                return true;
            }
            Qualification::NoFace => "no face in final frame".to_string(),
            Qualification::MultipleFaces { count } => format!("{count} faces in final frame"),
            Qualification::LowConfidence { confidence } => {
                format!("final frame confidence {confidence:.1}")
            }
        };
        self.resolve(Outcome::failure(
            FailureReason::LivenessConfirmationFailed,
            detail,
        ));
        false
    }

    /// Apply the comparison against the enrolled reference.
    pub fn apply_comparison(&mut self, result: Result<ComparisonResult, FaceError>) -> bool {
        if self.phase != Phase::Verifying {
            return false;
        }
        let outcome = match result {
            Ok(comparison) => match comparison.top_similarity() {
                Some(similarity) => Outcome::Success { similarity },
                None => Outcome::failure(
                    FailureReason::NoMatch,
                    format!("{} unmatched face(s)", comparison.unmatched.len()),
                ),
            },
            Err(FaceError::Validation(e)) => Outcome::failure(FailureReason::InvalidImage, e),
            Err(e) => Outcome::failure(FailureReason::VerificationError, e),
        };
        self.resolve(outcome)
    }

    /// Deadline expiry. Fails any active phase with `timeout`.
    pub fn apply_deadline(&mut self) -> bool {
        if !matches!(
            self.phase,
            Phase::Polling | Phase::Capturing | Phase::Verifying
        ) {
            return false;
        }
        let detail = format!("{} consistent detection(s)", self.accumulator.count());
        self.resolve(Outcome::failure(FailureReason::Timeout, detail))
    }

    /// Tear the session down without an outcome.
    pub fn dispose(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.detection_in_flight = false;
        self.enter(Phase::Disposed);
        true
    }

    fn resolve(&mut self, outcome: Outcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.detection_in_flight = false;
        self.set_status(match &outcome {
            Outcome::Success { .. } => StatusCode::Verified,
            Outcome::Failure { reason, .. } => StatusCode::Failed(*reason),
        });
        self.enter(Phase::Resolved(outcome.clone()));
        self.outbox.push(SessionEvent::Resolved(outcome));
        true
    }

    fn enter(&mut self, phase: Phase) {
        self.outbox.push(SessionEvent::PhaseChanged(phase.name()));
        self.phase = phase;
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.outbox.push(SessionEvent::Status(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DetectedFace, FaceMatch, UnmatchedFace};
    use crate::error::{DeviceError, ServiceError, ValidationError};
    use std::time::Duration;

    fn detection(confidences: &[f32]) -> Result<DetectionResult, FaceError> {
        Ok(DetectionResult {
            faces: confidences
                .iter()
                .map(|&confidence| DetectedFace {
                    confidence,
                    bounding_box: None,
                })
                .collect(),
        })
    }

    fn polling_session() -> Session {
        let mut s = Session::new(&SessionConfig::default());
        assert!(s.begin());
        assert!(s.permission_granted());
        assert!(s.device_ready());
        s
    }

    fn poll(s: &mut Session, result: Result<DetectionResult, FaceError>) -> PollStep {
        assert!(s.begin_detection());
        s.apply_detection(result, Instant::now())
    }

    fn verifying_session() -> Session {
        let mut s = polling_session();
        for _ in 0..3 {
            poll(&mut s, detection(&[99.0]));
        }
        assert!(s.apply_confirmation(detection(&[95.0])));
        s
    }

    #[test]
    fn test_permission_then_ready_enters_polling() {
        let mut s = Session::new(&SessionConfig::default());
        assert_eq!(s.phase(), &Phase::Init);
        // Ready before permission is ignored
        s.begin();
        assert!(!s.device_ready());
        s.permission_granted();
        assert!(s.device_ready());
        assert_eq!(s.phase(), &Phase::Polling);
        assert!(s.webcam_ready());
        assert_eq!(s.permission(), PermissionState::Granted);
    }

    #[test]
    fn test_denied_permission_resolves_only_when_concluded() {
        let mut s = Session::new(&SessionConfig::default());
        s.begin();
        assert!(s.permission_denied(StatusCode::PermissionRequired));
        assert_eq!(s.phase(), &Phase::AwaitingPermission);
        assert_eq!(s.status(), StatusCode::PermissionRequired);
        assert!(s.conclude_permission_denied("user declined"));
        assert_eq!(
            s.outcome().and_then(Outcome::failure_reason),
            Some(FailureReason::PermissionDenied)
        );
    }

    #[test]
    fn test_count_equals_run_length_and_capture_fires_at_three() {
        let mut s = polling_session();
        assert_eq!(poll(&mut s, detection(&[95.0])), PollStep::Qualified { count: 1 });
        assert_eq!(s.consistent_count(), 1);
        assert_eq!(poll(&mut s, detection(&[95.0])), PollStep::Qualified { count: 2 });
        assert!(!s.captured());
        assert_eq!(poll(&mut s, detection(&[95.0])), PollStep::CaptureTriggered);
        assert!(s.captured());
        assert_eq!(s.phase(), &Phase::Capturing);
        // Further polls are suppressed
        assert!(!s.begin_detection());
        assert_eq!(
            s.apply_detection(detection(&[95.0]), Instant::now()),
            PollStep::Ignored
        );
        assert_eq!(s.consistent_count(), 3);
    }

    #[test]
    fn test_any_disqualification_resets_run() {
        let cases = [
            detection(&[]),
            detection(&[99.0, 98.0]),
            detection(&[90.0]),
            detection(&[42.0]),
            Err(ServiceError::Unreachable("down".into()).into()),
            Err(ValidationError::UnsupportedEncoding.into()),
            Err(DeviceError::Busy.into()),
        ];
        for case in cases {
            let mut s = polling_session();
            poll(&mut s, detection(&[99.0]));
            poll(&mut s, detection(&[99.0]));
            assert_eq!(s.consistent_count(), 2);
            assert_eq!(poll(&mut s, case), PollStep::Disqualified);
            assert_eq!(s.consistent_count(), 0);
            assert_eq!(s.phase(), &Phase::Polling);
        }
    }

    #[test]
    fn test_status_distinguishes_no_face_and_multiple_faces() {
        let mut s = polling_session();
        poll(&mut s, detection(&[]));
        assert_eq!(s.status(), StatusCode::NoFace);
        poll(&mut s, detection(&[99.0, 97.0]));
        assert_eq!(s.status(), StatusCode::MultipleFaces);
    }

    #[test]
    fn test_no_face_alert_is_throttled() {
        let mut s = polling_session();
        let t0 = Instant::now();
        let alerts = |events: Vec<SessionEvent>| {
            events
                .into_iter()
                .filter(|e| matches!(e, SessionEvent::Alert(_)))
                .count()
        };
        s.drain_events();

        s.begin_detection();
        s.apply_detection(detection(&[]), t0);
        assert_eq!(alerts(s.drain_events()), 1);

        s.begin_detection();
        s.apply_detection(detection(&[]), t0 + Duration::from_secs(2));
        assert_eq!(alerts(s.drain_events()), 0);

        // Multiple faces never alert
        s.begin_detection();
        s.apply_detection(detection(&[99.0, 99.0]), t0 + Duration::from_secs(6));
        assert_eq!(alerts(s.drain_events()), 0);

        s.begin_detection();
        s.apply_detection(detection(&[]), t0 + Duration::from_secs(6));
        assert_eq!(alerts(s.drain_events()), 1);
        assert_eq!(s.last_alert(), Some(t0 + Duration::from_secs(6)));
    }

    #[test]
    fn test_alerts_can_be_disabled() {
        let cfg = SessionConfig {
            alerts_enabled: false,
            ..Default::default()
        };
        let mut s = Session::new(&cfg);
        s.begin();
        s.permission_granted();
        s.device_ready();
        s.begin_detection();
        s.apply_detection(detection(&[]), Instant::now());
        assert!(!s
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::Alert(_))));
        assert_eq!(s.status(), StatusCode::NoFace);
    }

    #[test]
    fn test_only_one_detection_in_flight() {
        let mut s = polling_session();
        assert!(s.begin_detection());
        assert!(!s.begin_detection());
        s.apply_detection(detection(&[99.0]), Instant::now());
        assert!(s.begin_detection());
    }

    #[test]
    fn test_confirmation_gates_verification() {
        let mut s = verifying_session();
        assert_eq!(s.phase(), &Phase::Verifying);

        let mut s = polling_session();
        for _ in 0..3 {
            poll(&mut s, detection(&[99.0]));
        }
        assert!(!s.apply_confirmation(detection(&[99.0, 99.0])));
        assert_eq!(
            s.outcome().and_then(Outcome::failure_reason),
            Some(FailureReason::LivenessConfirmationFailed)
        );
    }

    #[test]
    fn test_confirmation_errors_map_to_distinct_reasons() {
        let cases = [
            (
                FaceError::from(DeviceError::Unavailable("gone".into())),
                FailureReason::CaptureUnavailable,
            ),
            (
                ValidationError::UnsupportedEncoding.into(),
                FailureReason::InvalidImage,
            ),
            (
                ServiceError::Unreachable("down".into()).into(),
                FailureReason::ConfirmationError,
            ),
        ];
        for (err, reason) in cases {
            let mut s = polling_session();
            for _ in 0..3 {
                poll(&mut s, detection(&[99.0]));
            }
            s.apply_confirmation(Err(err));
            assert_eq!(s.outcome().and_then(Outcome::failure_reason), Some(reason));
        }
    }

    #[test]
    fn test_match_resolves_success_with_first_similarity() {
        let mut s = verifying_session();
        let comparison = ComparisonResult {
            matches: vec![FaceMatch {
                similarity: 88.0,
                face_confidence: 99.9,
                bounding_box: None,
            }],
            unmatched: Vec::new(),
        };
        assert!(s.apply_comparison(Ok(comparison)));
        assert_eq!(s.outcome(), Some(&Outcome::Success { similarity: 88.0 }));
        assert_eq!(s.status(), StatusCode::Verified);
    }

    #[test]
    fn test_empty_matches_is_no_match_not_error() {
        let mut s = verifying_session();
        let comparison = ComparisonResult {
            matches: Vec::new(),
            unmatched: vec![UnmatchedFace {
                face_confidence: 99.0,
                bounding_box: None,
            }],
        };
        s.apply_comparison(Ok(comparison));
        assert_eq!(
            s.outcome().and_then(Outcome::failure_reason),
            Some(FailureReason::NoMatch)
        );

        let mut s = verifying_session();
        s.apply_comparison(Err(ServiceError::Status {
            status: 500,
            message: "boom".into(),
        }
        .into()));
        assert_eq!(
            s.outcome().and_then(Outcome::failure_reason),
            Some(FailureReason::VerificationError)
        );
    }

    #[test]
    fn test_deadline_times_out_active_phases_regardless_of_count() {
        let mut s = polling_session();
        poll(&mut s, detection(&[99.0]));
        poll(&mut s, detection(&[99.0]));
        assert!(s.apply_deadline());
        assert_eq!(
            s.outcome().and_then(Outcome::failure_reason),
            Some(FailureReason::Timeout)
        );

        let mut s = verifying_session();
        assert!(s.apply_deadline());
        assert_eq!(
            s.outcome().and_then(Outcome::failure_reason),
            Some(FailureReason::Timeout)
        );

        let mut s = Session::new(&SessionConfig::default());
        s.begin();
        assert!(!s.apply_deadline());
    }

    #[test]
    fn test_exactly_one_terminal_transition() {
        let mut s = verifying_session();
        s.drain_events();
        assert!(s.apply_deadline());
        assert!(!s.apply_deadline());
        assert!(!s.apply_comparison(Ok(ComparisonResult::default())));
        assert!(!s.dispose());
        let resolved = s
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Resolved(_)))
            .count();
        assert_eq!(resolved, 1);
        assert_eq!(
            s.outcome().and_then(Outcome::failure_reason),
            Some(FailureReason::Timeout)
        );
    }

    #[test]
    fn test_disposed_session_ignores_late_results() {
        let mut s = polling_session();
        poll(&mut s, detection(&[99.0]));
        assert!(s.begin_detection());
        assert!(s.dispose());
        assert_eq!(
            s.apply_detection(detection(&[99.0]), Instant::now()),
            PollStep::Ignored
        );
        assert!(!s.apply_deadline());
        assert_eq!(s.consistent_count(), 1);
        assert_eq!(s.phase(), &Phase::Disposed);
        assert_eq!(s.outcome(), None);
    }

    #[test]
    fn test_failure_reason_codes_are_distinct() {
        let all = [
            FailureReason::PermissionDenied,
            FailureReason::Timeout,
            FailureReason::CaptureUnavailable,
            FailureReason::InvalidImage,
            FailureReason::LivenessConfirmationFailed,
            FailureReason::ConfirmationError,
            FailureReason::NoMatch,
            FailureReason::VerificationError,
        ];
        let mut codes: Vec<_> = all.iter().map(|r| r.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_outcome_serializes_with_reason_code() {
        let outcome = Outcome::failure(FailureReason::NoMatch, "1 unmatched face(s)");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["reason"], "no_match");

        let json = serde_json::to_value(Outcome::Success { similarity: 88.0 }).unwrap();
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["similarity"], 88.0);
    }
}
