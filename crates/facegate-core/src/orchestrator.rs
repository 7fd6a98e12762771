//! Liveness orchestrator: drives one [`Session`] from permission to outcome.
//!
//! The orchestrator owns the capabilities and the [`PollScheduler`] and is the
//! only caller of the session's transitions. Everything runs on one task;
//! external calls are raced against the deadline and the teardown token, and a
//! call that loses the race is dropped with its result.

use std::future::Future;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::analysis::{DetectionResult, FaceAnalyzer, FaceComparer};
use crate::config::{ConfigError, SessionConfig};
use crate::encoded::EncodedImage;
use crate::error::{DeviceError, FaceError};
use crate::frame::{capture_with_retry, FrameSource, RetryPolicy};
use crate::scheduler::{PollScheduler, SchedulerEvent};
use crate::session::{Outcome, PollStep, Session, SessionEvent, StatusCode};

/// How a raced call ended.
enum Race<T> {
    Done(T),
    Deadline,
    Cancelled,
}

/// Session plus the channel its events are published on.
struct Tracked {
    session: Session,
    events: Option<UnboundedSender<SessionEvent>>,
}

impl Tracked {
    fn publish(&mut self) {
        for event in self.session.drain_events() {
            match &event {
                SessionEvent::PhaseChanged(phase) => tracing::info!(phase, "session phase changed"),
                SessionEvent::Status(status) => tracing::debug!(status = ?status, "status updated"),
                SessionEvent::Alert(status) => tracing::info!(alert = %status, "user alert"),
                SessionEvent::Resolved(Outcome::Success { similarity }) => {
                    tracing::info!(similarity, "session verified")
                }
                SessionEvent::Resolved(Outcome::Failure { reason, message }) => {
                    tracing::warn!(reason = %reason, detail = %message, "session failed")
                }
            }
            if let Some(tx) = &self.events {
                // Receiver gone means nobody is watching; the session still runs.
                let _ = tx.send(event);
            }
        }
    }
}

/// Runs a single liveness verification attempt.
pub struct LivenessOrchestrator<S, A, C> {
    config: SessionConfig,
    source: S,
    analyzer: A,
    comparer: C,
    reference: EncodedImage,
    tracked: Tracked,
}

impl<S, A, C> LivenessOrchestrator<S, A, C>
where
    S: FrameSource,
    A: FaceAnalyzer,
    C: FaceComparer,
{
    /// `reference` is the enrolled image the live capture is compared against.
    pub fn new(
        config: SessionConfig,
        source: S,
        analyzer: A,
        comparer: C,
        reference: EncodedImage,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let session = Session::new(&config);
        Ok(Self {
            config,
            source,
            analyzer,
            comparer,
            reference,
            tracked: Tracked {
                session,
                events: None,
            },
        })
    }

    /// Publish session events on `tx` as they happen.
    pub fn with_events(mut self, tx: UnboundedSender<SessionEvent>) -> Self {
        self.tracked.events = Some(tx);
        self
    }

    pub fn session(&self) -> &Session {
        &self.tracked.session
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    pub fn comparer(&self) -> &C {
        &self.comparer
    }

    /// Run the session to completion.
    ///
    /// Returns the outcome, or `None` if `cancel` fired first. Runs at most
    /// once; later calls return the recorded outcome.
    pub async fn run(&mut self, cancel: CancellationToken) -> Option<Outcome> {
        let span = tracing::info_span!(
            "liveness_session",
            session_id = %self.tracked.session.id(),
            reference = %self.reference.fingerprint(),
        );
        if self.tracked.session.begin() {
            self.drive(&cancel).instrument(span).await;
        }
        self.tracked.session.outcome().cloned()
    }

    async fn drive(&mut self, cancel: &CancellationToken) {
        self.tracked.publish();
        if !self.acquire_device(cancel).await {
            return;
        }

        let mut scheduler =
            PollScheduler::start(self.config.poll_interval(), self.config.deadline());
        tracing::info!(
            poll_ms = self.config.poll_interval_ms,
            deadline_ms = self.config.deadline_ms,
            required = self.config.required_consistent,
            "polling started"
        );

        if self.poll_until_capture(cancel, &mut scheduler).await {
            self.confirm_and_verify(cancel, &mut scheduler).await;
        }
        scheduler.stop();
    }

    /// Permission and device-ready handshake. Returns true once polling may
    /// begin; otherwise the session is resolved or disposed.
    async fn acquire_device(&mut self, cancel: &CancellationToken) -> bool {
        let Some(access) = until_cancelled(cancel, self.source.request_access()).await else {
            self.dispose();
            return false;
        };

        let ready = match access {
            Ok(()) => {
                self.tracked.session.permission_granted();
                self.tracked.publish();
                match until_cancelled(cancel, self.source.wait_ready()).await {
                    Some(ready) => ready,
                    None => {
                        self.dispose();
                        return false;
                    }
                }
            }
            Err(e) => Err(e),
        };

        let err = match ready {
            Ok(()) => {
                self.tracked.session.device_ready();
                self.tracked.publish();
                return true;
            }
            Err(e) => e,
        };

        tracing::warn!(error = %err, "camera not available");
        let status = match err {
            DeviceError::PermissionDenied(_) => StatusCode::PermissionRequired,
            _ => StatusCode::CameraError,
        };
        self.tracked.session.permission_denied(status);
        self.tracked.publish();

        // Let the status be seen before the failure is reported.
        let settle = tokio::time::sleep(self.config.permission_settle());
        if until_cancelled(cancel, settle).await.is_none() {
            self.dispose();
            return false;
        }
        self.tracked.session.conclude_permission_denied(err);
        self.tracked.publish();
        false
    }

    /// Returns true when the consistency run completed and capture began.
    async fn poll_until_capture(
        &mut self,
        cancel: &CancellationToken,
        scheduler: &mut PollScheduler,
    ) -> bool {
        let retry = self.config.capture_retry();
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.dispose();
                    return false;
                }
                event = scheduler.next() => event,
            };
            if event == SchedulerEvent::Deadline {
                self.expire();
                return false;
            }
            if !self.tracked.session.begin_detection() {
                tracing::debug!("tick skipped");
                continue;
            }

            let poll = detect_current_frame(&self.source, &self.analyzer, retry);
            let result = match race(cancel, scheduler, poll).await {
                Race::Done(result) => result,
                Race::Deadline => {
                    self.expire();
                    return false;
                }
                Race::Cancelled => {
                    self.dispose();
                    return false;
                }
            };
            match &result {
                Ok(detection) => tracing::debug!(faces = detection.face_count(), "poll result"),
                Err(e) => tracing::debug!(error = %e, "poll failed"),
            }

            let step = self
                .tracked
                .session
                .apply_detection(result, Instant::now());
            if step.extends_deadline() {
                scheduler.rearm_deadline();
            }
            self.tracked.publish();

            match step {
                PollStep::CaptureTriggered => {
                    scheduler.stop_polling();
                    tracing::info!("consistency reached, capturing");
                    return true;
                }
                PollStep::Qualified { count } => {
                    tracing::debug!(count, "consistent detection")
                }
                PollStep::Disqualified | PollStep::Ignored => {}
            }
        }
    }

    /// One-shot confirmation of a fresh frame, then comparison against the
    /// reference. Polling is already stopped; the deadline stays armed.
    async fn confirm_and_verify(
        &mut self,
        cancel: &CancellationToken,
        scheduler: &mut PollScheduler,
    ) {
        let retry = self.config.capture_retry();
        let source = &self.source;
        let analyzer = &self.analyzer;
        let confirm = async move {
            let image = capture_image(source, retry).await?;
            let detection = analyzer.detect_faces(&image).await?;
            Ok::<_, FaceError>((image, detection))
        };

        let (captured, result) = match race(cancel, scheduler, confirm).await {
            Race::Done(Ok((image, detection))) => (Some(image), Ok(detection)),
            Race::Done(Err(e)) => (None, Err(e)),
            Race::Deadline => return self.expire(),
            Race::Cancelled => return self.dispose(),
        };
        let confirmed = self.tracked.session.apply_confirmation(result);
        self.tracked.publish();
        let Some(captured) = captured.filter(|_| confirmed) else {
            return;
        };

        tracing::info!(
            format = %captured.format(),
            width = captured.width(),
            height = captured.height(),
            "liveness confirmed, comparing with reference"
        );
        let compare = self.comparer.compare_faces(
            &captured,
            &self.reference,
            self.config.similarity_threshold,
        );
        match race(cancel, scheduler, compare).await {
            Race::Done(result) => {
                if let Ok(comparison) = &result {
                    tracing::debug!(
                        matches = comparison.matches.len(),
                        unmatched = comparison.unmatched.len(),
                        "comparison result"
                    );
                }
                self.tracked.session.apply_comparison(result);
                self.tracked.publish();
            }
            Race::Deadline => self.expire(),
            Race::Cancelled => self.dispose(),
        }
    }

    fn expire(&mut self) {
        if self.tracked.session.apply_deadline() {
            tracing::warn!(
                consistent = self.tracked.session.consistent_count(),
                "session deadline reached"
            );
        }
        self.tracked.publish();
    }

    fn dispose(&mut self) {
        if self.tracked.session.dispose() {
            tracing::info!("session torn down");
        }
        self.tracked.publish();
    }
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Await `fut` while still honouring teardown and the deadline. Ticks that
/// fire meanwhile are dropped.
async fn race<F: Future>(
    cancel: &CancellationToken,
    scheduler: &mut PollScheduler,
    fut: F,
) -> Race<F::Output> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Race::Cancelled,
            event = scheduler.next() => match event {
                SchedulerEvent::Deadline => return Race::Deadline,
                SchedulerEvent::Tick => tracing::debug!("tick dropped, call in flight"),
            },
            out = &mut fut => return Race::Done(out),
        }
    }
}

async fn capture_image<S: FrameSource>(
    source: &S,
    retry: RetryPolicy,
) -> Result<EncodedImage, FaceError> {
    let frame = capture_with_retry(source, retry).await?;
    Ok(EncodedImage::parse(frame.data)?)
}

async fn detect_current_frame<S: FrameSource, A: FaceAnalyzer>(
    source: &S,
    analyzer: &A,
    retry: RetryPolicy,
) -> Result<DetectionResult, FaceError> {
    let image = capture_image(source, retry).await?;
    analyzer.detect_faces(&image).await
}
