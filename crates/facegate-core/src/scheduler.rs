use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    Tick,
    Deadline,
}

/// Owns the repeating poll timer and the one-shot deadline timer.
///
/// At most one of each is armed. Ticks that fire while the caller is busy are
/// skipped, never queued.
#[derive(Debug)]
pub struct PollScheduler {
    poll: Option<Interval>,
    deadline: Option<Pin<Box<Sleep>>>,
    deadline_period: Duration,
}

impl PollScheduler {
    /// Arm both timers. The first tick fires one full period after start.
    pub fn start(tick_interval: Duration, deadline: Duration) -> Self {
        let mut poll = interval_at(Instant::now() + tick_interval, tick_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            poll: Some(poll),
            deadline: Some(Box::pin(sleep(deadline))),
            deadline_period: deadline,
        }
    }

    /// Push the deadline a full period into the future. Tick cadence is
    /// untouched; no-op once the deadline has fired or been cancelled.
    pub fn rearm_deadline(&mut self) {
        if let Some(deadline) = self.deadline.as_mut() {
            deadline.as_mut().reset(Instant::now() + self.deadline_period);
        }
    }

    /// Cancel the poll timer, keeping the deadline armed.
    pub fn stop_polling(&mut self) {
        self.poll = None;
    }

    /// Cancel both timers.
    pub fn stop(&mut self) {
        self.poll = None;
        self.deadline = None;
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    pub fn deadline_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the next timer event. Pends forever when nothing is armed.
    ///
    /// Cancel-safe: dropping the future loses no event.
    pub async fn next(&mut self) -> SchedulerEvent {
        let Self { poll, deadline, .. } = self;

        let expired = async {
            match deadline.as_mut() {
                Some(timer) => timer.as_mut().await,
                None => pending().await,
            }
        };
        let ticked = async {
            match poll.as_mut() {
                Some(interval) => {
                    interval.tick().await;
                }
                None => pending().await,
            }
        };

        let event = tokio::select! {
            biased;
            () = expired => SchedulerEvent::Deadline,
            () = ticked => SchedulerEvent::Tick,
        };
        if event == SchedulerEvent::Deadline {
            self.deadline = None;
        }
        event
    }
}
