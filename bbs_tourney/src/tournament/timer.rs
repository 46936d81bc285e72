//! Join window bookkeeping and cancellable countdowns.
//!
//! [`JoinWindow`] is the wall-clock view the coordinator checks joins
//! against. [`Countdown`] is the scheduled timer the actor awaits; it fires
//! on expiry and can be locked early or cancelled through its
//! [`CountdownHandle`], independent of how busy the caller is.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tokio::{sync::watch, time::Instant};

/// Wall-clock join window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinWindow {
    pub opened_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl JoinWindow {
    pub fn open(now: DateTime<Utc>, period: Duration) -> Self {
        let period = TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX);
        Self {
            opened_at: now,
            deadline: now.checked_add_signed(period).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.deadline
    }

    /// Time left before the deadline, zero once passed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whole seconds left, rounded up, for the "time remaining" display.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        let remaining = self.remaining(now);
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }
}

/// Why a countdown stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Deadline reached
    Expired,
    /// Closed early on request (host lock)
    Locked,
    /// Abandoned; whatever it gated should be discarded
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Running,
    Lock,
    Cancel,
}

/// Stand-in deadline when `now + period` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Scheduled deadline that can be awaited inside `tokio::select!`.
#[derive(Debug)]
pub struct Countdown {
    deadline: Instant,
    signal: watch::Receiver<Signal>,
    finished: Option<TimerOutcome>,
}

/// Control side of a [`Countdown`].
#[derive(Debug, Clone)]
pub struct CountdownHandle {
    signal: watch::Sender<Signal>,
}

impl Countdown {
    /// Start a countdown of `period` from now.
    pub fn start(period: Duration) -> (Self, CountdownHandle) {
        let (tx, rx) = watch::channel(Signal::Running);
        let now = Instant::now();
        let countdown = Self {
            deadline: now
                .checked_add(period)
                .unwrap_or_else(|| now + FAR_FUTURE),
            signal: rx,
            finished: None,
        };
        (countdown, CountdownHandle { signal: tx })
    }

    /// Wait for expiry, lock, or cancellation.
    ///
    /// Cancel-safe: dropping the future and calling again resumes waiting on
    /// the same deadline. Once finished, returns the same outcome forever.
    pub async fn wait(&mut self) -> TimerOutcome {
        if let Some(outcome) = self.finished {
            return outcome;
        }

        let outcome = loop {
            match *self.signal.borrow_and_update() {
                Signal::Lock => break TimerOutcome::Locked,
                Signal::Cancel => break TimerOutcome::Cancelled,
                Signal::Running => {}
            }

            tokio::select! {
                _ = tokio::time::sleep_until(self.deadline) => break TimerOutcome::Expired,
                changed = self.signal.changed() => {
                    if changed.is_err() {
                        // Handle dropped: nobody can lock or cancel any more.
                        tokio::time::sleep_until(self.deadline).await;
                        break TimerOutcome::Expired;
                    }
                }
            }
        };

        self.finished = Some(outcome);
        outcome
    }
}

impl CountdownHandle {
    /// Fire the countdown now as [`TimerOutcome::Locked`].
    pub fn lock(&self) {
        self.signal.send_replace(Signal::Lock);
    }

    /// Abandon the countdown as [`TimerOutcome::Cancelled`].
    pub fn cancel(&self) {
        self.signal.send_replace(Signal::Cancel);
    }
}
