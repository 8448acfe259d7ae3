//! Per-stage countdown.
//!
//! [`Countdown`] holds the remaining time and the threshold bookkeeping and is
//! owned by the session. [`Ticker`] is the clock that drives it: it reports how
//! many whole seconds elapsed since its last report, once per second while it
//! runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Threshold {
    ThirtySeconds,
    TenSeconds,
}

impl Threshold {
    pub fn seconds(&self) -> u32 {
        match self {
            Threshold::ThirtySeconds => 30,
            Threshold::TenSeconds => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Tick { remaining: u32 },
    Warning(Threshold),
    Timeout,
}

/// Remaining time for the current stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    remaining: u32,
    armed: bool,
    warned_30: bool,
    warned_10: bool,
}

impl Countdown {
    /// Arm with a fresh stage limit; both warnings become available again.
    pub fn arm(&mut self, seconds: u32) {
        self.remaining = seconds;
        self.armed = true;
        self.warned_30 = false;
        self.warned_10 = false;
    }

    /// Stop reacting to ticks. Idempotent.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Advance by `elapsed` seconds.
    ///
    /// A delayed tick may cover several seconds at once; every threshold band
    /// passed through on the way fires, in decreasing-time order, before the
    /// timeout.
    pub fn tick(&mut self, elapsed: u32) -> Vec<TimerSignal> {
        if !self.armed || elapsed == 0 {
            return Vec::new();
        }

        let previous = self.remaining;
        let remaining = previous.saturating_sub(elapsed);
        self.remaining = remaining;
        let mut signals = vec![TimerSignal::Tick { remaining }];

        // Seconds visited during this tick: remaining ..= previous - 1.
        let visited = |low: u32, high: u32| remaining <= high && previous.saturating_sub(1) > low;

        if !self.warned_30 && visited(10, 30) {
            self.warned_30 = true;
            signals.push(TimerSignal::Warning(Threshold::ThirtySeconds));
        }
        if !self.warned_10 && visited(0, 10) {
            self.warned_10 = true;
            signals.push(TimerSignal::Warning(Threshold::TenSeconds));
        }
        if self.remaining == 0 {
            self.armed = false;
            signals.push(TimerSignal::Timeout);
        }

        signals
    }
}

/// One-second clock feeding elapsed seconds to a callback.
///
/// Stopping is idempotent. A stopped ticker never calls back again; consumers
/// additionally tag each start with an epoch so a report already in flight
/// when the ticker stopped can be recognised and dropped.
#[derive(Debug, Default)]
pub struct Ticker {
    cancel: Option<CancellationToken>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking, replacing any previous run.
    pub fn start<F>(&mut self, on_tick: F)
    where
        F: Fn(u32) + Send + 'static,
    {
        self.stop();
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        tokio::spawn(async move {
            let started = Instant::now();
            let mut reported: u64 = 0;
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of an interval completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let total = started.elapsed().as_secs();
                        let elapsed = total.saturating_sub(reported);
                        if elapsed == 0 {
                            continue;
                        }
                        reported = total;
                        if cancel.is_cancelled() {
                            break;
                        }
                        trace!(elapsed, "timer tick");
                        on_tick(elapsed as u32);
                    }
                }
            }
        });
    }

    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
