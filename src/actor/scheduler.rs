//! Drives [RoutingEngine::maintain] at the cadence the engine asks for.

use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::engine::{Datagram, EngineError, EventSink, RoutingEngine};

/// Delay used when the engine reports a failure, so maintenance keeps going.
pub const FALLBACK_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on a requested delay, keeps deadline arithmetic from overflowing.
pub const MAX_DELAY: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, Default)]
/// Re-armable one-shot timer.
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }

    /// Time left until expiry, `None` if disarmed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What started a maintenance step.
pub enum Trigger {
    Readable,
    Timer,
}

#[derive(Debug)]
/// Single-flight maintenance scheduler.
///
/// Idle: the timer is armed and no step is running.
/// Running: a step is executing and the timer is disarmed.
pub struct Scheduler {
    timer: Timer,
    running: bool,
    steps: u64,
}

impl Scheduler {
    /// The timer starts armed to fire immediately.
    pub fn new() -> Self {
        let mut timer = Timer::default();
        timer.arm(Instant::now());

        Scheduler {
            timer,
            running: false,
            steps: 0,
        }
    }

    // === Getters ===

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of completed maintenance steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// How long the host loop may wait for readiness before the timer fires.
    pub fn poll_timeout(&self, now: Instant) -> Option<Duration> {
        self.timer.remaining(now)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.running && self.timer.is_expired(now)
    }

    // === Public Methods ===

    /// Run one maintenance step and re-arm the timer with the delay the engine
    /// asked for.
    ///
    /// Returns the programmed delay, or `None` if a step is already running.
    pub fn step(
        &mut self,
        trigger: Trigger,
        engine: &mut dyn RoutingEngine,
        datagram: Option<Datagram<'_>>,
        sink: &mut dyn EventSink,
    ) -> Option<Duration> {
        if self.running {
            warn!(?trigger, "Maintenance step already running, ignoring trigger");
            return None;
        }

        self.running = true;
        // A socket event may preempt the timer, don't let it fire mid-step.
        self.timer.disarm();

        let result = engine.maintain(datagram, sink);

        self.running = false;
        self.steps += 1;

        let delay = Self::next_delay(result);
        self.timer.arm(Instant::now() + delay);

        trace!(?trigger, ?delay, steps = self.steps, "Maintenance step");

        Some(delay)
    }

    /// Stop scheduling, used on shutdown.
    pub fn stop(&mut self) {
        self.timer.disarm();
    }

    fn next_delay(result: Result<i64, EngineError>) -> Duration {
        match result {
            Ok(seconds) => Duration::from_secs(seconds.max(0) as u64).min(MAX_DELAY),
            Err(error) => {
                trace!(?error, "Maintenance failed, retrying after fallback delay");
                FALLBACK_DELAY
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
