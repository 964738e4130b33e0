//! Cooperative sensor polling state machine.
//!
//! The host loop calls [`SensorPoller::tick`] as often as it likes. All
//! interval math uses the injected monotonic time, so update and calibration
//! periods are real time spans regardless of loop speed.
//!
//! ```text
//! Waiting --(update due)--> Reading --> Updated --> Waiting
//!    \--(calibration due)--> Calibrating --------------/
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::sensors::{SensorReading, SensorSuite};
use crate::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Waiting,
    /// Drivers are queried on the next tick.
    Reading,
    /// A reading was committed on this tick; listeners have been notified.
    Updated,
    Calibrating,
    /// Terminal fault state. The steady-state cycle never enters it.
    Error,
}

/// Receives every committed reading, synchronously and in registration order.
///
/// A listener that blocks stalls the poller.
pub trait UpdateListener {
    fn on_update(&mut self, reading: &SensorReading);
}

impl<F: FnMut(&SensorReading)> UpdateListener for F {
    fn on_update(&mut self, reading: &SensorReading) {
        self(reading)
    }
}

pub struct SensorPoller<'a> {
    suite: SensorSuite<'a>,
    listeners: Vec<Box<dyn UpdateListener + 'a>>,
    state: PollState,
    update_timeout: Duration,
    calibration_timeout: Duration,
    last_update: Instant,
    last_calibration: Instant,
    latest: Option<SensorReading>,
}

impl<'a> SensorPoller<'a> {
    /// Both interval clocks start at `now`, so the first reading happens one
    /// `update_timeout` after construction.
    pub fn new(
        suite: SensorSuite<'a>,
        update_timeout: Duration,
        calibration_timeout: Duration,
        now: Instant,
    ) -> Self {
        info!(
            "Sensor poller started with {} sensors, update every {} ms, calibrate every {} s",
            suite.len(),
            update_timeout.to_millis(),
            calibration_timeout.to_secs()
        );
        Self {
            suite,
            listeners: Vec::new(),
            state: PollState::Waiting,
            update_timeout,
            calibration_timeout,
            last_update: now,
            last_calibration: now,
            latest: None,
        }
    }

    pub fn subscribe<L: UpdateListener + 'a>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Last committed reading, if any cycle has completed.
    pub fn latest(&self) -> Option<&SensorReading> {
        self.latest.as_ref()
    }

    /// Advance the state machine by one step.
    pub fn tick(&mut self, now: Instant) -> PollState {
        let previous = self.state;

        self.state = match self.state {
            PollState::Waiting => {
                if elapsed(now, self.last_update) > self.update_timeout {
                    PollState::Reading
                } else if elapsed(now, self.last_calibration) > self.calibration_timeout {
                    PollState::Calibrating
                } else {
                    PollState::Waiting
                }
            }
            PollState::Reading => {
                // Seeded from the last commit so a failing driver keeps its
                // previous values instead of dropping to zero.
                let mut pending = self.latest.unwrap_or_default();
                let failures = self.suite.read_all(&mut pending);
                if failures > 0 {
                    warn!(
                        "{} of {} sensors failed this cycle",
                        failures,
                        self.suite.len()
                    );
                }
                self.last_update = now;
                self.latest = Some(pending);
                PollState::Updated
            }
            PollState::Updated => PollState::Waiting,
            PollState::Calibrating => {
                info!("Running sensor calibration");
                self.suite.calibrate_all();
                self.last_calibration = now;
                PollState::Waiting
            }
            // TODO: decide whether a failed driver init should park the
            // poller here or just drop the driver from the suite.
            PollState::Error => PollState::Error,
        };

        if self.state != previous {
            debug!("Poll state {:?} -> {:?}", previous, self.state);
            if self.state == PollState::Updated {
                self.notify();
            }
        }

        self.state
    }

    fn notify(&mut self) {
        if let Some(reading) = self.latest.as_ref() {
            for listener in self.listeners.iter_mut() {
                listener.on_update(reading);
            }
        }
    }
}

fn elapsed(now: Instant, since: Instant) -> Duration {
    now.checked_duration_since(since)
        .unwrap_or(Duration::from_ticks(0))
}
