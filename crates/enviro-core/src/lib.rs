//! Hardware-independent core library for enviro-rs
//!
//! This crate contains all platform-agnostic logic for the enviro air-quality
//! monitor: the sensor polling state machine, the differential scrolling plot,
//! the air-quality LED bands, MQTT publishing with Home-Assistant discovery
//! and the orchestrator that wires them together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod air_quality;
pub mod config;
pub mod plot;
pub mod poller;
pub mod publisher;
pub mod sensors;
pub mod station;

#[cfg(test)]
mod test_log;

/// Millisecond-resolution monotonic instant used for all interval math.
pub type Instant = fugit::Instant<u64, 1, 1_000>;

/// Millisecond-resolution duration matching [`Instant`].
pub type Duration = fugit::Duration<u64, 1, 1_000>;
