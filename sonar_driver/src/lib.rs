//! Timing core for HC-SR04 style ultrasonic rangefinders.
//!
//! A trigger pulse comes out of a timer running in one-pulse mode, the echo pulse is
//! timestamped from an edge interrupt, and the pulse width is turned into centimeters.
//! Everything board specific sits behind the traits in [`platform`].
#![cfg_attr(not(test), no_std)]

pub mod distance;
pub mod driver;
pub mod echo_capture;
pub mod platform;
pub mod pulse_timer;

#[cfg(test)]
mod sim;

pub use distance::{estimate, DistanceEstimator, Reading};
pub use driver::{DriverState, SensorDriver};
pub use echo_capture::{CaptureState, CaptureStatus, EchoCapture, Edge, EdgeLatch};
pub use platform::{EdgeInterrupt, OnePulseTimer, TickCounter};
pub use pulse_timer::{PulseConfig, PulseTimer};

/// Construction failures. The driver cannot be built with these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// No integer prescaler gets within tolerance of the requested tick rate
    UnachievableRate,
    InvalidPulseWidth,
    PeriodTooLong,
    /// The tick counter and the pulse timer disagree on the tick rate
    TickRateMismatch,
}

/// A measurement cycle could not start. Try again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusyError {
    TimerBusy,
    CaptureBusy,
}
