//! # Stepper Output Port (L0)
//!
//! The lowest layer of the motion stack: a platform abstraction over the
//! motor-driver enable line, per-axis direction/step GPIOs, and the timer
//! that re-arms the stepper interrupt.
//!
//! This crate defines the `StepperPort` contract only. A real hardware
//! backend (GPIO register writes, timer peripheral wiring, TMC/DRV8825
//! driver chips) is out of scope here — see `DESIGN.md` at the workspace
//! root. The one backend this crate ships is [`SimulationPort`], a
//! host-testable implementation that records step positions and drives
//! its callback synchronously from [`SimulationPort::sleep`].

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(warnings)]

/// Default re-arm interval, in microseconds, used while the stepper driver
/// has no block to execute.
pub const DEFAULT_INTERVAL_US: u32 = 1000;

/// Platform abstraction for a multi-axis stepper motor driver.
///
/// Implementors own the enable line, the per-axis direction/step GPIOs,
/// and the periodic timer that re-arms at an interval the stepper driver
/// (L3) computes every tick. `AXES` is the number of physical stepper
/// outputs.
pub trait StepperPort<const AXES: usize> {
    /// Arms the periodic timer at [`DEFAULT_INTERVAL_US`]. Registering the
    /// concrete interrupt vector with a hardware timer peripheral is the
    /// caller's responsibility (timer plumbing is out of this crate's
    /// scope); `init` only establishes the starting interval.
    fn init(&mut self);

    /// Masks the stepper timer interrupt. Not required to nest.
    fn interrupt_disable(&mut self);

    /// Unmasks the stepper timer interrupt.
    fn interrupt_enable(&mut self);

    /// Asserts the motor-driver enable line.
    fn enable(&mut self);

    /// De-asserts the motor-driver enable line.
    fn disable(&mut self);

    /// Schedules the next timer expiry `interval_us` microseconds after
    /// the current one. May be called from within the interrupt itself.
    fn set_interval_us(&mut self, interval_us: u32);

    /// Sets the direction line for `axis`. `negative` set means the
    /// axis steps in the negative direction.
    fn set_direction(&mut self, axis: usize, negative: bool);

    /// Raises or lowers the step line for `axis`.
    fn set_step_pulse(&mut self, axis: usize, level: bool);
}

/// Runs `body` with the port's interrupt masked, unmasking again once
/// `body` returns — the scoped mask-token acquisition recommended for
/// the foreground/ISR critical sections that guard `busy` and the ring
/// indices.
pub fn with_interrupts_masked<const AXES: usize, P, R>(port: &mut P, body: impl FnOnce(&mut P) -> R) -> R
where
    P: StepperPort<AXES>,
{
    port.interrupt_disable();
    let result = body(port);
    port.interrupt_enable();
    result
}

#[cfg(feature = "std")]
mod simulation;
#[cfg(feature = "std")]
pub use simulation::{SimulationPort, StepEvent};
