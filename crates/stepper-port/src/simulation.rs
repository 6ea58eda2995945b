//! Host-side simulation backend for [`crate::StepperPort`].
//!
//! Direction state is latched per axis ahead of the step pulse, a step
//! only moves the recorded position on its rising edge, and the
//! "hardware" clock only advances when the host explicitly asks it to
//! via [`SimulationPort::sleep`] — there is no real timer here, so the
//! simulated ISR runs synchronously inside that call.

use crate::{StepperPort, DEFAULT_INTERVAL_US};

/// A single recorded step pulse, used by test harnesses to build a trace
/// of everything the simulated stepper driver emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    pub axis: usize,
    pub negative: bool,
}

/// Host-testable [`StepperPort`] implementation. Tracks absolute step
/// position per axis, the currently armed interval, and (optionally) a
/// trace of every step pulse raised, so tests can assert on exact step
/// counts and directions without real hardware.
pub struct SimulationPort<const AXES: usize> {
    position: [i32; AXES],
    direction_negative: [bool; AXES],
    interval_us: u32,
    enabled: bool,
    interrupts_enabled: bool,
    trace: Option<heapless::Vec<StepEvent, 4096>>,
}

impl<const AXES: usize> SimulationPort<AXES> {
    pub fn new() -> Self {
        Self {
            position: [0; AXES],
            direction_negative: [false; AXES],
            interval_us: DEFAULT_INTERVAL_US,
            enabled: false,
            interrupts_enabled: true,
            trace: None,
        }
    }

    /// Enables step-event tracing. Each rising edge raised through
    /// [`StepperPort::set_step_pulse`] is appended to the trace buffer.
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(heapless::Vec::new());
        self
    }

    /// The absolute step position this port has recorded for `axis`.
    pub fn position(&self, axis: usize) -> i32 {
        self.position[axis]
    }

    /// The interval, in microseconds, currently armed for the next tick.
    pub fn armed_interval_us(&self) -> u32 {
        self.interval_us
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The recorded step-event trace, if tracing was enabled via
    /// [`SimulationPort::with_trace`].
    pub fn trace(&self) -> &[StepEvent] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Advances the simulated clock by `ticks` timer expiries, invoking
    /// `on_tick` once per expiry with `&mut self` — the simulation
    /// equivalent of a hardware interrupt firing, run synchronously
    /// rather than pre-emptively. Mirrors `arch_sleep` calling
    /// `sim_run_interrupts()` once per requested delay.
    pub fn sleep(&mut self, ticks: u32, mut on_tick: impl FnMut(&mut Self)) {
        for _ in 0..ticks {
            on_tick(self);
        }
    }
}

impl<const AXES: usize> Default for SimulationPort<AXES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const AXES: usize> StepperPort<AXES> for SimulationPort<AXES> {
    fn init(&mut self) {
        self.interval_us = DEFAULT_INTERVAL_US;
    }

    fn interrupt_disable(&mut self) {
        self.interrupts_enabled = false;
    }

    fn interrupt_enable(&mut self) {
        self.interrupts_enabled = true;
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn set_interval_us(&mut self, interval_us: u32) {
        self.interval_us = interval_us;
    }

    fn set_direction(&mut self, axis: usize, negative: bool) {
        self.direction_negative[axis] = negative;
    }

    fn set_step_pulse(&mut self, axis: usize, level: bool) {
        if !level {
            return;
        }
        if self.direction_negative[axis] {
            self.position[axis] -= 1;
        } else {
            self.position[axis] += 1;
        }
        if let Some(trace) = &mut self.trace {
            let _ = trace.push(StepEvent {
                axis,
                negative: self.direction_negative[axis],
            });
        }
    }
}
