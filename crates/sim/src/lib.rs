//! # Host Plotter Harness
//!
//! Drives `motion`'s planner and stepper driver through a scripted list
//! of moves against `stepper-port`'s [`stepper_port::SimulationPort`],
//! without any real timer or GPIO. This is the host-testable companion
//! used to exercise the motion core end-to-end and, behind the `trace`
//! feature, to capture a JSON trace of every step event for golden-file
//! regression tests.

pub mod harness;

pub use harness::{PlotterHarness, ScriptedMove};
