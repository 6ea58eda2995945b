//! # Motion Planning and Step Generation Core
//!
//! A deterministic two-axis motion planner and stepper driver, usable on
//! both host and MCU (`no_std`-friendly).
//!
//! The crate is split into the three layers above the physical output
//! port (which lives in the separate `stepper-port` crate):
//!
//! - [`kinematics`] (L1): millimetres to absolute step counts.
//! - [`planner`] (L2): the block ring buffer, admission, and the
//!   reverse/forward lookahead that recalculates entry speeds.
//! - [`stepper`] (L3): the per-tick handler that walks a Bresenham step
//!   distribution and re-arms its own interval to realize a block's
//!   trapezoid.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(warnings)]

pub mod config;
pub mod errors;
pub mod kinematics;
pub mod planner;
pub mod stepper;

pub use config::PlannerConfig;
pub use errors::PlannerError;
pub use kinematics::Kinematics;
pub use planner::{Block, Planner};
pub use stepper::Stepper;
