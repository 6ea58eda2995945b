//! Planner tuning surface: every constant the planner and stepper need
//! to interpret feed rates, accelerations, and jerk limits for a given
//! machine, packaged as one value instead of scattered `extern` globals.

use crate::kinematics::drum_steps_per_mm;

/// Lower bound on any rate the stepper driver arms, imposed by the
/// `1_000_000 / rate` timer-interval computation.
pub const MINIMUM_STEP_RATE: u32 = 120;

/// Every tuning constant `plan_init` needs, for an `AXES`-axis machine.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannerConfig<const AXES: usize> {
    /// Steps per millimetre (or per degree, for a rotational axis), per
    /// output axis. May be negative to invert an axis.
    pub axis_steps_per_unit: [f32; AXES],
    /// Per-axis feedrate ceiling, mm/s.
    pub max_feedrate: [f32; AXES],
    /// Per-axis acceleration ceiling, mm/s².
    pub max_acceleration_units_per_sq_second: [f32; AXES],
    /// Junction velocity-discontinuity allowance in the XY plane, mm/s.
    pub max_xy_jerk: f32,
    /// Junction velocity-discontinuity allowance for any axis beyond the
    /// first two, mm/s.
    pub max_z_jerk: f32,
    /// Feed rates below this are clamped up to it on admission.
    pub minimum_feedrate: f32,
    /// Lower bound used when computing the maximum speed a block can
    /// enter at and still decelerate to a safe exit within its length.
    pub minimum_planner_speed: f32,
}

impl<const AXES: usize> PlannerConfig<AXES> {
    /// `axis_steps_per_sqr_second[a] = max_acceleration_units_per_sq_second[a] * axis_steps_per_unit[a]`,
    /// the per-axis acceleration ceiling expressed in steps/s² instead of
    /// mm/s². Recomputed by `plan_init` and cached by the planner.
    pub fn axis_steps_per_sqr_second(&self) -> [f32; AXES] {
        let mut out = [0.0; AXES];
        for a in 0..AXES {
            out[a] = self.max_acceleration_units_per_sq_second[a] * self.axis_steps_per_unit[a].abs();
        }
        out
    }
}

impl PlannerConfig<2> {
    /// The two-axis pen-plotter profile's scenario defaults.
    pub fn plotter_default() -> Self {
        Self {
            axis_steps_per_unit: [80.0, 80.0],
            max_feedrate: [300.0, 300.0],
            max_acceleration_units_per_sq_second: [9000.0, 9000.0],
            max_xy_jerk: 1.0,
            max_z_jerk: 0.1,
            minimum_feedrate: 0.0,
            minimum_planner_speed: 0.05,
        }
    }

    /// The tape-writer profile: axis 0 is a drum of diameter
    /// `TAPE_ROLL_DIAMETER_MM` driven by `TAPE_ROLL_MOTOR_STEPS` full
    /// steps per revolution (at 16x microstepping); axis 1 is a direct
    /// stepper at the plotter's default scale.
    pub fn tape_writer_default() -> Self {
        const TAPE_ROLL_DIAMETER_MM: f32 = 100.0;
        const TAPE_ROLL_MOTOR_STEPS: f32 = 400.0 * 16.0;
        let mut cfg = Self::plotter_default();
        cfg.axis_steps_per_unit[0] = drum_steps_per_mm(TAPE_ROLL_MOTOR_STEPS, TAPE_ROLL_DIAMETER_MM);
        cfg
    }
}
