//! Kinematic map (L1): a pure, stateless function from millimetre
//! coordinates to absolute motor step counts.
//!
//! `position_to_steps` must be deterministic and idempotent — the planner
//! relies on re-admitting an identical position producing an identical
//! step target, so that it collapses to a zero-length block.

#[cfg(not(feature = "std"))]
use libm::roundf;
#[cfg(feature = "std")]
fn roundf(x: f32) -> f32 {
    x.round()
}

/// Translates an `AXES`-vector of millimetres into an `AXES`-vector of
/// absolute motor step counts.
pub trait Kinematics<const AXES: usize> {
    fn position_to_steps(&self, mm: &[f32; AXES]) -> [i32; AXES];
}

/// Direct per-axis scaling: `steps[a] = round(mm[a] * axis_steps_per_unit[a])`.
///
/// This is the primary two-axis plotter profile. A negative entry in
/// `axis_steps_per_unit` inverts that axis.
#[derive(Debug, Clone, Copy)]
pub struct Cartesian2Axis<const AXES: usize> {
    pub axis_steps_per_unit: [f32; AXES],
}

impl<const AXES: usize> Cartesian2Axis<AXES> {
    pub fn new(axis_steps_per_unit: [f32; AXES]) -> Self {
        Self { axis_steps_per_unit }
    }
}

impl<const AXES: usize> Kinematics<AXES> for Cartesian2Axis<AXES> {
    fn position_to_steps(&self, mm: &[f32; AXES]) -> [i32; AXES] {
        let mut steps = [0i32; AXES];
        for a in 0..AXES {
            steps[a] = roundf(mm[a] * self.axis_steps_per_unit[a]) as i32;
        }
        steps
    }
}

/// Derives a rotational drum's linear-equivalent steps-per-millimetre:
/// `motor_steps / (pi * diameter_mm)`.
pub fn drum_steps_per_mm(motor_steps: f32, diameter_mm: f32) -> f32 {
    motor_steps / (core::f32::consts::PI * diameter_mm)
}

/// Tape-writer profile: like [`Cartesian2Axis`], but one axis is a drum
/// whose steps-per-unit is derived from its motor step count and
/// diameter rather than given directly, and a second output axis may be
/// a mirrored duplicate of another, stepping in lockstep with the
/// opposite sign.
#[derive(Debug, Clone, Copy)]
pub struct TapeDrum<const AXES: usize> {
    pub axis_steps_per_unit: [f32; AXES],
    /// `(source, destination)`: after the direct scaling pass,
    /// `steps[destination] = -steps[source]`.
    pub mirror: Option<(usize, usize)>,
}

impl<const AXES: usize> TapeDrum<AXES> {
    pub fn new(axis_steps_per_unit: [f32; AXES]) -> Self {
        Self { axis_steps_per_unit, mirror: None }
    }

    pub fn with_mirror(mut self, source: usize, destination: usize) -> Self {
        self.mirror = Some((source, destination));
        self
    }
}

impl<const AXES: usize> Kinematics<AXES> for TapeDrum<AXES> {
    fn position_to_steps(&self, mm: &[f32; AXES]) -> [i32; AXES] {
        let mut steps = [0i32; AXES];
        for a in 0..AXES {
            steps[a] = roundf(mm[a] * self.axis_steps_per_unit[a]) as i32;
        }
        if let Some((source, destination)) = self.mirror {
            steps[destination] = -steps[source];
        }
        steps
    }
}

/// CoreXY kinematics: the first two axes are transformed as `a = x + y`,
/// `b = x - y`; any further axes pass through unchanged. A transform for
/// workspaces that drive a belt-coupled XY gantry instead of independent
/// axes.
#[derive(Debug, Clone, Copy)]
pub struct CoreXY<const AXES: usize> {
    pub axis_steps_per_unit: [f32; AXES],
}

impl<const AXES: usize> CoreXY<AXES> {
    pub fn new(axis_steps_per_unit: [f32; AXES]) -> Self {
        Self { axis_steps_per_unit }
    }
}

impl<const AXES: usize> Kinematics<AXES> for CoreXY<AXES> {
    fn position_to_steps(&self, mm: &[f32; AXES]) -> [i32; AXES] {
        let mut steps = [0i32; AXES];
        if AXES >= 2 {
            steps[0] = roundf((mm[0] + mm[1]) * self.axis_steps_per_unit[0]) as i32;
            steps[1] = roundf((mm[0] - mm[1]) * self.axis_steps_per_unit[1]) as i32;
        }
        for a in 2..AXES {
            steps[a] = roundf(mm[a] * self.axis_steps_per_unit[a]) as i32;
        }
        steps
    }
}
