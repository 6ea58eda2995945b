//! Plotter harness: wires the planner (L2) and stepper driver (L3) to a
//! [`stepper_port::SimulationPort`] (L0) behind the two-axis pen-plotter
//! kinematic profile (L1), and drives a scripted list of moves to
//! completion the way a cooperative foreground loop would — retrying
//! admission by draining a tick whenever the ring reports full.

use motion::kinematics::Cartesian2Axis;
use motion::{Planner, PlannerConfig, Stepper};
use stepper_port::SimulationPort;
use tracing::{debug, info};

/// One scripted move: target position in millimetres, requested feed
/// rate (mm/s), and requested acceleration (mm/s^2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedMove {
    pub position: [f32; 2],
    pub feed_rate: f32,
    pub acceleration: f32,
}

impl ScriptedMove {
    pub fn new(position: [f32; 2], feed_rate: f32, acceleration: f32) -> Self {
        Self { position, feed_rate, acceleration }
    }
}

/// Owns a planner, a stepper driver, and a simulation port sized for the
/// two-axis pen-plotter profile, and runs scripted move lists through
/// the full admission -> recalculation -> ISR pipeline.
pub struct PlotterHarness {
    planner: Planner<Cartesian2Axis<2>, 2, 32>,
    stepper: Stepper<2>,
    port: SimulationPort<2>,
}

impl PlotterHarness {
    pub fn new(config: PlannerConfig<2>) -> Self {
        let kinematics = Cartesian2Axis::new(config.axis_steps_per_unit);
        let mut planner = Planner::new(config, kinematics);
        planner.plan_init();
        Self {
            planner,
            stepper: Stepper::new(),
            port: SimulationPort::new().with_trace(),
        }
    }

    pub fn with_start_position(mut self, mm: [f32; 2]) -> Self {
        self.planner.plan_set_position(mm);
        self
    }

    pub fn final_step_position(&self) -> [i32; 2] {
        self.planner.final_step_position()
    }

    pub fn step_trace(&self) -> &[stepper_port::StepEvent] {
        self.port.trace()
    }

    pub fn port_position(&self, axis: usize) -> i32 {
        self.port.position(axis)
    }

    /// Admits every move in `script`, retrying (by draining one ISR tick)
    /// whenever the ring reports full, then drains the planner
    /// completely. Returns once every block has retired.
    pub fn run(&mut self, script: &[ScriptedMove]) {
        for mv in script {
            loop {
                match self.planner.plan_move(mv.position, mv.feed_rate, mv.acceleration) {
                    Ok(()) => break,
                    Err(_) => {
                        debug!(?mv, "ring full, draining one tick before retrying admission");
                        self.stepper.tick(&self.planner, &mut self.port);
                    }
                }
            }
        }
        while self.planner.occupancy() > 0 || !self.stepper.is_idle() {
            self.stepper.tick(&self.planner, &mut self.port);
        }
        info!(moves = script.len(), steps = self.step_trace().len(), "plotter harness drained script");
    }

    /// Renders the recorded step-event trace as pretty JSON.
    #[cfg(feature = "trace")]
    pub fn trace_json(&self) -> anyhow::Result<String> {
        #[derive(serde::Serialize)]
        struct TracedEvent {
            axis: usize,
            negative: bool,
        }
        let events: Vec<TracedEvent> = self
            .step_trace()
            .iter()
            .map(|e| TracedEvent { axis: e.axis, negative: e.negative })
            .collect();
        Ok(serde_json::to_string_pretty(&events)?)
    }

    /// Dumps [`Self::trace_json`] to `path`.
    #[cfg(feature = "trace")]
    pub fn dump_trace_json(&self, path: &std::path::Path) -> anyhow::Result<()> {
        std::fs::write(path, self.trace_json()?)?;
        Ok(())
    }
}
