//! Stepper driver (L3): the interrupt-style per-tick handler that
//! consumes blocks from the planner, walks a Bresenham step
//! distribution across axes, and re-arms its own interval to realize
//! the block's trapezoid.

use crate::config::MINIMUM_STEP_RATE;
use crate::kinematics::Kinematics;
use crate::planner::{Block, Planner};
use stepper_port::{StepperPort, DEFAULT_INTERVAL_US};

/// Interval delays are clamped to this ceiling so `set_interval_us`'s
/// microsecond argument never overflows a 32-bit timer compare value.
const MAX_DELAY_US: u32 = 2_147_483_647;

fn clamp_delay(us: u32) -> u32 {
    us.min(MAX_DELAY_US)
}

struct CurrentBlock<const AXES: usize> {
    idx: usize,
    block: Block<AXES>,
}

/// ISR-local state carried between ticks: which block is executing, the
/// Bresenham accumulators, and the two timing integrators used to ramp
/// the step rate through the accelerate/cruise/decelerate phases.
pub struct Stepper<const AXES: usize> {
    current: Option<CurrentBlock<AXES>>,
    counters: [i32; AXES],
    step_events_completed: u32,
    acceleration_time_us: u32,
    acceleration_step_rate: u32,
    deceleration_time_us: u32,
}

impl<const AXES: usize> Stepper<AXES> {
    pub fn new() -> Self {
        Self {
            current: None,
            counters: [0; AXES],
            step_events_completed: 0,
            acceleration_time_us: 0,
            acceleration_step_rate: MINIMUM_STEP_RATE,
            deceleration_time_us: 0,
        }
    }

    /// Registers the tick callback's timing with L0 at the default
    /// interval; the caller is responsible for wiring the actual timer
    /// interrupt vector to repeated calls of [`Stepper::tick`].
    pub fn init<P: StepperPort<AXES>>(&mut self, port: &mut P) {
        port.init();
        port.enable();
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Runs one interrupt-tick's worth of work: acquire a block if idle,
    /// distribute one Bresenham step across axes, pick the next interval
    /// from the block's trapezoid phase, retire the block on completion,
    /// and drop the step pulses raised this tick.
    pub fn tick<K, const CAP: usize, P>(&mut self, planner: &Planner<K, AXES, CAP>, port: &mut P)
    where
        K: Kinematics<AXES>,
        P: StepperPort<AXES>,
    {
        if self.current.is_none() {
            match planner.try_acquire_block() {
                None => {
                    port.set_interval_us(DEFAULT_INTERVAL_US);
                    return;
                }
                Some((idx, block)) => {
                    #[cfg(feature = "defmt-logging")]
                    defmt::debug!("stepper: acquired block {} ({} steps)", idx, block.step_event_count);
                    self.step_events_completed = 0;
                    self.acceleration_time_us = 0;
                    self.deceleration_time_us = 0;
                    self.acceleration_step_rate = block.initial_rate;
                    for a in 0..AXES {
                        self.counters[a] = -((block.step_event_count as i32) / 2);
                        port.set_direction(a, (block.direction_bits >> a) & 1 == 1);
                    }
                    self.current = Some(CurrentBlock { idx, block });
                }
            }
        }

        let current = self.current.as_ref().expect("block acquired above");
        let block = current.block;
        let idx = current.idx;

        for a in 0..AXES {
            self.counters[a] += block.steps[a] as i32;
            if self.counters[a] > 0 {
                port.set_step_pulse(a, true);
                self.counters[a] -= block.step_event_count as i32;
            }
        }
        self.step_events_completed += 1;

        let delay_us = if self.step_events_completed < block.accelerate_until {
            let rate = (block.initial_rate as f32
                + self.acceleration_time_us as f32 * block.acceleration_st / 1_000_000.0)
                .min(block.nominal_rate as f32) as u32;
            self.acceleration_step_rate = rate.max(MINIMUM_STEP_RATE);
            let delay = clamp_delay(1_000_000u32.checked_div(self.acceleration_step_rate).unwrap_or(MAX_DELAY_US));
            self.acceleration_time_us = self.acceleration_time_us.saturating_add(delay);
            delay
        } else if self.step_events_completed > block.decelerate_after {
            let decel = self.deceleration_time_us as f32 * block.acceleration_st / 1_000_000.0;
            let rate = if decel < self.acceleration_step_rate as f32 {
                ((self.acceleration_step_rate as f32 - decel).max(block.final_rate as f32)) as u32
            } else {
                block.final_rate
            }
            .max(MINIMUM_STEP_RATE);
            let delay = clamp_delay(1_000_000u32.checked_div(rate).unwrap_or(MAX_DELAY_US));
            self.deceleration_time_us = self.deceleration_time_us.saturating_add(delay);
            delay
        } else {
            clamp_delay(1_000_000u32.checked_div(block.nominal_rate.max(MINIMUM_STEP_RATE)).unwrap_or(MAX_DELAY_US))
        };
        port.set_interval_us(delay_us);

        if self.step_events_completed >= block.step_event_count {
            #[cfg(feature = "defmt-logging")]
            defmt::debug!("stepper: retiring block {}", idx);
            self.current = None;
            planner.retire_block(idx);
        }

        for a in 0..AXES {
            port.set_step_pulse(a, false);
        }
    }
}

impl<const AXES: usize> Default for Stepper<AXES> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::kinematics::Cartesian2Axis;
    use crate::planner::Planner;
    use stepper_port::SimulationPort;

    fn plotter_planner() -> Planner<Cartesian2Axis<2>, 2, 32> {
        let config = PlannerConfig::plotter_default();
        let kinematics = Cartesian2Axis::new(config.axis_steps_per_unit);
        Planner::new(config, kinematics)
    }

    #[test]
    fn drains_a_block_to_completion_with_conserved_step_count() {
        let mut planner = plotter_planner();
        planner.plan_set_position([0.0, 0.0]);
        planner.plan_move([1.0, 0.0], 100.0, 100.0).unwrap();

        let mut stepper: Stepper<2> = Stepper::new();
        let mut port: SimulationPort<2> = SimulationPort::new().with_trace();
        stepper.init(&mut port);

        let mut ticks = 0;
        while !stepper.is_idle() || ticks == 0 {
            stepper.tick(&planner, &mut port);
            ticks += 1;
            if ticks > 100_000 {
                panic!("stepper never completed the block");
            }
        }

        assert_eq!(port.position(0), 80);
        assert_eq!(port.position(1), 0);
    }

    #[test]
    fn idles_at_the_default_interval_with_an_empty_buffer() {
        let planner = plotter_planner();
        let mut stepper: Stepper<2> = Stepper::new();
        let mut port: SimulationPort<2> = SimulationPort::new();
        stepper.tick(&planner, &mut port);
        assert_eq!(port.armed_interval_us(), DEFAULT_INTERVAL_US);
    }

    #[test]
    fn negative_direction_bit_drives_port_in_reverse() {
        let mut planner = plotter_planner();
        planner.plan_set_position([5.0, 0.0]);
        planner.plan_move([0.0, 0.0], 100.0, 100.0).unwrap();

        let mut stepper: Stepper<2> = Stepper::new();
        let mut port: SimulationPort<2> = SimulationPort::new();
        let mut ticks = 0;
        while !stepper.is_idle() || ticks == 0 {
            stepper.tick(&planner, &mut port);
            ticks += 1;
            if ticks > 100_000 {
                panic!("stepper never completed the block");
            }
        }
        assert_eq!(port.position(0), -400);
    }
}
