//! Planner (L2): a bounded ring buffer of motion blocks whose entry and
//! exit speeds are iteratively recalculated (reverse pass, then forward
//! pass) so the resulting trapezoidal speed profile respects
//! acceleration, per-axis feedrate, and junction-jerk limits everywhere.

#[cfg(not(feature = "std"))]
use libm::{ceilf, floorf, sqrtf};
#[cfg(feature = "std")]
fn sqrtf(x: f32) -> f32 {
    x.sqrt()
}
#[cfg(feature = "std")]
fn ceilf(x: f32) -> f32 {
    x.ceil()
}
#[cfg(feature = "std")]
fn floorf(x: f32) -> f32 {
    x.floor()
}

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::{PlannerConfig, MINIMUM_STEP_RATE};
use crate::errors::PlannerError;
use crate::kinematics::Kinematics;

/// One planned linear segment, occupying one ring slot.
///
/// `Block` carries no atomics itself — the per-slot `busy` flag lives
/// in a parallel array on [`Planner`] so the block stays `Copy` and can
/// be snapshotted out to the stepper driver without holding a borrow on
/// the ring.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Block<const AXES: usize> {
    pub steps: [u32; AXES],
    pub step_event_count: u32,
    /// Bit `a` set means axis `a` moves in the negative direction.
    pub direction_bits: u32,
    pub millimeters: f32,
    pub nominal_speed: f32,
    pub nominal_rate: u32,
    pub entry_speed: f32,
    pub max_entry_speed: f32,
    pub acceleration: f32,
    pub acceleration_st: f32,
    pub initial_rate: u32,
    pub final_rate: u32,
    pub accelerate_until: u32,
    pub decelerate_after: u32,
    pub nominal_length_flag: bool,
    pub recalculate_flag: bool,
}

impl<const AXES: usize> Default for Block<AXES> {
    fn default() -> Self {
        Self {
            steps: [0; AXES],
            step_event_count: 0,
            direction_bits: 0,
            millimeters: 0.0,
            nominal_speed: 0.0,
            nominal_rate: 0,
            entry_speed: 0.0,
            max_entry_speed: 0.0,
            acceleration: 0.0,
            acceleration_st: 0.0,
            initial_rate: MINIMUM_STEP_RATE,
            final_rate: MINIMUM_STEP_RATE,
            accelerate_until: 0,
            decelerate_after: 0,
            nominal_length_flag: false,
            recalculate_flag: false,
        }
    }
}

fn ring_len(head: usize, tail: usize, cap: usize) -> usize {
    (head + cap - tail) % cap
}

fn synthesize_trapezoid<const AXES: usize>(block: &mut Block<AXES>, entry_factor: f32, exit_factor: f32) {
    let nominal_rate = block.nominal_rate as f32;
    block.initial_rate = (ceilf(nominal_rate * entry_factor) as u32).max(MINIMUM_STEP_RATE);
    block.final_rate = (ceilf(nominal_rate * exit_factor) as u32).max(MINIMUM_STEP_RATE);

    let step_event_count = block.step_event_count;
    if block.acceleration_st <= 0.0 {
        block.accelerate_until = 0;
        block.decelerate_after = step_event_count;
        return;
    }
    let accel_st = block.acceleration_st;
    let initial_rate_sq = (block.initial_rate as f32) * (block.initial_rate as f32);
    let final_rate_sq = (block.final_rate as f32) * (block.final_rate as f32);
    let nominal_rate_sq = nominal_rate * nominal_rate;

    let accelerate_steps = ceilf((nominal_rate_sq - initial_rate_sq) / (2.0 * accel_st)).max(0.0) as u32;
    let decelerate_steps = floorf((nominal_rate_sq - final_rate_sq) / (2.0 * accel_st)).max(0.0) as u32;

    if accelerate_steps + decelerate_steps > step_event_count {
        let raw = ceilf((2.0 * accel_st * step_event_count as f32 - initial_rate_sq + final_rate_sq) / (4.0 * accel_st));
        let accelerate_steps = (raw.max(0.0) as u32).min(step_event_count);
        block.accelerate_until = accelerate_steps;
        block.decelerate_after = accelerate_steps;
    } else {
        block.accelerate_until = accelerate_steps;
        block.decelerate_after = accelerate_steps + (step_event_count - accelerate_steps - decelerate_steps);
    }
}

/// Ring buffer of [`Block`]s plus the admission and lookahead logic
/// that recalculates entry speeds across pending blocks. `AXES` is the
/// output axis count, `CAP` the ring capacity (should be a power of
/// two; default `32`).
pub struct Planner<K, const AXES: usize, const CAP: usize> {
    blocks: [Block<AXES>; CAP],
    busy: [AtomicBool; CAP],
    head: AtomicUsize,
    tail: AtomicUsize,
    final_step_position: [i32; AXES],
    previous_speed: [f32; AXES],
    previous_nominal_speed: f32,
    axis_steps_per_sqr_second: [f32; AXES],
    config: PlannerConfig<AXES>,
    kinematics: K,
}

impl<K, const AXES: usize, const CAP: usize> Planner<K, AXES, CAP>
where
    K: Kinematics<AXES>,
{
    pub fn new(config: PlannerConfig<AXES>, kinematics: K) -> Self {
        debug_assert!(CAP.is_power_of_two(), "BLOCK_BUFFER_SIZE must be a power of two");
        let axis_steps_per_sqr_second = config.axis_steps_per_sqr_second();
        Self {
            blocks: [Block::default(); CAP],
            busy: core::array::from_fn(|_| AtomicBool::new(false)),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            final_step_position: [0; AXES],
            previous_speed: [0.0; AXES],
            previous_nominal_speed: 0.0,
            axis_steps_per_sqr_second,
            config,
            kinematics,
        }
    }

    /// Resets ring indices and planner state to their startup values and
    /// recomputes `axis_steps_per_sqr_second` from the current config.
    pub fn plan_init(&mut self) {
        self.head.store(0, Ordering::Release);
        self.tail.store(0, Ordering::Release);
        self.final_step_position = [0; AXES];
        self.previous_speed = [0.0; AXES];
        self.previous_nominal_speed = 0.0;
        self.axis_steps_per_sqr_second = self.config.axis_steps_per_sqr_second();
        for slot in &self.busy {
            slot.store(false, Ordering::Release);
        }
    }

    /// Overwrites `final_step_position` without touching the buffer or
    /// moving the motors.
    pub fn plan_set_position(&mut self, mm: [f32; AXES]) {
        self.final_step_position = self.kinematics.position_to_steps(&mm);
    }

    pub fn final_step_position(&self) -> [i32; AXES] {
        self.final_step_position
    }

    pub fn occupancy(&self) -> usize {
        ring_len(self.head.load(Ordering::Acquire), self.tail.load(Ordering::Acquire), CAP)
    }

    pub fn free_positions(&self) -> usize {
        (CAP - 1) - self.occupancy()
    }

    /// Returns a copy of the block at logical position `index` within
    /// `[tail, head)`, oldest first. Test/inspection helper.
    pub fn block_at(&self, index: usize) -> Option<Block<AXES>> {
        if index >= self.occupancy() {
            return None;
        }
        let tail = self.tail.load(Ordering::Acquire);
        Some(self.blocks[(tail + index) % CAP])
    }

    /// Admits a move to the target position, or reports the ring is
    /// full. A zero-length move (the target equals the current final
    /// step position) succeeds without mutating the ring.
    pub fn plan_move(&mut self, mm: [f32; AXES], feed_rate: f32, acceleration: f32) -> Result<(), PlannerError> {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % CAP;
        if next_head == tail {
            #[cfg(feature = "defmt-logging")]
            defmt::warn!("plan_move: ring full, rejecting admission");
            return Err(PlannerError::QueueFull);
        }
        let blocks_already_planned = ring_len(head, tail, CAP);

        let target_steps = self.kinematics.position_to_steps(&mm);

        let mut steps = [0u32; AXES];
        let mut direction_bits: u32 = 0;
        for a in 0..AXES {
            let delta = target_steps[a] - self.final_step_position[a];
            steps[a] = delta.unsigned_abs();
            if delta < 0 {
                direction_bits |= 1 << a;
            }
        }
        let step_event_count = steps.iter().copied().max().unwrap_or(0);
        if step_event_count == 0 {
            return Ok(());
        }

        let feed_rate = feed_rate.max(self.config.minimum_feedrate);

        let mut delta_mm = [0f32; AXES];
        let mut dist_sq = 0.0f32;
        for a in 0..AXES {
            delta_mm[a] = (target_steps[a] - self.final_step_position[a]) as f32 / self.config.axis_steps_per_unit[a];
            dist_sq += delta_mm[a] * delta_mm[a];
        }
        let millimeters = sqrtf(dist_sq);

        let mut nominal_speed = feed_rate;
        let mut nominal_rate = ceilf(step_event_count as f32 * feed_rate / millimeters).max(0.0) as u32;

        let mut current_speed = [0f32; AXES];
        let mut speed_factor = 1.0f32;
        for a in 0..AXES {
            current_speed[a] = delta_mm[a] * feed_rate / millimeters;
            let limit = self.config.max_feedrate[a];
            if current_speed[a].abs() > limit {
                speed_factor = speed_factor.min(limit / current_speed[a].abs());
            }
        }
        if speed_factor < 1.0 {
            for a in 0..AXES {
                current_speed[a] *= speed_factor;
            }
            nominal_speed *= speed_factor;
            nominal_rate = ((nominal_rate as f32) * speed_factor).round() as u32;
        }

        let mut acceleration_st = ceilf(acceleration * step_event_count as f32 / millimeters).max(0.0);
        for a in 0..AXES {
            if step_event_count == 0 {
                continue;
            }
            let per_axis_share = acceleration_st * steps[a] as f32 / step_event_count as f32;
            if per_axis_share > self.axis_steps_per_sqr_second[a] {
                acceleration_st = self.axis_steps_per_sqr_second[a];
            }
        }
        let acceleration_mm = if step_event_count > 0 {
            acceleration_st * millimeters / step_event_count as f32
        } else {
            0.0
        };

        let safe_speed = (self.config.max_xy_jerk * 0.5).min(nominal_speed);
        let mut max_entry_speed = safe_speed;
        if blocks_already_planned >= 1 && self.previous_nominal_speed > 1e-6 {
            let mut jerk_sq = 0.0f32;
            for a in 0..AXES {
                let d = current_speed[a] - self.previous_speed[a];
                jerk_sq += d * d;
            }
            let xy_jerk = sqrtf(jerk_sq);
            let factor = if xy_jerk <= self.config.max_xy_jerk {
                1.0
            } else {
                self.config.max_xy_jerk / xy_jerk
            };
            max_entry_speed = self.previous_nominal_speed.min(nominal_speed * factor);
        }

        let v_allowable = sqrtf((2.0 * acceleration_mm * millimeters + self.config.minimum_planner_speed * self.config.minimum_planner_speed).max(0.0));
        let entry_speed = max_entry_speed.min(v_allowable);
        let nominal_length_flag = nominal_speed <= v_allowable;

        self.previous_speed = current_speed;
        self.previous_nominal_speed = nominal_speed;
        self.final_step_position = target_steps;

        let mut block = Block {
            steps,
            step_event_count,
            direction_bits,
            millimeters,
            nominal_speed,
            nominal_rate,
            entry_speed,
            max_entry_speed,
            acceleration: acceleration_mm,
            acceleration_st,
            initial_rate: MINIMUM_STEP_RATE,
            final_rate: MINIMUM_STEP_RATE,
            accelerate_until: 0,
            decelerate_after: 0,
            nominal_length_flag,
            recalculate_flag: true,
        };
        synthesize_trapezoid(&mut block, entry_speed / nominal_speed, safe_speed / nominal_speed);

        self.blocks[head] = block;
        self.busy[head].store(false, Ordering::Release);
        self.head.store(next_head, Ordering::Release);

        #[cfg(feature = "defmt-logging")]
        defmt::trace!("plan_move: admitted block with {} steps", step_event_count);

        self.recalculate();
        Ok(())
    }

    fn recalculate(&mut self) {
        self.reverse_pass();
        self.forward_pass();
        self.trapezoid_pass();
    }

    fn reverse_pass(&mut self) {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        let count = ring_len(head, tail, CAP);
        if count < 4 {
            return;
        }
        let mut i = count as isize - 2;
        while i >= 0 {
            let current_idx = (tail + i as usize) % CAP;
            let next_idx = (tail + i as usize + 1) % CAP;
            let next_entry_speed = self.blocks[next_idx].entry_speed;
            let current = &mut self.blocks[current_idx];
            if current.entry_speed != current.max_entry_speed {
                if !current.nominal_length_flag && current.max_entry_speed > next_entry_speed {
                    let candidate = sqrtf((2.0 * current.acceleration * current.millimeters + next_entry_speed * next_entry_speed).max(0.0));
                    current.entry_speed = current.max_entry_speed.min(candidate);
                } else {
                    current.entry_speed = current.max_entry_speed;
                }
                current.recalculate_flag = true;
            }
            i -= 1;
        }
    }

    fn forward_pass(&mut self) {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        let count = ring_len(head, tail, CAP);
        if count < 2 {
            return;
        }
        for i in 0..count - 1 {
            let prev_idx = (tail + i) % CAP;
            let current_idx = (tail + i + 1) % CAP;
            let prev = self.blocks[prev_idx];
            let current = &mut self.blocks[current_idx];
            if !prev.nominal_length_flag && prev.entry_speed < current.entry_speed {
                let candidate = sqrtf((2.0 * prev.acceleration * prev.millimeters + prev.entry_speed * prev.entry_speed).max(0.0));
                let new_entry = current.entry_speed.min(candidate);
                if new_entry != current.entry_speed {
                    current.entry_speed = new_entry;
                    current.recalculate_flag = true;
                }
            }
        }
    }

    fn trapezoid_pass(&mut self) {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        let count = ring_len(head, tail, CAP);
        if count == 0 {
            return;
        }
        for i in 0..count {
            let idx = (tail + i) % CAP;
            let next_flag = i + 1 < count && self.blocks[(tail + i + 1) % CAP].recalculate_flag;
            if !self.blocks[idx].recalculate_flag && !next_flag {
                continue;
            }
            if self.busy[idx].load(Ordering::Acquire) {
                continue;
            }
            let nominal_speed = self.blocks[idx].nominal_speed;
            let entry_factor = self.blocks[idx].entry_speed / nominal_speed;
            let exit_factor = if i + 1 < count {
                self.blocks[(tail + i + 1) % CAP].entry_speed / nominal_speed
            } else {
                self.config.minimum_planner_speed / nominal_speed
            };
            synthesize_trapezoid(&mut self.blocks[idx], entry_factor, exit_factor);
            self.blocks[idx].recalculate_flag = false;
        }
    }

    /// Acquires the block at `tail` for execution: marks it `busy` but
    /// does not retire it. Called by the stepper driver on block
    /// acquisition (spec step L3.1).
    pub(crate) fn try_acquire_block(&self) -> Option<(usize, Block<AXES>)> {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        self.busy[tail].store(true, Ordering::Release);
        Some((tail, self.blocks[tail]))
    }

    /// Retires the block at ring index `idx`, advancing `tail`. Called
    /// by the stepper driver when a block's step count completes.
    pub(crate) fn retire_block(&self, idx: usize) {
        self.tail.store((idx + 1) % CAP, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::Cartesian2Axis;

    fn plotter_planner() -> Planner<Cartesian2Axis<2>, 2, 32> {
        let config = PlannerConfig::plotter_default();
        let kinematics = Cartesian2Axis::new(config.axis_steps_per_unit);
        Planner::new(config, kinematics)
    }

    #[test]
    fn s1_single_move_yields_expected_steps_and_position() {
        let mut planner = plotter_planner();
        planner.plan_set_position([0.0, 0.0]);
        planner.plan_move([10.0, 0.0], 100.0, 100.0).unwrap();
        let block = planner.block_at(0).unwrap();
        assert_eq!(block.steps, [800, 0]);
        assert_eq!(block.step_event_count, 800);
        assert!((block.millimeters - 10.0).abs() < 1e-3);
        assert_eq!(block.direction_bits, 0);
        assert_eq!(planner.final_step_position(), [800, 0]);
    }

    #[test]
    fn s2_buffer_fills_and_frees_on_retire() {
        let mut planner = plotter_planner();
        planner.plan_set_position([0.0, 0.0]);
        for i in 1..32 {
            planner.plan_move([i as f32, 0.0], 100.0, 100.0).unwrap();
        }
        assert_eq!(planner.free_positions(), 0);
        assert!(matches!(planner.plan_move([32.0, 0.0], 100.0, 100.0), Err(PlannerError::QueueFull)));

        let (idx, _) = planner.try_acquire_block().unwrap();
        planner.retire_block(idx);
        assert!(planner.plan_move([32.0, 0.0], 100.0, 100.0).is_ok());
    }

    #[test]
    fn s5_zero_length_move_is_a_no_op_admission() {
        let mut planner = plotter_planner();
        planner.plan_set_position([1.0, 1.0]);
        let occupancy_before = planner.occupancy();
        assert!(planner.plan_move([1.0, 1.0], 100.0, 100.0).is_ok());
        assert_eq!(planner.occupancy(), occupancy_before);
    }

    #[test]
    fn trapezoid_is_well_formed_for_every_admitted_block() {
        let mut planner = plotter_planner();
        planner.plan_set_position([0.0, 0.0]);
        planner.plan_move([1.0, 0.0], 3000.0, 100.0).unwrap();
        planner.plan_move([2.0, 0.0], 3000.0, 100.0).unwrap();
        planner.plan_move([3.0, 0.0], 3000.0, 100.0).unwrap();
        planner.plan_move([4.0, 0.0], 3000.0, 100.0).unwrap();
        for i in 0..planner.occupancy() {
            let block = planner.block_at(i).unwrap();
            assert!(block.accelerate_until <= block.decelerate_after);
            assert!(block.decelerate_after <= block.step_event_count);
            assert!(block.initial_rate >= MINIMUM_STEP_RATE);
            assert!(block.final_rate >= MINIMUM_STEP_RATE);
        }
    }

    #[test]
    fn occupancy_and_free_positions_sum_to_capacity_minus_one() {
        let mut planner = plotter_planner();
        planner.plan_set_position([0.0, 0.0]);
        for i in 1..10 {
            planner.plan_move([i as f32, 0.0], 200.0, 500.0).unwrap();
            assert_eq!(planner.occupancy() + planner.free_positions(), 31);
        }
    }
}
