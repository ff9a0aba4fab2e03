//! Actuation primitives
//!
//! Thin blocking wrappers over the machine traits. Each move is queued and
//! then waited for, so the next primitive (or a sensor sample) always sees
//! a machine at rest.
//!
//! Moves are computed from an in-memory target rather than from the
//! reported machine position: the target starts at the position captured
//! when the change began and every primitive updates it. A probe that makes
//! contact moves the target to the contact point.

use rapidchange_core::{
    Axis, Machine, MotionError, Position, ProbeOutcome, SpindleDirection, SpindleState,
};
use std::time::Duration;

/// Feed value passed along with rapid moves; the planner ignores it
const RAPID_FEED: f32 = 0.0;

/// Primitive operations on a machine, tracking the commanded target
pub struct Actuator<'a, M: Machine> {
    machine: &'a mut M,
    target: &'a mut Position,
}

impl<'a, M: Machine> Actuator<'a, M> {
    pub fn new(machine: &'a mut M, target: &'a mut Position) -> Self {
        Self { machine, target }
    }

    /// Last commanded position
    pub fn target(&self) -> Position {
        *self.target
    }

    /// Direct access for sensor reads and offset updates
    pub fn machine(&mut self) -> &mut M {
        self.machine
    }

    fn execute(
        &mut self,
        next: Position,
        feed_rate: f32,
        rapid: bool,
    ) -> Result<(), MotionError> {
        self.machine.move_linear(&next, feed_rate, rapid)?;
        self.machine.synchronize()?;
        *self.target = next;
        Ok(())
    }

    /// Rapid Z move, XY unchanged
    pub fn rapid_to_z(&mut self, z: f32) -> Result<(), MotionError> {
        tracing::debug!("rapid Z {:.3}", z);
        let next = self.target.with(Axis::Z, z);
        self.execute(next, RAPID_FEED, true)
    }

    /// Rapid XY move at the current Z
    pub fn rapid_to_xy(&mut self, x: f32, y: f32) -> Result<(), MotionError> {
        tracing::debug!("rapid XY {:.3}, {:.3}", x, y);
        let next = self.target.with_xy(x, y);
        self.execute(next, RAPID_FEED, true)
    }

    /// Rapid move of a single axis, e.g. a dust cover drive
    pub fn rapid_axis(&mut self, axis: Axis, value: f32) -> Result<(), MotionError> {
        tracing::debug!("rapid {} {:.3}", axis, value);
        let next = self.target.with(axis, value);
        self.execute(next, RAPID_FEED, true)
    }

    /// Feed-rate Z move
    pub fn linear_to_z(&mut self, z: f32, feed_rate: f32) -> Result<(), MotionError> {
        tracing::debug!("linear Z {:.3} F{:.0}", z, feed_rate);
        let next = self.target.with(Axis::Z, z);
        self.execute(next, feed_rate, false)
    }

    /// Rapid up to `z` only when currently below it
    pub fn rise_to_z(&mut self, z: f32) -> Result<(), MotionError> {
        if self.target.z < z {
            self.rapid_to_z(z)
        } else {
            Ok(())
        }
    }

    /// Probe along Z toward `z`
    ///
    /// On contact the target follows the contact point, so later moves are
    /// relative to where the probe stopped.
    pub fn probe_z(&mut self, z: f32, feed_rate: f32) -> Result<ProbeOutcome, MotionError> {
        tracing::debug!("probe Z {:.3} F{:.0}", z, feed_rate);
        let goal = self.target.with(Axis::Z, z);
        let outcome = self.machine.probe_linear(&goal, feed_rate)?;
        if let ProbeOutcome::Found(contact) = outcome {
            tracing::debug!("probe contact at Z {:.3}", contact.z);
            self.target.z = contact.z;
        }
        Ok(outcome)
    }

    /// Start the spindle and wait for it to reach speed
    pub fn start_spindle(
        &mut self,
        direction: SpindleDirection,
        rpm: f32,
        ramp: Duration,
    ) -> Result<(), MotionError> {
        tracing::debug!("spindle {} S{:.0}", SpindleState::On(direction), rpm);
        self.machine.set_spindle(SpindleState::On(direction), rpm)?;
        self.machine.delay(ramp);
        Ok(())
    }

    pub fn stop_spindle(&mut self) -> Result<(), MotionError> {
        tracing::debug!("spindle off");
        self.machine.stop_spindle()
    }

    /// Wait a fixed time
    pub fn dwell(&mut self, duration: Duration) {
        self.machine.delay(duration);
    }
}
