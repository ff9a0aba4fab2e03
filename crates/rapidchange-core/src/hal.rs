//! Machine collaborator traits
//!
//! The tool-change sequence never talks to hardware directly. It drives the
//! controller through these traits, which the host firmware (or the
//! simulator) implements. Every call is synchronous: a command returns once
//! it has been accepted, and [`MotionControl::synchronize`] blocks until the
//! planner has drained.

use crate::data::{AxisMask, CoolantState, Position, SpindleState, ToolLengthOffset};
use crate::error::MotionError;
use std::time::Duration;

/// Result of a probing move
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    /// The probe triggered; carries the machine position at contact
    Found(Position),
    /// The move finished without contact
    NotFound,
}

impl ProbeOutcome {
    /// Check whether contact was made
    pub fn is_found(&self) -> bool {
        matches!(self, ProbeOutcome::Found(_))
    }
}

/// Motion planner access
pub trait MotionControl {
    /// Queue a straight move to `target` in machine coordinates.
    ///
    /// `rapid` selects G0 motion; otherwise `feed_rate` (mm/min) applies.
    fn move_linear(
        &mut self,
        target: &Position,
        feed_rate: f32,
        rapid: bool,
    ) -> Result<(), MotionError>;

    /// Run a probing move toward `target` (G38.2 semantics) and wait for it.
    fn probe_linear(&mut self, target: &Position, feed_rate: f32)
        -> Result<ProbeOutcome, MotionError>;

    /// Block until every queued motion has completed.
    fn synchronize(&mut self) -> Result<(), MotionError>;

    /// Current machine position as reported by the stepper layer
    fn current_position(&self) -> Position;

    /// Sync the parser position with the planner after out-of-band moves
    fn sync_position(&mut self);

    /// Axes that have completed a homing cycle
    fn homed_axes(&self) -> AxisMask;
}

/// Spindle output
pub trait SpindleControl {
    /// Current spindle state and programmed speed (rpm)
    fn spindle_state(&self) -> (SpindleState, f32);

    /// Set spindle state and speed
    fn set_spindle(&mut self, state: SpindleState, rpm: f32) -> Result<(), MotionError>;

    /// Stop the spindle
    fn stop_spindle(&mut self) -> Result<(), MotionError> {
        self.set_spindle(SpindleState::Off, 0.0)
    }
}

/// Coolant outputs
pub trait CoolantControl {
    /// Current coolant state
    fn coolant_state(&self) -> CoolantState;

    /// Set coolant outputs
    fn set_coolant(&mut self, state: CoolantState) -> Result<(), MotionError>;
}

/// Active tool length offset held by the G-code parser
pub trait ToolOffsetControl {
    /// Currently applied offset
    fn tool_length_offset(&self) -> ToolLengthOffset;

    /// Apply or cancel the offset
    fn set_tool_length_offset(&mut self, offset: ToolLengthOffset);
}

/// Auxiliary digital ports
pub trait DigitalIo {
    /// Sample a digital input immediately (no debounce)
    fn read_input(&mut self, port: u8) -> Result<bool, MotionError>;

    /// Drive a digital output
    fn write_output(&mut self, port: u8, level: bool) -> Result<(), MotionError>;
}

/// Fixed-duration waits
pub trait Delay {
    /// Block for `duration`
    fn delay(&mut self, duration: Duration);
}

/// Everything the tool-change sequence needs from the controller
pub trait Machine:
    MotionControl + SpindleControl + CoolantControl + ToolOffsetControl + DigitalIo + Delay
{
}

impl<T> Machine for T where
    T: MotionControl + SpindleControl + CoolantControl + ToolOffsetControl + DigitalIo + Delay
{
}
