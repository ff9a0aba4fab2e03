//! Simulated machine
//!
//! A [`Machine`] that executes every command instantly and records it as a
//! [`MachineCall`]. Sensor answers, probe contacts, homing state and motion
//! failures are scripted up front, which makes it the test double for the
//! sequencer and the backend of the `rapidchange-sim` dry run.

use crate::context::AtcContext;
use rapidchange_core::{
    Axis, AxisMask, CoolantControl, CoolantState, Delay, DigitalIo, MotionControl, MotionError,
    Position, ProbeOutcome, SpindleControl, SpindleDirection, SpindleState, ToolLengthOffset,
    ToolOffsetControl,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Heights closer than this count as the same sensor zone
const Z_TOLERANCE: f32 = 1e-3;

/// One collaborator call, in the order it was made
#[derive(Debug, Clone, PartialEq)]
pub enum MachineCall {
    MoveLinear {
        target: Position,
        feed_rate: f32,
        rapid: bool,
    },
    Probe {
        target: Position,
        feed_rate: f32,
    },
    Synchronize,
    SyncPosition,
    SetSpindle {
        state: SpindleState,
        rpm: f32,
    },
    SetCoolant(CoolantState),
    SetToolLengthOffset(ToolLengthOffset),
    ReadInput {
        port: u8,
        level: bool,
    },
    WriteOutput {
        port: u8,
        level: bool,
    },
    Delay(Duration),
}

impl MachineCall {
    /// Check whether the call commands axis motion
    pub fn is_motion(&self) -> bool {
        matches!(self, MachineCall::MoveLinear { .. } | MachineCall::Probe { .. })
    }
}

impl std::fmt::Display for MachineCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MoveLinear {
                target,
                feed_rate,
                rapid,
            } => {
                if *rapid {
                    write!(f, "G0 X{:.3} Y{:.3} Z{:.3}", target.x, target.y, target.z)?;
                } else {
                    write!(
                        f,
                        "G1 X{:.3} Y{:.3} Z{:.3} F{:.0}",
                        target.x, target.y, target.z, feed_rate
                    )?;
                }
                if target.a != 0.0 || target.b != 0.0 || target.c != 0.0 {
                    write!(f, " A{:.3} B{:.3} C{:.3}", target.a, target.b, target.c)?;
                }
                Ok(())
            }
            Self::Probe { target, feed_rate } => write!(
                f,
                "G38.2 X{:.3} Y{:.3} Z{:.3} F{:.0}",
                target.x, target.y, target.z, feed_rate
            ),
            Self::Synchronize => write!(f, "; sync"),
            Self::SyncPosition => write!(f, "; sync position"),
            Self::SetSpindle { state, rpm } => match state {
                SpindleState::Off => write!(f, "M5"),
                SpindleState::On(SpindleDirection::Clockwise) => {
                    write!(f, "M3 S{:.0}", rpm)
                }
                SpindleState::On(SpindleDirection::CounterClockwise) => {
                    write!(f, "M4 S{:.0}", rpm)
                }
            },
            Self::SetCoolant(state) => match (state.flood, state.mist) {
                (false, false) => write!(f, "M9"),
                (true, false) => write!(f, "M8"),
                (false, true) => write!(f, "M7"),
                (true, true) => write!(f, "M7 M8"),
            },
            Self::SetToolLengthOffset(ToolLengthOffset::Cancelled) => write!(f, "G49"),
            Self::SetToolLengthOffset(ToolLengthOffset::Dynamic(z)) => {
                write!(f, "G43.1 Z{:.3}", z)
            }
            Self::ReadInput { port, level } => write!(f, "; input {} = {}", port, level),
            Self::WriteOutput { port, level } => {
                write!(f, "{} P{}", if *level { "M64" } else { "M65" }, port)
            }
            Self::Delay(duration) => write!(f, "G4 P{:.3}", duration.as_secs_f32()),
        }
    }
}

/// Recording, scriptable machine
pub struct SimulatedMachine {
    position: Position,
    homed: AxisMask,
    spindle: (SpindleState, f32),
    coolant: CoolantState,
    tool_length_offset: ToolLengthOffset,
    outputs: u32,
    sensor_queue: VecDeque<bool>,
    sensor_zones: Vec<(f32, bool)>,
    sensor_default: bool,
    probe_contacts: VecDeque<Option<f32>>,
    fail_move_at: Option<usize>,
    reset_at_move: Option<(usize, Arc<AtcContext>)>,
    move_count: usize,
    calls: Vec<MachineCall>,
}

impl SimulatedMachine {
    /// Homed machine at the origin with spindle and coolant off
    pub fn new() -> Self {
        Self {
            position: Position::default(),
            homed: AxisMask::XYZ,
            spindle: (SpindleState::Off, 0.0),
            coolant: CoolantState::OFF,
            tool_length_offset: ToolLengthOffset::Cancelled,
            outputs: 0,
            sensor_queue: VecDeque::new(),
            sensor_zones: Vec::new(),
            sensor_default: false,
            probe_contacts: VecDeque::new(),
            fail_move_at: None,
            reset_at_move: None,
            move_count: 0,
            calls: Vec::new(),
        }
    }

    /// Start at `position`
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Axes reported as homed
    pub fn with_homed(mut self, homed: AxisMask) -> Self {
        self.homed = homed;
        self
    }

    /// Spindle running when the change starts
    pub fn with_spindle(mut self, state: SpindleState, rpm: f32) -> Self {
        self.spindle = (state, rpm);
        self
    }

    pub fn with_coolant(mut self, coolant: CoolantState) -> Self {
        self.coolant = coolant;
        self
    }

    /// Queue sensor answers consumed one per read, before any other rule
    pub fn with_sensor_readings(mut self, readings: &[bool]) -> Self {
        self.sensor_queue.extend(readings.iter().copied());
        self
    }

    /// Answer reads taken at height `z`
    pub fn with_sensor_at(mut self, z: f32, present: bool) -> Self {
        self.sensor_zones.push((z, present));
        self
    }

    /// Answer for reads that no other rule covers
    pub fn with_sensor_default(mut self, present: bool) -> Self {
        self.sensor_default = present;
        self
    }

    /// Next probe makes contact at height `z`
    pub fn with_probe_contact(mut self, z: f32) -> Self {
        self.probe_contacts.push_back(Some(z));
        self
    }

    /// Next probe misses
    pub fn with_probe_miss(mut self) -> Self {
        self.probe_contacts.push_back(None);
        self
    }

    /// Reject the n-th linear move (1-based)
    pub fn fail_move_at(mut self, n: usize) -> Self {
        self.fail_move_at = Some(n);
        self
    }

    /// Run the host reset handler during the n-th linear move (1-based),
    /// which then reports the motion as aborted
    pub fn reset_at_move(mut self, n: usize, context: Arc<AtcContext>) -> Self {
        self.reset_at_move = Some((n, context));
        self
    }

    /// Every call made so far
    pub fn calls(&self) -> &[MachineCall] {
        &self.calls
    }

    /// Moves and probes only
    pub fn moves(&self) -> Vec<MachineCall> {
        self.calls.iter().filter(|c| c.is_motion()).cloned().collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Level last written to an output port
    pub fn output(&self, port: u8) -> bool {
        port < 32 && self.outputs & (1 << port) != 0
    }

    fn sensor_reading(&mut self) -> bool {
        if let Some(level) = self.sensor_queue.pop_front() {
            return level;
        }
        let z = self.position.z;
        self.sensor_zones
            .iter()
            .find(|(zone, _)| (zone - z).abs() < Z_TOLERANCE)
            .map(|(_, present)| *present)
            .unwrap_or(self.sensor_default)
    }
}

impl Default for SimulatedMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedMachine")
            .field("position", &self.position)
            .field("homed", &self.homed)
            .field("calls", &self.calls.len())
            .finish()
    }
}

impl MotionControl for SimulatedMachine {
    fn move_linear(
        &mut self,
        target: &Position,
        feed_rate: f32,
        rapid: bool,
    ) -> Result<(), MotionError> {
        self.move_count += 1;
        self.calls.push(MachineCall::MoveLinear {
            target: *target,
            feed_rate,
            rapid,
        });
        if self.fail_move_at == Some(self.move_count) {
            return Err(MotionError::MoveRejected {
                reason: format!("simulated failure on move {}", self.move_count),
            });
        }
        if let Some((n, context)) = &self.reset_at_move {
            if *n == self.move_count {
                context.on_reset();
                return Err(MotionError::Aborted);
            }
        }
        self.position = *target;
        Ok(())
    }

    fn probe_linear(
        &mut self,
        target: &Position,
        feed_rate: f32,
    ) -> Result<ProbeOutcome, MotionError> {
        self.calls.push(MachineCall::Probe {
            target: *target,
            feed_rate,
        });
        match self.probe_contacts.pop_front().flatten() {
            Some(z) => {
                self.position = target.with(Axis::Z, z);
                Ok(ProbeOutcome::Found(self.position))
            }
            None => {
                self.position = *target;
                Ok(ProbeOutcome::NotFound)
            }
        }
    }

    fn synchronize(&mut self) -> Result<(), MotionError> {
        self.calls.push(MachineCall::Synchronize);
        Ok(())
    }

    fn current_position(&self) -> Position {
        self.position
    }

    fn sync_position(&mut self) {
        self.calls.push(MachineCall::SyncPosition);
    }

    fn homed_axes(&self) -> AxisMask {
        self.homed
    }
}

impl SpindleControl for SimulatedMachine {
    fn spindle_state(&self) -> (SpindleState, f32) {
        self.spindle
    }

    fn set_spindle(&mut self, state: SpindleState, rpm: f32) -> Result<(), MotionError> {
        self.calls.push(MachineCall::SetSpindle { state, rpm });
        self.spindle = (state, rpm);
        Ok(())
    }
}

impl CoolantControl for SimulatedMachine {
    fn coolant_state(&self) -> CoolantState {
        self.coolant
    }

    fn set_coolant(&mut self, state: CoolantState) -> Result<(), MotionError> {
        self.calls.push(MachineCall::SetCoolant(state));
        self.coolant = state;
        Ok(())
    }
}

impl ToolOffsetControl for SimulatedMachine {
    fn tool_length_offset(&self) -> ToolLengthOffset {
        self.tool_length_offset
    }

    fn set_tool_length_offset(&mut self, offset: ToolLengthOffset) {
        self.calls.push(MachineCall::SetToolLengthOffset(offset));
        self.tool_length_offset = offset;
    }
}

impl DigitalIo for SimulatedMachine {
    fn read_input(&mut self, port: u8) -> Result<bool, MotionError> {
        let level = self.sensor_reading();
        self.calls.push(MachineCall::ReadInput { port, level });
        Ok(level)
    }

    fn write_output(&mut self, port: u8, level: bool) -> Result<(), MotionError> {
        if port >= 32 {
            return Err(MotionError::Io {
                port,
                reason: "no such output".to_string(),
            });
        }
        self.calls.push(MachineCall::WriteOutput { port, level });
        if level {
            self.outputs |= 1 << port;
        } else {
            self.outputs &= !(1 << port);
        }
        Ok(())
    }
}

impl Delay for SimulatedMachine {
    fn delay(&mut self, duration: Duration) {
        self.calls.push(MachineCall::Delay(duration));
    }
}
