//! Data models for positions, tools, and spindle state
//!
//! This module provides:
//! - Axis identifiers and homing masks
//! - Six-axis machine positions used as motion targets
//! - Tool identifiers (tool 0 means "no tool")
//! - Spindle, coolant, and tool length offset state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of axes carried by a [`Position`]
pub const AXIS_COUNT: usize = 6;

/// Machine axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
    /// A (4th) axis
    A,
    /// B (5th) axis
    B,
    /// C (6th) axis
    C,
}

impl Axis {
    /// All axes in index order
    pub fn all() -> &'static [Axis] {
        &[Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B, Axis::C]
    }

    /// Index of this axis in a position array
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::A => 3,
            Axis::B => 4,
            Axis::C => 5,
        }
    }

    /// Whether this axis is one of the linear XYZ axes
    pub fn is_linear(self) -> bool {
        matches!(self, Axis::X | Axis::Y | Axis::Z)
    }

    /// Bit for this axis in an [`AxisMask`]
    pub fn bit(self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
            Axis::A => "A",
            Axis::B => "B",
            Axis::C => "C",
        };
        write!(f, "{}", letter)
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Ok(Axis::X),
            "Y" => Ok(Axis::Y),
            "Z" => Ok(Axis::Z),
            "A" => Ok(Axis::A),
            "B" => Ok(Axis::B),
            "C" => Ok(Axis::C),
            _ => Err(format!("Unknown axis: {}", s)),
        }
    }
}

/// Set of axes, one bit per axis (X = bit 0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisMask(pub u8);

impl AxisMask {
    /// Empty mask
    pub const NONE: AxisMask = AxisMask(0);
    /// X, Y and Z
    pub const XYZ: AxisMask = AxisMask(0b111);

    /// Build a mask from a list of axes
    pub fn of(axes: &[Axis]) -> Self {
        Self(axes.iter().fold(0, |mask, axis| mask | axis.bit()))
    }

    /// Check whether an axis is in the mask
    pub fn contains(&self, axis: Axis) -> bool {
        self.0 & axis.bit() != 0
    }

    /// Axes of `required` missing from this mask
    pub fn missing_from(&self, required: AxisMask) -> AxisMask {
        AxisMask(required.0 & !self.0)
    }

    /// Check if no axis is set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate the axes present in the mask
    pub fn axes(&self) -> impl Iterator<Item = Axis> + '_ {
        Axis::all().iter().copied().filter(|axis| self.contains(*axis))
    }
}

impl fmt::Display for AxisMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        for axis in self.axes() {
            write!(f, "{}", axis)?;
        }
        Ok(())
    }
}

/// Machine position over all six axes, in machine coordinates (mm / degrees)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f32,
    /// Y-axis position
    pub y: f32,
    /// Z-axis position
    pub z: f32,
    /// A-axis position
    pub a: f32,
    /// B-axis position
    pub b: f32,
    /// C-axis position
    pub c: f32,
}

impl Position {
    /// Create a position with X, Y, Z set and rotary axes at zero
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    /// Read a single axis
    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::A => self.a,
            Axis::B => self.b,
            Axis::C => self.c,
        }
    }

    /// Write a single axis
    pub fn set(&mut self, axis: Axis, value: f32) {
        debug_assert!(value.is_finite(), "{axis} target must be finite: {value}");
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::A => self.a = value,
            Axis::B => self.b = value,
            Axis::C => self.c = value,
        }
    }

    /// Copy of this position with one axis replaced
    pub fn with(mut self, axis: Axis, value: f32) -> Self {
        self.set(axis, value);
        self
    }

    /// Copy of this position with X and Y replaced
    pub fn with_xy(self, x: f32, y: f32) -> Self {
        self.with(Axis::X, x).with(Axis::Y, y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X:{:.3} Y:{:.3} Z:{:.3} A:{:.3} B:{:.3} C:{:.3}",
            self.x, self.y, self.z, self.a, self.b, self.c
        )
    }
}

/// Tool number as used by the host tool table (`T` word)
///
/// Tool 0 is reserved for "no tool in the spindle".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToolId(pub u32);

impl ToolId {
    /// The empty spindle
    pub const NONE: ToolId = ToolId(0);

    /// Check whether this identifier means "no tool"
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Check whether this identifier names a real tool
    pub fn is_some(&self) -> bool {
        self.0 != 0
    }
}

impl From<u32> for ToolId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "T0 (none)")
        } else {
            write!(f, "T{}", self.0)
        }
    }
}

/// Spindle rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpindleDirection {
    /// Clockwise (M3), tightens the clamping nut
    Clockwise,
    /// Counter-clockwise (M4), loosens the clamping nut
    CounterClockwise,
}

/// Spindle on/off state and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpindleState {
    /// Spindle stopped (M5)
    Off,
    /// Spindle running in the given direction
    On(SpindleDirection),
}

impl SpindleState {
    /// Check whether the spindle is running
    pub fn is_on(&self) -> bool {
        matches!(self, SpindleState::On(_))
    }
}

impl Default for SpindleState {
    fn default() -> Self {
        Self::Off
    }
}

impl fmt::Display for SpindleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::On(SpindleDirection::Clockwise) => write!(f, "cw"),
            Self::On(SpindleDirection::CounterClockwise) => write!(f, "ccw"),
        }
    }
}

/// Coolant outputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolantState {
    /// Flood coolant (M8)
    pub flood: bool,
    /// Mist coolant (M7)
    pub mist: bool,
}

impl CoolantState {
    /// All coolant off (M9)
    pub const OFF: CoolantState = CoolantState {
        flood: false,
        mist: false,
    };
}

/// Active tool length offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ToolLengthOffset {
    /// No offset applied (G49)
    Cancelled,
    /// Dynamic offset along Z (G43.1 Z...)
    Dynamic(f32),
}

impl ToolLengthOffset {
    /// Offset value in mm, zero when cancelled
    pub fn value(&self) -> f32 {
        match self {
            Self::Cancelled => 0.0,
            Self::Dynamic(offset) => *offset,
        }
    }
}

impl Default for ToolLengthOffset {
    fn default() -> Self {
        Self::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_mask_missing_axes() {
        let homed = AxisMask::of(&[Axis::X, Axis::Z]);
        let missing = homed.missing_from(AxisMask::XYZ);
        assert_eq!(missing, AxisMask::of(&[Axis::Y]));
        assert_eq!(missing.to_string(), "Y");
        assert!(homed.contains(Axis::Z));
        assert!(!homed.contains(Axis::Y));
    }

    #[test]
    fn test_position_axis_access() {
        let pos = Position::new(1.0, 2.0, 3.0).with(Axis::B, 90.0);
        assert_eq!(pos.get(Axis::Z), 3.0);
        assert_eq!(pos.get(Axis::B), 90.0);
        assert_eq!(pos.with_xy(5.0, 6.0), Position::new(5.0, 6.0, 3.0).with(Axis::B, 90.0));
    }

    #[test]
    fn test_tool_id_none() {
        assert!(ToolId::NONE.is_none());
        assert!(ToolId(4).is_some());
        assert_eq!(ToolId(4).to_string(), "T4");
    }

    #[test]
    fn test_axis_from_str() {
        assert_eq!("b".parse::<Axis>(), Ok(Axis::B));
        assert!("W".parse::<Axis>().is_err());
    }

    #[test]
    fn test_position_serde() {
        let pos = Position::new(10.0, -5.5, 42.0);
        let json = serde_json::to_string(&pos).unwrap();
        let back: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(pos, back);
    }
}
