//! # RapidChange Core
//!
//! Core types, traits, and utilities shared by the RapidChange ATC crates.
//! Provides the machine data model, the collaborator traits the tool-change
//! sequencer drives (motion, spindle, coolant, tool offsets, digital I/O),
//! the collaborator error taxonomy, and the event dispatcher.

pub mod data;
pub mod error;
pub mod event;
pub mod hal;

pub use data::{
    Axis, AxisMask, CoolantState, Position, SpindleDirection, SpindleState, ToolId,
    ToolLengthOffset, AXIS_COUNT,
};

pub use error::MotionError;

pub use event::{AtcEvent, EventDispatcher, ManualAction};

pub use hal::{
    CoolantControl, Delay, DigitalIo, Machine, MotionControl, ProbeOutcome, SpindleControl,
    ToolOffsetControl,
};
