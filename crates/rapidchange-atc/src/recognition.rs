//! Spindle tool sensor

use rapidchange_core::{DigitalIo, MotionError};
use rapidchange_settings::ToolRecognitionConfig;

/// Beam sensor that sees the clamping nut of a tool in the spindle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolSensor {
    port: u8,
}

impl ToolSensor {
    pub fn new(config: &ToolRecognitionConfig) -> Self {
        Self {
            port: config.sensor_port,
        }
    }

    /// Sample the sensor once, without debounce
    ///
    /// The caller is responsible for the machine being at rest.
    pub fn has_tool_in_spindle<M: DigitalIo>(&self, io: &mut M) -> Result<bool, MotionError> {
        let present = io.read_input(self.port)?;
        tracing::debug!("tool sensor on port {}: {}", self.port, present);
        Ok(present)
    }
}
