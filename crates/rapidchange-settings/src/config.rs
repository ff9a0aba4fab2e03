//! ATC configuration
//!
//! Two layers:
//! - [`AtcSettings`]: the flat record that is persisted and edited through
//!   numbered settings. Every field always exists, whether or not the
//!   feature it belongs to is enabled.
//! - [`AtcConfig`]: the validated, typed configuration the tool changer
//!   runs from. Optional features are `Option` sub-records, so a feature
//!   that is enabled without its port cannot be represented.
//!
//! [`AtcSettings::validate`] is the only way from the first to the second.

use crate::error::{ConfigError, ConfigResult};
use rapidchange_core::Axis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Axis along which the magazine pockets are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Pockets spaced along X
    X,
    /// Pockets spaced along Y
    Y,
}

impl Default for Alignment {
    fn default() -> Self {
        Self::X
    }
}

impl std::fmt::Display for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
        }
    }
}

/// Direction of travel from pocket 1 to pocket 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Pocket 2 sits at a larger coordinate than pocket 1
    Positive,
    /// Pocket 2 sits at a smaller coordinate than pocket 1
    Negative,
}

impl Direction {
    /// Sign applied to the pocket spacing
    pub fn sign(self) -> f32 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::Positive
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "Positive"),
            Self::Negative => write!(f, "Negative"),
        }
    }
}

/// How the dust cover is actuated (persisted selector)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DustCoverKind {
    /// No dust cover
    Disabled,
    /// Cover driven by a rotary/auxiliary axis
    Axis,
    /// Cover driven by a digital output
    Port,
}

impl Default for DustCoverKind {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Digital ports the host has claimed for the tool changer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortMap {
    /// Number of auxiliary digital inputs available (ports `0..inputs`)
    pub digital_inputs: u8,
    /// Number of auxiliary digital outputs available (ports `0..outputs`)
    pub digital_outputs: u8,
}

impl PortMap {
    /// Create a port map
    pub fn new(digital_inputs: u8, digital_outputs: u8) -> Self {
        Self {
            digital_inputs,
            digital_outputs,
        }
    }

    /// Check whether an input port is available
    pub fn has_input(&self, port: u8) -> bool {
        port < self.digital_inputs
    }

    /// Check whether an output port is available
    pub fn has_output(&self, port: u8) -> bool {
        port < self.digital_outputs
    }
}

/// Persisted ATC settings record
///
/// Distances are in mm, feed rates in mm/min, times in milliseconds.
/// `z_start_offset` and `z_retract_offset` are relative to `z_engage`;
/// every other Z value is an absolute machine coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtcSettings {
    /// Axis along which pockets are aligned
    pub alignment: Alignment,
    /// Direction from pocket 1 to pocket 2
    pub direction: Direction,
    /// Number of pockets in the magazine
    pub pocket_count: u32,
    /// Center to center pocket spacing
    pub pocket_offset: f32,
    /// X of pocket 1
    pub pocket1_x: f32,
    /// Y of pocket 1
    pub pocket1_y: f32,
    /// Height above `z_engage` where the spindle starts
    pub z_start_offset: f32,
    /// Height above `z_engage` the spindle backs off to between engagements
    pub z_retract_offset: f32,
    /// Plunge depth engaging the clamping nut
    pub z_engage: f32,
    /// Height for travel across the magazine
    pub z_traverse: f32,
    /// Height clearing every obstacle
    pub z_safe_clearance: f32,
    /// Feed rate while (dis)engaging the nut
    pub engage_feed_rate: f32,
    /// Spindle speed while loading
    pub load_rpm: f32,
    /// Spindle speed while unloading
    pub unload_rpm: f32,
    /// Wait after starting the spindle
    pub spindle_ramp_ms: u64,
    /// Return to the pre-change XY/Z when the change completes
    pub return_to_origin: bool,

    /// Measure tool length after loading
    pub tool_setter_enabled: bool,
    pub tool_setter_x: f32,
    pub tool_setter_y: f32,
    pub tool_setter_z_seek_start: f32,
    pub tool_setter_seek_feed_rate: f32,
    pub tool_setter_set_feed_rate: f32,
    pub tool_setter_max_travel: f32,
    pub tool_setter_seek_retreat: f32,

    /// Check tool presence with the spindle sensor
    pub tool_recognition_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_recognition_port: Option<u8>,
    pub tool_recognition_z_zone_1: f32,
    pub tool_recognition_z_zone_2: f32,

    /// Dust cover actuation
    pub dust_cover: DustCoverKind,
    pub dust_cover_axis: Axis,
    pub dust_cover_open_position: f32,
    pub dust_cover_close_position: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dust_cover_port: Option<u8>,
    pub dust_cover_settle_ms: u64,
}

impl Default for AtcSettings {
    fn default() -> Self {
        Self {
            alignment: Alignment::X,
            direction: Direction::Positive,
            pocket_count: 0,
            pocket_offset: 0.0,
            pocket1_x: 0.0,
            pocket1_y: 0.0,
            z_start_offset: 0.0,
            z_retract_offset: 0.0,
            z_engage: 0.0,
            z_traverse: 0.0,
            z_safe_clearance: 0.0,
            engage_feed_rate: 0.0,
            load_rpm: 0.0,
            unload_rpm: 0.0,
            spindle_ramp_ms: 3000,
            return_to_origin: false,
            tool_setter_enabled: false,
            tool_setter_x: 0.0,
            tool_setter_y: 0.0,
            tool_setter_z_seek_start: 0.0,
            tool_setter_seek_feed_rate: 0.0,
            tool_setter_set_feed_rate: 0.0,
            tool_setter_max_travel: 0.0,
            tool_setter_seek_retreat: 0.0,
            tool_recognition_enabled: false,
            tool_recognition_port: None,
            tool_recognition_z_zone_1: 0.0,
            tool_recognition_z_zone_2: 0.0,
            dust_cover: DustCoverKind::Disabled,
            dust_cover_axis: Axis::C,
            dust_cover_open_position: 0.0,
            dust_cover_close_position: 0.0,
            dust_cover_port: None,
            dust_cover_settle_ms: 1000,
        }
    }
}

/// Tool setter location and probing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolSetterConfig {
    pub x: f32,
    pub y: f32,
    /// Height at which the seek probe starts
    pub z_seek_start: f32,
    pub seek_feed_rate: f32,
    pub set_feed_rate: f32,
    /// Longest distance the seek probe may travel
    pub max_travel: f32,
    /// Back-off between the seek and set probes
    pub seek_retreat: f32,
}

/// Spindle tool sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolRecognitionConfig {
    pub sensor_port: u8,
    pub z_zone_1: f32,
    pub z_zone_2: f32,
}

/// Dust cover actuation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DustCoverMode {
    /// No cover; opening and closing succeed immediately
    Disabled,
    /// Cover moved by an auxiliary axis
    AxisDriven {
        axis: Axis,
        open_position: f32,
        close_position: f32,
    },
    /// Cover moved by a digital output, no completion feedback
    PortDriven { output_port: u8, settle: Duration },
}

/// Validated ATC configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AtcConfig {
    pub alignment: Alignment,
    pub direction: Direction,
    pub pocket_count: u32,
    pub pocket_offset: f32,
    pub pocket1_x: f32,
    pub pocket1_y: f32,
    pub z_start_offset: f32,
    pub z_retract_offset: f32,
    pub z_engage: f32,
    pub z_traverse: f32,
    pub z_safe_clearance: f32,
    pub engage_feed_rate: f32,
    pub load_rpm: f32,
    pub unload_rpm: f32,
    pub spindle_ramp: Duration,
    pub return_to_origin: bool,
    pub tool_setter: Option<ToolSetterConfig>,
    pub tool_recognition: Option<ToolRecognitionConfig>,
    pub dust_cover: DustCoverMode,
}

impl AtcConfig {
    /// Height where the spindle is started above a pocket
    pub fn z_start(&self) -> f32 {
        self.z_engage + self.z_start_offset
    }

    /// Height the spindle backs off to between engagements
    pub fn z_retract(&self) -> f32 {
        self.z_engage + self.z_retract_offset
    }
}

fn check_finite(key: &str, value: f32) -> ConfigResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::ValueOutOfRange {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn check_positive(key: &str, value: f32) -> ConfigResult<()> {
    check_finite(key, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::ValueOutOfRange {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn check_non_negative(key: &str, value: f32) -> ConfigResult<()> {
    check_finite(key, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::ValueOutOfRange {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl AtcSettings {
    /// Validate the record against the ports the host claimed and build the
    /// typed configuration.
    pub fn validate(&self, ports: &PortMap) -> ConfigResult<AtcConfig> {
        check_non_negative("pocket_offset", self.pocket_offset)?;
        check_finite("pocket1_x", self.pocket1_x)?;
        check_finite("pocket1_y", self.pocket1_y)?;
        check_non_negative("z_start_offset", self.z_start_offset)?;
        check_non_negative("z_retract_offset", self.z_retract_offset)?;
        check_finite("z_engage", self.z_engage)?;
        check_finite("z_traverse", self.z_traverse)?;
        check_finite("z_safe_clearance", self.z_safe_clearance)?;

        if self.z_traverse < self.z_engage {
            return Err(ConfigError::InconsistentHeights(format!(
                "z_traverse {} is below z_engage {}",
                self.z_traverse, self.z_engage
            )));
        }
        if self.z_safe_clearance < self.z_traverse {
            return Err(ConfigError::InconsistentHeights(format!(
                "z_safe_clearance {} is below z_traverse {}",
                self.z_safe_clearance, self.z_traverse
            )));
        }

        if self.pocket_count > 0 {
            check_positive("engage_feed_rate", self.engage_feed_rate)?;
            check_positive("load_rpm", self.load_rpm)?;
            check_positive("unload_rpm", self.unload_rpm)?;
        }

        let tool_setter = if self.tool_setter_enabled {
            check_finite("tool_setter_x", self.tool_setter_x)?;
            check_finite("tool_setter_y", self.tool_setter_y)?;
            check_finite("tool_setter_z_seek_start", self.tool_setter_z_seek_start)?;
            check_positive("tool_setter_seek_feed_rate", self.tool_setter_seek_feed_rate)?;
            check_positive("tool_setter_set_feed_rate", self.tool_setter_set_feed_rate)?;
            check_positive("tool_setter_max_travel", self.tool_setter_max_travel)?;
            check_positive("tool_setter_seek_retreat", self.tool_setter_seek_retreat)?;
            if self.tool_setter_z_seek_start > self.z_safe_clearance {
                return Err(ConfigError::InconsistentHeights(format!(
                    "tool setter seek start {} is above z_safe_clearance {}",
                    self.tool_setter_z_seek_start, self.z_safe_clearance
                )));
            }
            Some(ToolSetterConfig {
                x: self.tool_setter_x,
                y: self.tool_setter_y,
                z_seek_start: self.tool_setter_z_seek_start,
                seek_feed_rate: self.tool_setter_seek_feed_rate,
                set_feed_rate: self.tool_setter_set_feed_rate,
                max_travel: self.tool_setter_max_travel,
                seek_retreat: self.tool_setter_seek_retreat,
            })
        } else {
            None
        };

        let tool_recognition = if self.tool_recognition_enabled {
            let sensor_port = match self.tool_recognition_port {
                Some(port) if ports.has_input(port) => port,
                other => return Err(ConfigError::RecognitionPortUnavailable { port: other }),
            };
            check_finite("tool_recognition_z_zone_1", self.tool_recognition_z_zone_1)?;
            check_finite("tool_recognition_z_zone_2", self.tool_recognition_z_zone_2)?;
            Some(ToolRecognitionConfig {
                sensor_port,
                z_zone_1: self.tool_recognition_z_zone_1,
                z_zone_2: self.tool_recognition_z_zone_2,
            })
        } else {
            None
        };

        let dust_cover = match self.dust_cover {
            DustCoverKind::Disabled => DustCoverMode::Disabled,
            DustCoverKind::Axis => {
                if self.dust_cover_axis.is_linear() {
                    return Err(ConfigError::InvalidDustCoverAxis(self.dust_cover_axis));
                }
                check_finite("dust_cover_open_position", self.dust_cover_open_position)?;
                check_finite("dust_cover_close_position", self.dust_cover_close_position)?;
                DustCoverMode::AxisDriven {
                    axis: self.dust_cover_axis,
                    open_position: self.dust_cover_open_position,
                    close_position: self.dust_cover_close_position,
                }
            }
            DustCoverKind::Port => match self.dust_cover_port {
                Some(port) if ports.has_output(port) => DustCoverMode::PortDriven {
                    output_port: port,
                    settle: Duration::from_millis(self.dust_cover_settle_ms),
                },
                other => return Err(ConfigError::DustCoverPortUnavailable { port: other }),
            },
        };

        Ok(AtcConfig {
            alignment: self.alignment,
            direction: self.direction,
            pocket_count: self.pocket_count,
            pocket_offset: self.pocket_offset,
            pocket1_x: self.pocket1_x,
            pocket1_y: self.pocket1_y,
            z_start_offset: self.z_start_offset,
            z_retract_offset: self.z_retract_offset,
            z_engage: self.z_engage,
            z_traverse: self.z_traverse,
            z_safe_clearance: self.z_safe_clearance,
            engage_feed_rate: self.engage_feed_rate,
            load_rpm: self.load_rpm,
            unload_rpm: self.unload_rpm,
            spindle_ramp: Duration::from_millis(self.spindle_ramp_ms),
            return_to_origin: self.return_to_origin,
            tool_setter,
            tool_recognition,
            dust_cover,
        })
    }
}
