//! Numbered ATC settings
//!
//! Exposes [`AtcSettings`] fields as `$9xx` settings in the controller's
//! numbering scheme so a host can report them (`$$`) and change them with
//! `$n=value` lines.
//!
//! Enumerated settings take their index or option name (`$900=1` and
//! `$900=Y` both select Y alignment),
//! toggles take `0`/`1`, optional ports take `-1` for "none".

use crate::config::{Alignment, AtcSettings, Direction, DustCoverKind};
use crate::error::{SettingsError, SettingsResult};
use rapidchange_core::Axis;

/// Value format of a numbered setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingFormat {
    /// Whole number
    Integer,
    /// Decimal number
    Decimal,
    /// 0 = disabled, 1 = enabled
    Toggle,
    /// Index into a fixed list of options
    Choice(&'static [&'static str]),
    /// Port number, -1 for none
    Port,
}

/// Static description of a numbered setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingDescriptor {
    /// Setting number (`$n`)
    pub id: u16,
    /// Short label
    pub name: &'static str,
    /// Unit, empty when unitless
    pub unit: &'static str,
    /// Value format
    pub format: SettingFormat,
}

const AXES: &[&str] = &["X", "Y", "Z", "A", "B", "C"];

const fn setting(
    id: u16,
    name: &'static str,
    unit: &'static str,
    format: SettingFormat,
) -> SettingDescriptor {
    SettingDescriptor {
        id,
        name,
        unit,
        format,
    }
}

/// All ATC settings in number order
pub const DESCRIPTORS: &[SettingDescriptor] = &[
    setting(900, "Alignment", "", SettingFormat::Choice(&["X", "Y"])),
    setting(901, "Direction", "", SettingFormat::Choice(&["Positive", "Negative"])),
    setting(902, "Number of tool pockets", "", SettingFormat::Integer),
    setting(903, "Pocket offset", "mm", SettingFormat::Decimal),
    setting(904, "Pocket 1 X position", "mm", SettingFormat::Decimal),
    setting(905, "Pocket 1 Y position", "mm", SettingFormat::Decimal),
    setting(910, "Pocket Z start offset", "mm", SettingFormat::Decimal),
    setting(911, "Pocket Z retract offset", "mm", SettingFormat::Decimal),
    setting(912, "Pocket Z engage", "mm", SettingFormat::Decimal),
    setting(913, "Pocket Z traverse", "mm", SettingFormat::Decimal),
    setting(914, "Pocket Z safe clearance", "mm", SettingFormat::Decimal),
    setting(920, "Pocket engage feed rate", "mm/min", SettingFormat::Decimal),
    setting(921, "Load spindle RPM", "rpm", SettingFormat::Decimal),
    setting(922, "Unload spindle RPM", "rpm", SettingFormat::Decimal),
    setting(923, "Spindle ramp time", "ms", SettingFormat::Integer),
    setting(924, "Return to origin", "", SettingFormat::Toggle),
    setting(930, "Tool setter", "", SettingFormat::Toggle),
    setting(931, "Tool setter X position", "mm", SettingFormat::Decimal),
    setting(932, "Tool setter Y position", "mm", SettingFormat::Decimal),
    setting(933, "Tool setter Z seek start", "mm", SettingFormat::Decimal),
    setting(934, "Tool setter seek feed rate", "mm/min", SettingFormat::Decimal),
    setting(935, "Tool setter set feed rate", "mm/min", SettingFormat::Decimal),
    setting(936, "Tool setter max travel", "mm", SettingFormat::Decimal),
    setting(937, "Tool setter seek retreat", "mm", SettingFormat::Decimal),
    setting(940, "Tool recognition", "", SettingFormat::Toggle),
    setting(941, "Tool recognition sensor port", "", SettingFormat::Port),
    setting(942, "Tool recognition Z zone 1", "mm", SettingFormat::Decimal),
    setting(943, "Tool recognition Z zone 2", "mm", SettingFormat::Decimal),
    setting(950, "Dust cover", "", SettingFormat::Choice(&["Disabled", "Axis", "Port"])),
    setting(951, "Dust cover axis", "", SettingFormat::Choice(AXES)),
    setting(952, "Dust cover open position", "mm", SettingFormat::Decimal),
    setting(953, "Dust cover closed position", "mm", SettingFormat::Decimal),
    setting(954, "Dust cover output port", "", SettingFormat::Port),
    setting(955, "Dust cover settle time", "ms", SettingFormat::Integer),
];

/// Typed value of a numbered setting, shaped by its [`SettingFormat`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Integer(u64),
    Decimal(f32),
    Toggle(bool),
    /// Index into the descriptor's options
    Choice(usize),
    Port(Option<u8>),
}

impl SettingValue {
    /// Parse `value` as `format` requires
    ///
    /// Choices accept either the option index or its name.
    pub fn parse(key: &str, format: SettingFormat, value: &str) -> SettingsResult<Self> {
        match format {
            SettingFormat::Integer => Ok(Self::Integer(parse_integer(key, value)?)),
            SettingFormat::Decimal => Ok(Self::Decimal(parse_decimal(key, value)?)),
            SettingFormat::Toggle => Ok(Self::Toggle(parse_toggle(key, value)?)),
            SettingFormat::Choice(options) => Ok(Self::Choice(parse_choice(key, value, options)?)),
            SettingFormat::Port => Ok(Self::Port(parse_port(key, value)?)),
        }
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Decimal(value) => write!(f, "{:.3}", value),
            Self::Toggle(value) => write!(f, "{}", u8::from(*value)),
            Self::Choice(index) => write!(f, "{}", index),
            Self::Port(Some(port)) => write!(f, "{}", port),
            Self::Port(None) => write!(f, "-1"),
        }
    }
}

/// Numbered access to an [`AtcSettings`] record
#[derive(Debug, Default)]
pub struct SettingsRegistry;

impl SettingsRegistry {
    /// Look up the descriptor of a setting
    pub fn descriptor(id: u16) -> Option<&'static SettingDescriptor> {
        DESCRIPTORS.iter().find(|d| d.id == id)
    }

    /// Parse a `$n=value` line
    pub fn parse_setting_line(line: &str) -> Option<(u16, String)> {
        let rest = line.trim().strip_prefix('$')?;
        let (number, value) = rest.split_once('=')?;
        let number = number.trim().parse::<u16>().ok()?;
        Some((number, value.trim().to_string()))
    }

    /// Current typed value of a setting
    pub fn value(settings: &AtcSettings, id: u16) -> SettingsResult<SettingValue> {
        use SettingValue::*;
        let value = match id {
            900 => Choice(index_of_alignment(settings.alignment)),
            901 => Choice(index_of_direction(settings.direction)),
            902 => Integer(u64::from(settings.pocket_count)),
            903 => Decimal(settings.pocket_offset),
            904 => Decimal(settings.pocket1_x),
            905 => Decimal(settings.pocket1_y),
            910 => Decimal(settings.z_start_offset),
            911 => Decimal(settings.z_retract_offset),
            912 => Decimal(settings.z_engage),
            913 => Decimal(settings.z_traverse),
            914 => Decimal(settings.z_safe_clearance),
            920 => Decimal(settings.engage_feed_rate),
            921 => Decimal(settings.load_rpm),
            922 => Decimal(settings.unload_rpm),
            923 => Integer(settings.spindle_ramp_ms),
            924 => Toggle(settings.return_to_origin),
            930 => Toggle(settings.tool_setter_enabled),
            931 => Decimal(settings.tool_setter_x),
            932 => Decimal(settings.tool_setter_y),
            933 => Decimal(settings.tool_setter_z_seek_start),
            934 => Decimal(settings.tool_setter_seek_feed_rate),
            935 => Decimal(settings.tool_setter_set_feed_rate),
            936 => Decimal(settings.tool_setter_max_travel),
            937 => Decimal(settings.tool_setter_seek_retreat),
            940 => Toggle(settings.tool_recognition_enabled),
            941 => Port(settings.tool_recognition_port),
            942 => Decimal(settings.tool_recognition_z_zone_1),
            943 => Decimal(settings.tool_recognition_z_zone_2),
            950 => Choice(index_of_dust_cover(settings.dust_cover)),
            951 => Choice(settings.dust_cover_axis.index()),
            952 => Decimal(settings.dust_cover_open_position),
            953 => Decimal(settings.dust_cover_close_position),
            954 => Port(settings.dust_cover_port),
            955 => Integer(settings.dust_cover_settle_ms),
            _ => return Err(SettingsError::UnknownSetting(id)),
        };
        Ok(value)
    }

    /// Format the current value of a setting
    pub fn get(settings: &AtcSettings, id: u16) -> SettingsResult<String> {
        Ok(Self::value(settings, id)?.to_string())
    }

    /// Parse and store a setting value
    ///
    /// The value is parsed according to the setting's descriptor; a rejected
    /// value leaves the record untouched.
    pub fn set(settings: &mut AtcSettings, id: u16, value: &str) -> SettingsResult<()> {
        let descriptor = Self::descriptor(id).ok_or(SettingsError::UnknownSetting(id))?;
        let key = format!("${}", id);
        let parsed = SettingValue::parse(&key, descriptor.format, value)?;

        use SettingValue::*;
        match (id, parsed) {
            (900, Choice(index)) => {
                settings.alignment = if index == 0 { Alignment::X } else { Alignment::Y }
            }
            (901, Choice(index)) => {
                settings.direction = if index == 0 {
                    Direction::Positive
                } else {
                    Direction::Negative
                }
            }
            (902, Integer(count)) => {
                settings.pocket_count = u32::try_from(count)
                    .map_err(|_| invalid(&key, format!("{} pockets is too many", count)))?
            }
            (903, Decimal(v)) => settings.pocket_offset = v,
            (904, Decimal(v)) => settings.pocket1_x = v,
            (905, Decimal(v)) => settings.pocket1_y = v,
            (910, Decimal(v)) => settings.z_start_offset = v,
            (911, Decimal(v)) => settings.z_retract_offset = v,
            (912, Decimal(v)) => settings.z_engage = v,
            (913, Decimal(v)) => settings.z_traverse = v,
            (914, Decimal(v)) => settings.z_safe_clearance = v,
            (920, Decimal(v)) => settings.engage_feed_rate = v,
            (921, Decimal(v)) => settings.load_rpm = v,
            (922, Decimal(v)) => settings.unload_rpm = v,
            (923, Integer(ms)) => settings.spindle_ramp_ms = ms,
            (924, Toggle(on)) => settings.return_to_origin = on,
            (930, Toggle(on)) => settings.tool_setter_enabled = on,
            (931, Decimal(v)) => settings.tool_setter_x = v,
            (932, Decimal(v)) => settings.tool_setter_y = v,
            (933, Decimal(v)) => settings.tool_setter_z_seek_start = v,
            (934, Decimal(v)) => settings.tool_setter_seek_feed_rate = v,
            (935, Decimal(v)) => settings.tool_setter_set_feed_rate = v,
            (936, Decimal(v)) => settings.tool_setter_max_travel = v,
            (937, Decimal(v)) => settings.tool_setter_seek_retreat = v,
            (940, Toggle(on)) => settings.tool_recognition_enabled = on,
            (941, Port(port)) => settings.tool_recognition_port = port,
            (942, Decimal(v)) => settings.tool_recognition_z_zone_1 = v,
            (943, Decimal(v)) => settings.tool_recognition_z_zone_2 = v,
            (950, Choice(index)) => {
                settings.dust_cover = match index {
                    0 => DustCoverKind::Disabled,
                    1 => DustCoverKind::Axis,
                    _ => DustCoverKind::Port,
                }
            }
            (951, Choice(index)) => settings.dust_cover_axis = Axis::all()[index],
            (952, Decimal(v)) => settings.dust_cover_open_position = v,
            (953, Decimal(v)) => settings.dust_cover_close_position = v,
            (954, Port(port)) => settings.dust_cover_port = port,
            (955, Integer(ms)) => settings.dust_cover_settle_ms = ms,
            (_, other) => {
                return Err(invalid(&key, format!("no field takes {:?}", other)));
            }
        }
        tracing::debug!("{}={} applied", key, value);
        Ok(())
    }

    /// Apply a `$n=value` line
    pub fn apply_line(settings: &mut AtcSettings, line: &str) -> SettingsResult<u16> {
        let (id, value) =
            Self::parse_setting_line(line).ok_or_else(|| SettingsError::InvalidSetting {
                key: line.trim().to_string(),
                reason: "expected $n=value".to_string(),
            })?;
        Self::set(settings, id, &value)?;
        Ok(id)
    }

    /// Report every setting in number order
    ///
    /// Lines read `$n=value (name[: option][, unit])`; the part before the
    /// comment can be fed back through [`SettingsRegistry::apply_line`].
    pub fn report(settings: &AtcSettings) -> Vec<String> {
        DESCRIPTORS
            .iter()
            .filter_map(|d| {
                let value = Self::value(settings, d.id).ok()?;
                Some(format!("${}={} ({})", d.id, value, describe(d, value)))
            })
            .collect()
    }
}

fn describe(descriptor: &SettingDescriptor, value: SettingValue) -> String {
    let mut label = descriptor.name.to_string();
    if let (SettingFormat::Choice(options), SettingValue::Choice(index)) = (descriptor.format, value)
    {
        if let Some(option) = options.get(index) {
            label.push_str(": ");
            label.push_str(option);
        }
    }
    if !descriptor.unit.is_empty() {
        label.push_str(", ");
        label.push_str(descriptor.unit);
    }
    label
}

fn index_of_alignment(alignment: Alignment) -> usize {
    match alignment {
        Alignment::X => 0,
        Alignment::Y => 1,
    }
}

fn index_of_direction(direction: Direction) -> usize {
    match direction {
        Direction::Positive => 0,
        Direction::Negative => 1,
    }
}

fn index_of_dust_cover(kind: DustCoverKind) -> usize {
    match kind {
        DustCoverKind::Disabled => 0,
        DustCoverKind::Axis => 1,
        DustCoverKind::Port => 2,
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> SettingsError {
    SettingsError::InvalidSetting {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn parse_decimal(key: &str, value: &str) -> SettingsResult<f32> {
    let parsed: f32 = value
        .parse()
        .map_err(|_| invalid(key, format!("'{}' is not a number", value)))?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(invalid(key, "value must be finite"))
    }
}

fn parse_integer<T: std::str::FromStr>(key: &str, value: &str) -> SettingsResult<T> {
    value
        .parse()
        .map_err(|_| invalid(key, format!("'{}' is not a whole number", value)))
}

fn parse_toggle(key: &str, value: &str) -> SettingsResult<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(invalid(key, format!("'{}' must be 0 or 1", other))),
    }
}

fn parse_choice(key: &str, value: &str, options: &[&str]) -> SettingsResult<usize> {
    if let Some(index) = options.iter().position(|o| o.eq_ignore_ascii_case(value)) {
        return Ok(index);
    }
    let index: usize = parse_integer(key, value)?;
    if index < options.len() {
        Ok(index)
    } else {
        Err(invalid(
            key,
            format!("option {} out of range 0..{}", index, options.len()),
        ))
    }
}

fn parse_port(key: &str, value: &str) -> SettingsResult<Option<u8>> {
    let port: i16 = parse_integer(key, value)?;
    match port {
        -1 => Ok(None),
        0..=255 => Ok(Some(port as u8)),
        _ => Err(invalid(key, format!("port {} out of range", port))),
    }
}
