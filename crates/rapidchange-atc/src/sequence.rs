//! Unload and load sequences
//!
//! Both sequences leave the tool bookkeeping alone; the state machine
//! commits the new tool identity once a sequence reports [`Sequence::Done`]
//! (or once the operator resumes a paused one).

use crate::actions::Actuator;
use crate::error::ChangeResult;
use crate::pocket::PocketLayout;
use crate::recognition::ToolSensor;
use rapidchange_core::{Machine, ManualAction, SpindleDirection, ToolId};
use rapidchange_settings::AtcConfig;

/// How a sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    /// Finished automatically
    Done,
    /// Parked at a motion boundary until the operator acts
    Paused(ManualAction),
}

/// Start the spindle above the pocket and plunge onto the nut
fn engage<M: Machine>(
    act: &mut Actuator<'_, M>,
    config: &AtcConfig,
    direction: SpindleDirection,
    rpm: f32,
) -> ChangeResult<()> {
    act.rapid_to_z(config.z_start())?;
    act.start_spindle(direction, rpm, config.spindle_ramp)?;
    act.linear_to_z(config.z_engage, config.engage_feed_rate)?;
    Ok(())
}

/// Return the tool in the spindle to its pocket
pub fn unload_tool<M: Machine>(
    act: &mut Actuator<'_, M>,
    config: &AtcConfig,
    layout: &PocketLayout,
    tool: ToolId,
) -> ChangeResult<Sequence> {
    act.rapid_to_z(config.z_safe_clearance)?;
    if tool.is_none() {
        tracing::debug!("Spindle empty, nothing to unload");
        return Ok(Sequence::Done);
    }

    let Some((x, y)) = layout.pocket_position(tool) else {
        let (x, y) = layout.resolved_position(tool);
        act.rapid_to_xy(x, y)?;
        tracing::warn!("{} has no pocket, remove it by hand", tool);
        return Ok(Sequence::Paused(ManualAction::RemoveTool(tool)));
    };

    tracing::info!("Unloading {} into pocket at {:.3}, {:.3}", tool, x, y);
    act.rapid_to_xy(x, y)?;
    engage(act, config, SpindleDirection::CounterClockwise, config.unload_rpm)?;

    let Some(recognition) = config.tool_recognition.as_ref() else {
        act.rapid_to_z(config.z_traverse)?;
        act.stop_spindle()?;
        return Ok(Sequence::Done);
    };

    let sensor = ToolSensor::new(recognition);
    act.rapid_to_z(recognition.z_zone_1)?;
    let mut still_held = sensor.has_tool_in_spindle(act.machine())?;
    if still_held {
        tracing::warn!("{} still detected after unload, retrying once", tool);
        act.rapid_to_z(config.z_start())?;
        act.linear_to_z(config.z_engage, config.engage_feed_rate)?;
        act.rapid_to_z(recognition.z_zone_1)?;
        still_held = sensor.has_tool_in_spindle(act.machine())?;
    }
    act.stop_spindle()?;

    if still_held {
        act.rapid_to_z(config.z_safe_clearance)?;
        tracing::warn!("{} did not release, remove it by hand", tool);
        return Ok(Sequence::Paused(ManualAction::RemoveTool(tool)));
    }

    act.rapid_to_z(config.z_traverse)?;
    Ok(Sequence::Done)
}

/// Pick up `tool` from its pocket
pub fn load_tool<M: Machine>(
    act: &mut Actuator<'_, M>,
    config: &AtcConfig,
    layout: &PocketLayout,
    tool: ToolId,
) -> ChangeResult<Sequence> {
    if tool.is_none() {
        tracing::debug!("No tool requested, leaving spindle empty");
        return Ok(Sequence::Done);
    }

    let Some((x, y)) = layout.pocket_position(tool) else {
        let (x, y) = layout.resolved_position(tool);
        act.rise_to_z(config.z_safe_clearance)?;
        act.rapid_to_xy(x, y)?;
        tracing::warn!("{} has no pocket, install it by hand", tool);
        return Ok(Sequence::Paused(ManualAction::InstallTool(tool)));
    };

    tracing::info!("Loading {} from pocket at {:.3}, {:.3}", tool, x, y);
    act.rise_to_z(config.z_traverse)?;
    act.rapid_to_xy(x, y)?;
    engage(act, config, SpindleDirection::Clockwise, config.load_rpm)?;
    // back off and tighten again to seat the nut
    act.linear_to_z(config.z_retract(), config.engage_feed_rate)?;
    act.linear_to_z(config.z_engage, config.engage_feed_rate)?;
    act.stop_spindle()?;

    if let Some(recognition) = config.tool_recognition.as_ref() {
        let sensor = ToolSensor::new(recognition);

        act.rapid_to_z(recognition.z_zone_1)?;
        if !sensor.has_tool_in_spindle(act.machine())? {
            act.rapid_to_z(config.z_safe_clearance)?;
            tracing::warn!("{} not detected after load, install it by hand", tool);
            return Ok(Sequence::Paused(ManualAction::InstallTool(tool)));
        }

        act.rapid_to_z(recognition.z_zone_2)?;
        if sensor.has_tool_in_spindle(act.machine())? {
            act.rapid_to_z(config.z_safe_clearance)?;
            tracing::warn!("{} detected at zone 2, possible cross-thread", tool);
            return Ok(Sequence::Paused(ManualAction::ReseatTool(tool)));
        }
    }

    act.rapid_to_z(config.z_traverse)?;
    Ok(Sequence::Done)
}
