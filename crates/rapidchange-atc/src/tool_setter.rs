//! Tool setter probe routine
//!
//! Two-stage measurement: a fast seek bounded by `max_travel`, a short
//! retreat, then a slow set probe. The set probe's contact height feeds the
//! TLO bookkeeping in [`AtcContext`]: the first reading becomes the
//! reference, later ones are applied as a dynamic Z offset.

use crate::actions::Actuator;
use crate::context::{AtcContext, TloMeasurement};
use crate::error::{ChangeError, ChangeResult, ProbeStage};
use rapidchange_core::{AtcEvent, Axis, Machine, ProbeOutcome, ToolLengthOffset};
use rapidchange_settings::AtcConfig;

/// Extra travel of the set probe beyond the retreat distance
pub const SET_PROBE_OVERTRAVEL: f32 = 2.0;

/// Measure the tool in the spindle
pub fn measure_tool<M: Machine>(
    act: &mut Actuator<'_, M>,
    config: &AtcConfig,
    context: &AtcContext,
) -> ChangeResult<TloMeasurement> {
    let setter = config
        .tool_setter
        .as_ref()
        .ok_or_else(|| ChangeError::ToolSetterUnavailable {
            reason: "tool setter disabled".to_string(),
        })?;
    let tool = context.current_tool();
    if tool.is_none() {
        return Err(ChangeError::ToolSetterUnavailable {
            reason: "no tool in the spindle".to_string(),
        });
    }
    tracing::info!("Measuring {}", tool);

    act.rapid_to_z(config.z_safe_clearance)?;
    act.rapid_to_xy(setter.x, setter.y)?;
    act.rapid_to_z(setter.z_seek_start)?;

    let seek_end = setter.z_seek_start - setter.max_travel;
    if act.probe_z(seek_end, setter.seek_feed_rate)? == ProbeOutcome::NotFound {
        tracing::error!("Seek probe reached Z {:.3} without contact", seek_end);
        return Err(ChangeError::ProbeMiss {
            stage: ProbeStage::Seek,
        });
    }

    let retreat = act.target().z + setter.seek_retreat;
    act.rapid_to_z(retreat)?;

    let set_end = act.target().z - (setter.seek_retreat + SET_PROBE_OVERTRAVEL);
    let measured = match act.probe_z(set_end, setter.set_feed_rate)? {
        ProbeOutcome::Found(contact) => contact.z,
        ProbeOutcome::NotFound => {
            tracing::error!("Set probe reached Z {:.3} without contact", set_end);
            return Err(ChangeError::ProbeMiss {
                stage: ProbeStage::Set,
            });
        }
    };

    let measurement = context.record_probe(Axis::Z, measured);
    if let TloMeasurement::Offset(offset) = measurement {
        act.machine()
            .set_tool_length_offset(ToolLengthOffset::Dynamic(offset));
        tracing::info!("Applied TLO {:.3} for {}", offset, tool);
        context
            .events()
            .publish(AtcEvent::ToolLengthOffsetApplied(offset));
    }

    act.rapid_to_z(config.z_safe_clearance)?;
    Ok(measurement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{MachineCall, SimulatedMachine};
    use rapidchange_core::{Position, ToolId};
    use rapidchange_settings::{AtcSettings, PortMap};

    fn config() -> AtcConfig {
        AtcSettings {
            z_engage: -100.0,
            z_traverse: -60.0,
            z_safe_clearance: -5.0,
            tool_setter_enabled: true,
            tool_setter_x: 300.0,
            tool_setter_y: 10.0,
            tool_setter_z_seek_start: -20.0,
            tool_setter_seek_feed_rate: 800.0,
            tool_setter_set_feed_rate: 50.0,
            tool_setter_max_travel: 100.0,
            tool_setter_seek_retreat: 3.0,
            ..AtcSettings::default()
        }
        .validate(&PortMap::default())
        .unwrap()
    }

    fn loaded_context(tool: u32) -> AtcContext {
        let ctx = AtcContext::default();
        ctx.select(ToolId(tool), false);
        ctx
    }

    fn probes(machine: &SimulatedMachine) -> Vec<(f32, f32)> {
        machine
            .calls()
            .iter()
            .filter_map(|call| match call {
                MachineCall::Probe { target, feed_rate } => Some((target.z, *feed_rate)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_probe_distances_follow_target() {
        let config = config();
        let ctx = loaded_context(2);
        let mut machine = SimulatedMachine::new()
            .with_probe_contact(-61.0)
            .with_probe_contact(-61.25);
        let mut target = Position::new(0.0, 0.0, -60.0);
        let mut act = Actuator::new(&mut machine, &mut target);

        let measurement = measure_tool(&mut act, &config, &ctx).unwrap();
        assert_eq!(measurement, TloMeasurement::ReferenceEstablished(-61.25));

        // seek from -20 by 100, then retreat 3 from -61 and probe 5 down
        assert_eq!(probes(&machine), vec![(-120.0, 800.0), (-63.0, 50.0)]);
        assert!(machine.calls().contains(&MachineCall::MoveLinear {
            target: Position::new(300.0, 10.0, -58.0),
            feed_rate: 0.0,
            rapid: true,
        }));
        assert_eq!(target.z, -5.0);
    }

    #[test]
    fn test_second_measurement_applies_offset() {
        let config = config();
        let ctx = loaded_context(2);
        ctx.record_probe(Axis::Z, -60.0);

        let mut machine = SimulatedMachine::new()
            .with_probe_contact(-63.0)
            .with_probe_contact(-63.5);
        let mut target = Position::new(0.0, 0.0, -60.0);
        let mut act = Actuator::new(&mut machine, &mut target);

        let measurement = measure_tool(&mut act, &config, &ctx).unwrap();
        assert_eq!(measurement, TloMeasurement::Offset(-3.5));
        assert_eq!(ctx.tlo_reference().get(Axis::Z), Some(-60.0));
        assert!(machine
            .calls()
            .contains(&MachineCall::SetToolLengthOffset(ToolLengthOffset::Dynamic(-3.5))));
    }

    #[test]
    fn test_seek_miss_is_hard_failure() {
        let config = config();
        let ctx = loaded_context(2);
        let mut machine = SimulatedMachine::new();
        let mut target = Position::default();
        let mut act = Actuator::new(&mut machine, &mut target);

        assert_eq!(
            measure_tool(&mut act, &config, &ctx),
            Err(ChangeError::ProbeMiss {
                stage: ProbeStage::Seek
            })
        );
        assert_eq!(probes(&machine).len(), 1);
        assert!(!ctx.tlo_reference().is_established(Axis::Z));
    }

    #[test]
    fn test_set_miss_is_hard_failure() {
        let config = config();
        let ctx = loaded_context(2);
        let mut machine = SimulatedMachine::new().with_probe_contact(-61.0);
        let mut target = Position::default();
        let mut act = Actuator::new(&mut machine, &mut target);

        assert_eq!(
            measure_tool(&mut act, &config, &ctx),
            Err(ChangeError::ProbeMiss {
                stage: ProbeStage::Set
            })
        );
    }

    #[test]
    fn test_requires_tool_in_spindle() {
        let config = config();
        let ctx = AtcContext::default();
        let mut machine = SimulatedMachine::new();
        let mut target = Position::default();
        let mut act = Actuator::new(&mut machine, &mut target);

        assert!(matches!(
            measure_tool(&mut act, &config, &ctx),
            Err(ChangeError::ToolSetterUnavailable { .. })
        ));
        assert!(machine.calls().is_empty());
    }
}
