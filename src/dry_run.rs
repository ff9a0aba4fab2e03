//! Dry-run driver
//!
//! Runs one tool change against a [`SimulatedMachine`] and collects what the
//! machine was asked to do. Operator pauses are acknowledged automatically,
//! up to a limit, so a whole change can be inspected without a host.

use std::sync::Arc;

use rapidchange_atc::{
    AtcContext, ChangeOutcome, ChangeResult, MachineCall, PocketLayout, SimulatedMachine,
    StatusCode, ToolChanger,
};
use rapidchange_core::{
    AtcEvent, Axis, ManualAction, Position, SpindleDirection, SpindleState, ToolId,
    ToolOffsetControl,
};
use rapidchange_settings::AtcConfig;

/// Parameters of a simulated change
#[derive(Debug, Clone)]
pub struct DryRun {
    /// Tool in the spindle before the change
    pub from: ToolId,
    /// Tool selected for the change
    pub to: ToolId,
    /// Machine position when the change is requested
    pub start: Position,
    /// Spindle speed at the time of the change, if running clockwise
    pub spindle_rpm: Option<f32>,
    /// Scripted tool sensor readings; derived from the change when absent
    pub sensor_readings: Option<Vec<bool>>,
    /// Height at which the tool setter probes make contact
    pub probe_contact: f32,
    /// TLO reference kept from an earlier session; the first measurement
    /// establishes one when absent
    pub tlo_reference: Option<f32>,
    /// Operator pauses acknowledged before giving up
    pub max_resumes: usize,
}

impl Default for DryRun {
    fn default() -> Self {
        Self {
            from: ToolId::NONE,
            to: ToolId(1),
            start: Position::default(),
            spindle_rpm: None,
            sensor_readings: None,
            probe_contact: -80.0,
            tlo_reference: None,
            max_resumes: 4,
        }
    }
}

/// What happened during a dry run
#[derive(Debug)]
pub struct DryRunReport {
    pub result: ChangeResult<ChangeOutcome>,
    pub status: StatusCode,
    /// Pauses acknowledged on the operator's behalf
    pub operator_actions: Vec<ManualAction>,
    pub calls: Vec<MachineCall>,
    pub events: Vec<AtcEvent>,
    pub current_tool: ToolId,
    /// Tool length offset in effect after the change, 0 when cancelled
    pub tool_length_offset: f32,
}

impl DryRun {
    /// Sensor readings a healthy change produces
    ///
    /// One "empty" read after unloading a pocketed tool, then "present" at
    /// zone 1 and "empty" at zone 2 after loading a pocketed tool.
    pub fn healthy_sensor_readings(&self, layout: &PocketLayout) -> Vec<bool> {
        let mut readings = Vec::new();
        if self.from.is_some() && layout.tool_has_pocket(self.from) {
            readings.push(false);
        }
        if self.to.is_some() && layout.tool_has_pocket(self.to) {
            readings.extend([true, false]);
        }
        readings
    }

    fn machine(&self, config: &AtcConfig) -> SimulatedMachine {
        let mut machine = SimulatedMachine::new().at(self.start);
        if let Some(rpm) = self.spindle_rpm {
            machine = machine.with_spindle(SpindleState::On(SpindleDirection::Clockwise), rpm);
        }
        if config.tool_recognition.is_some() {
            let readings = self
                .sensor_readings
                .clone()
                .unwrap_or_else(|| self.healthy_sensor_readings(&PocketLayout::new(config)));
            machine = machine.with_sensor_readings(&readings);
        }
        if config.tool_setter.is_some() {
            machine = machine
                .with_probe_contact(self.probe_contact)
                .with_probe_contact(self.probe_contact);
        }
        machine
    }

    /// Run the change to completion, failure, or the resume limit
    pub fn run(&self, config: AtcConfig) -> DryRunReport {
        let context = Arc::new(AtcContext::default());
        if let Some(reference) = self.tlo_reference {
            context.record_probe(Axis::Z, reference);
        }
        let mut rx = context.events().subscribe();
        let machine = self.machine(&config);
        let mut changer = ToolChanger::new(machine, config, Arc::clone(&context));
        changer.machine_mut().clear_calls();

        changer.select(self.from, false);
        changer.select(self.to, true);

        let mut operator_actions = Vec::new();
        let mut result = changer.change();
        while let Ok(ChangeOutcome::AwaitingOperator(action)) = result {
            if operator_actions.len() >= self.max_resumes {
                tracing::warn!("Giving up after {} operator pauses", operator_actions.len());
                break;
            }
            tracing::info!("Acknowledging operator action: {}", action);
            operator_actions.push(action);
            result = changer.resume();
        }

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        let status = StatusCode::from(&result);
        let current_tool = changer.current_tool();
        let tool_length_offset = changer.machine().tool_length_offset().value();
        let calls = changer.into_machine().calls().to_vec();
        DryRunReport {
            result,
            status,
            operator_actions,
            calls,
            events,
            current_tool,
            tool_length_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapidchange_settings::{AtcSettings, PortMap, SettingsStore};
    use tempfile::TempDir;

    fn magazine() -> AtcSettings {
        AtcSettings {
            pocket_count: 6,
            pocket_offset: 45.0,
            z_start_offset: 23.0,
            z_retract_offset: 7.0,
            z_engage: -100.0,
            z_traverse: -60.0,
            z_safe_clearance: -5.0,
            engage_feed_rate: 1800.0,
            load_rpm: 1200.0,
            unload_rpm: 1200.0,
            ..AtcSettings::default()
        }
    }

    fn with_recognition(settings: AtcSettings) -> AtcSettings {
        AtcSettings {
            tool_recognition_enabled: true,
            tool_recognition_port: Some(0),
            tool_recognition_z_zone_1: -90.0,
            tool_recognition_z_zone_2: -75.0,
            ..settings
        }
    }

    fn with_tool_setter(settings: AtcSettings) -> AtcSettings {
        AtcSettings {
            tool_setter_enabled: true,
            tool_setter_x: 300.0,
            tool_setter_y: 10.0,
            tool_setter_z_seek_start: -20.0,
            tool_setter_seek_feed_rate: 800.0,
            tool_setter_set_feed_rate: 50.0,
            tool_setter_max_travel: 100.0,
            tool_setter_seek_retreat: 3.0,
            ..settings
        }
    }

    #[test]
    fn test_dry_run_completes_from_saved_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("atc.toml");

        let mut store = SettingsStore::new(&path);
        *store.settings_mut() = with_recognition(magazine());
        store.save().unwrap();

        let store = SettingsStore::load(&path).unwrap();
        let config = store.validated(&PortMap::new(1, 0)).unwrap();
        let run = DryRun {
            from: ToolId(1),
            to: ToolId(3),
            ..DryRun::default()
        };
        let report = run.run(config);

        assert_eq!(report.result, Ok(ChangeOutcome::Completed));
        assert_eq!(report.status, StatusCode::Ok);
        assert_eq!(report.current_tool, ToolId(3));
        assert!(report.operator_actions.is_empty());
        assert_eq!(report.tool_length_offset, 0.0);

        let reads = report
            .calls
            .iter()
            .filter(|call| matches!(call, MachineCall::ReadInput { .. }))
            .count();
        assert_eq!(reads, 3);
    }

    #[test]
    fn test_dry_run_acknowledges_manual_load() {
        let config = magazine().validate(&PortMap::default()).unwrap();
        let run = DryRun {
            from: ToolId::NONE,
            to: ToolId(9),
            ..DryRun::default()
        };
        let report = run.run(config);

        assert_eq!(report.operator_actions, vec![ManualAction::InstallTool(ToolId(9))]);
        assert_eq!(report.result, Ok(ChangeOutcome::Completed));
        assert_eq!(report.current_tool, ToolId(9));
    }

    #[test]
    fn test_dry_run_stops_after_resume_limit() {
        let config = with_recognition(magazine())
            .validate(&PortMap::new(1, 0))
            .unwrap();
        // The tool never leaves the spindle
        let run = DryRun {
            from: ToolId(2),
            to: ToolId(4),
            sensor_readings: Some(vec![true; 16]),
            max_resumes: 0,
            ..DryRun::default()
        };
        let report = run.run(config);

        assert_eq!(
            report.result,
            Ok(ChangeOutcome::AwaitingOperator(ManualAction::RemoveTool(ToolId(2))))
        );
        assert!(report.operator_actions.is_empty());
        assert_eq!(report.current_tool, ToolId(2));
    }

    #[test]
    fn test_dry_run_reports_offset_against_kept_reference() {
        let config = with_tool_setter(magazine())
            .validate(&PortMap::default())
            .unwrap();
        let run = DryRun {
            from: ToolId(1),
            to: ToolId(3),
            probe_contact: -80.0,
            tlo_reference: Some(-78.0),
            ..DryRun::default()
        };
        let report = run.run(config);

        assert_eq!(report.result, Ok(ChangeOutcome::Completed));
        assert_eq!(report.tool_length_offset, -2.0);
        assert!(report
            .events
            .contains(&AtcEvent::ToolLengthOffsetApplied(-2.0)));
    }

    #[test]
    fn test_healthy_sensor_readings() {
        let config = magazine().validate(&PortMap::default()).unwrap();
        let layout = PocketLayout::new(&config);
        let run = DryRun {
            from: ToolId(1),
            to: ToolId(7),
            ..DryRun::default()
        };
        assert_eq!(run.healthy_sensor_readings(&layout), vec![false]);

        let run = DryRun {
            from: ToolId::NONE,
            to: ToolId(2),
            ..DryRun::default()
        };
        assert_eq!(run.healthy_sensor_readings(&layout), vec![true, false]);
    }
}
