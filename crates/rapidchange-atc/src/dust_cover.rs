//! Dust cover actuation

use crate::actions::Actuator;
use rapidchange_core::{Machine, MotionError};
use rapidchange_settings::DustCoverMode;

/// Open or close the magazine dust cover
///
/// A disabled cover always succeeds. An axis-driven cover waits for its
/// move to finish; a port-driven one has no feedback and waits the
/// configured settle time instead.
pub fn set_cover<M: Machine>(
    act: &mut Actuator<'_, M>,
    mode: &DustCoverMode,
    open: bool,
) -> Result<(), MotionError> {
    let action = if open { "Opening" } else { "Closing" };
    match *mode {
        DustCoverMode::Disabled => Ok(()),
        DustCoverMode::AxisDriven {
            axis,
            open_position,
            close_position,
        } => {
            tracing::info!("{} dust cover on axis {}", action, axis);
            let position = if open { open_position } else { close_position };
            act.rapid_axis(axis, position)
        }
        DustCoverMode::PortDriven {
            output_port,
            settle,
        } => {
            tracing::info!("{} dust cover on port {}", action, output_port);
            act.machine().write_output(output_port, open)?;
            act.dwell(settle);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{MachineCall, SimulatedMachine};
    use rapidchange_core::{Axis, Position};
    use std::time::Duration;

    #[test]
    fn test_disabled_is_noop() {
        let mut machine = SimulatedMachine::new();
        let mut target = Position::default();
        let mut act = Actuator::new(&mut machine, &mut target);

        set_cover(&mut act, &DustCoverMode::Disabled, true).unwrap();
        assert!(machine.calls().is_empty());
    }

    #[test]
    fn test_axis_cover_moves_axis() {
        let mode = DustCoverMode::AxisDriven {
            axis: Axis::C,
            open_position: 90.0,
            close_position: 0.0,
        };
        let mut machine = SimulatedMachine::new();
        let mut target = Position::new(1.0, 2.0, -5.0);
        let mut act = Actuator::new(&mut machine, &mut target);

        set_cover(&mut act, &mode, true).unwrap();
        set_cover(&mut act, &mode, false).unwrap();

        let moves = machine.moves();
        assert_eq!(moves.len(), 2);
        assert_eq!(
            moves[0],
            MachineCall::MoveLinear {
                target: Position::new(1.0, 2.0, -5.0).with(Axis::C, 90.0),
                feed_rate: 0.0,
                rapid: true,
            }
        );
        assert_eq!(target.c, 0.0);
    }

    #[test]
    fn test_port_cover_writes_and_settles() {
        let mode = DustCoverMode::PortDriven {
            output_port: 1,
            settle: Duration::from_millis(1000),
        };
        let mut machine = SimulatedMachine::new();
        let mut target = Position::default();
        let mut act = Actuator::new(&mut machine, &mut target);

        set_cover(&mut act, &mode, true).unwrap();
        assert_eq!(
            machine.calls(),
            &[
                MachineCall::WriteOutput { port: 1, level: true },
                MachineCall::Delay(Duration::from_millis(1000)),
            ]
        );
    }

    #[test]
    fn test_axis_cover_failure_propagates() {
        let mode = DustCoverMode::AxisDriven {
            axis: Axis::B,
            open_position: 10.0,
            close_position: 0.0,
        };
        let mut machine = SimulatedMachine::new().fail_move_at(1);
        let mut target = Position::default();
        let mut act = Actuator::new(&mut machine, &mut target);

        assert!(set_cover(&mut act, &mode, true).is_err());
    }
}
