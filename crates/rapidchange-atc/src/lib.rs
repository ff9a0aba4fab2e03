//! # RapidChange ATC
//!
//! Tool-change sequencer for RapidChange magazines. Given a selected tool it
//! unloads the tool in the spindle into its pocket, loads the new one,
//! optionally verifies both with the spindle tool sensor, measures the new
//! tool on the tool setter, and restores the program state it interrupted.
//!
//! The machine is reached only through the traits in `rapidchange_core`;
//! [`sim::SimulatedMachine`] implements them for tests and dry runs.
//!
//! ```ignore
//! let context = Arc::new(AtcContext::default());
//! let mut changer = ToolChanger::new(machine, config, Arc::clone(&context));
//! changer.select(ToolId(3), true);
//! let result = changer.change();
//! let status = StatusCode::from(&result);
//! ```

pub mod actions;
pub mod changer;
pub mod context;
pub mod dust_cover;
pub mod error;
pub mod pocket;
pub mod recognition;
pub mod sequence;
pub mod sim;
pub mod tool_setter;

pub use actions::Actuator;
pub use changer::{report_options, ChangeOutcome, ChangeState, ProgramStateSnapshot, ToolChanger};
pub use context::{AtcContext, TloMeasurement, TloReference, ToolState};
pub use error::{ChangeError, ChangeResult, ProbeStage, StatusCode};
pub use pocket::PocketLayout;
pub use recognition::ToolSensor;
pub use sequence::Sequence;
pub use sim::{MachineCall, SimulatedMachine};
