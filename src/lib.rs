//! # RapidChange
//!
//! Automatic tool-change sequencing for RapidChange ATC magazines.
//!
//! ## Architecture
//!
//! The workspace is split into three crates:
//!
//! 1. **rapidchange-core** - Machine data model, collaborator traits, events
//! 2. **rapidchange-settings** - Settings record, `$9xx` registry, persistence
//! 3. **rapidchange-atc** - Pocket geometry, load/unload sequences, tool setter,
//!    and the tool-change state machine
//!
//! This crate ties them together with a dry-run driver used by the
//! `rapidchange-sim` binary.

pub mod dry_run;

pub use rapidchange_atc as atc;
pub use rapidchange_settings as settings;

pub use rapidchange_atc::{
    report_options, AtcContext, ChangeError, ChangeOutcome, ChangeResult, ChangeState,
    MachineCall, PocketLayout, SimulatedMachine, StatusCode, ToolChanger,
};
pub use rapidchange_core::{AtcEvent, EventDispatcher, ManualAction, Position, ToolId};
pub use rapidchange_settings::{AtcConfig, AtcSettings, PortMap, SettingsRegistry, SettingsStore};

pub use dry_run::{DryRun, DryRunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Honors `RUST_LOG`, defaulting to `info`. Logs go to stderr so the
/// simulator report on stdout stays clean; `json` switches to one JSON
/// object per line.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
