use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rapidchange::{
    init_logging, report_options, AtcSettings, DryRun, MachineCall, PortMap, Position,
    SettingsRegistry, SettingsStore, ToolId, BUILD_DATE, VERSION,
};

/// Dry-run a RapidChange tool change against a simulated machine
#[derive(Debug, Parser)]
#[command(name = "rapidchange-sim", version)]
struct Cli {
    /// Settings file (.toml or .json); created with defaults if missing
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Use the settings file in the user config directory
    #[arg(long, conflicts_with = "settings")]
    user_settings: bool,

    /// Setting overrides such as `$902=8`
    #[arg(long = "set", value_name = "LINE")]
    overrides: Vec<String>,

    /// Persist the overrides to the settings file
    #[arg(long, requires = "overrides")]
    save: bool,

    /// Print the `$9xx` settings and exit
    #[arg(long)]
    list_settings: bool,

    /// Tool in the spindle before the change (0 = none)
    #[arg(long, default_value_t = 0)]
    from: u32,

    /// Tool to change to
    #[arg(long, default_value_t = 1)]
    to: u32,

    /// Start position as X,Y,Z
    #[arg(
        long,
        value_delimiter = ',',
        num_args = 3,
        allow_negative_numbers = true,
        default_values_t = [0.0, 0.0, 0.0]
    )]
    start: Vec<f32>,

    /// Spindle running clockwise at this speed when the change starts
    #[arg(long)]
    rpm: Option<f32>,

    /// Scripted tool sensor readings, e.g. `0,1,0`
    #[arg(long, value_delimiter = ',')]
    sensor: Option<Vec<u8>>,

    /// Height at which tool setter probes touch
    #[arg(long, default_value_t = -80.0, allow_hyphen_values = true)]
    probe_z: f32,

    /// TLO reference height kept from an earlier session
    #[arg(long, allow_hyphen_values = true)]
    tlo_reference: Option<f32>,

    /// Auxiliary digital inputs available
    #[arg(long, default_value_t = 4)]
    inputs: u8,

    /// Auxiliary digital outputs available
    #[arg(long, default_value_t = 4)]
    outputs: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_log: bool,
}

fn load_settings(cli: &Cli) -> anyhow::Result<AtcSettings> {
    let path = match (&cli.settings, cli.user_settings) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(SettingsStore::default_path()?),
        (None, false) => None,
    };

    let Some(path) = path else {
        let mut settings = AtcSettings::default();
        for line in &cli.overrides {
            SettingsRegistry::apply_line(&mut settings, line)
                .with_context(|| format!("applying {}", line))?;
        }
        return Ok(settings);
    };

    let mut store = SettingsStore::load_or_restore(&path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    for line in &cli.overrides {
        let applied = if cli.save {
            store.apply_line(line)
        } else {
            SettingsRegistry::apply_line(store.settings_mut(), line)
        };
        applied.with_context(|| format!("applying {}", line))?;
    }
    Ok(store.settings().clone())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_log)?;
    tracing::debug!("rapidchange-sim {} built {}", VERSION, BUILD_DATE);

    let settings = load_settings(&cli)?;
    if cli.list_settings {
        for line in SettingsRegistry::report(&settings) {
            println!("{}", line);
        }
        return Ok(());
    }

    let config = settings
        .validate(&PortMap::new(cli.inputs, cli.outputs))
        .context("invalid ATC settings")?;

    let run = DryRun {
        from: ToolId(cli.from),
        to: ToolId(cli.to),
        start: Position::new(cli.start[0], cli.start[1], cli.start[2]),
        spindle_rpm: cli.rpm,
        sensor_readings: cli
            .sensor
            .as_ref()
            .map(|levels| levels.iter().map(|level| *level != 0).collect()),
        probe_contact: cli.probe_z,
        tlo_reference: cli.tlo_reference,
        ..DryRun::default()
    };

    println!("{}", report_options());
    let report = run.run(config);
    for call in report.calls.iter().filter(|call| !matches!(call, MachineCall::Synchronize)) {
        println!("{}", call);
    }
    for action in &report.operator_actions {
        println!("; operator: {}", action);
    }
    for event in &report.events {
        tracing::debug!("{}", event);
    }
    match &report.result {
        Ok(outcome) => println!("; outcome: {:?}", outcome),
        Err(e) => println!("; failed: {}", e),
    }
    println!("; current tool: {}", report.current_tool);
    println!("; tool length offset: {:.3}", report.tool_length_offset);
    println!("{}", report.status);

    Ok(())
}
