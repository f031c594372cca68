use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tk_core::{parse_word, SweepStats, Word};
use tk_engine::{ChannelAddr, EngineError, Registry, Scheduler, SimulatedField};
use tracing::info;

#[derive(Parser)]
#[command(name = "tk-cli")]
#[command(about = "tickflow CLI - fixed-tick block dataflow runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a plant file and wire its blocks
    Validate {
        /// Path to the plant YAML file
        plant_path: PathBuf,
    },
    /// List block types and the keys they accept
    Blocks,
    /// Run a plant against a simulated field
    Run {
        /// Path to the plant YAML file
        plant_path: PathBuf,
        /// Stop after this many ticks (default: run until killed)
        #[arg(long)]
        ticks: Option<u64>,
        /// Print the final register snapshot as JSON
        #[arg(long)]
        json: bool,
        /// Sweep back to back instead of waiting for each tick
        #[arg(long)]
        fast: bool,
        /// Simulated analog input, `module/channel=value` (repeatable)
        #[arg(long = "analog", value_name = "M/C=V")]
        analog: Vec<String>,
        /// Simulated digital input, `module/channel=0|1` (repeatable)
        #[arg(long = "digital", value_name = "M/C=V")]
        digital: Vec<String>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] tk_config::ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field point '{0}', expected module/channel=value")]
    FieldPoint(String),
}

type CliResult<T> = Result<T, CliError>;

fn main() -> CliResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { plant_path } => cmd_validate(&plant_path),
        Commands::Blocks => cmd_blocks(),
        Commands::Run {
            plant_path,
            ticks,
            json,
            fast,
            analog,
            digital,
        } => {
            let mut field = SimulatedField::new();
            for point in &analog {
                let (addr, value) = parse_point(point)?;
                field.set_analog_input(addr, value);
            }
            for point in &digital {
                let (addr, value) = parse_point(point)?;
                field.set_digital_input(addr, value != 0);
            }
            cmd_run(&plant_path, ticks, json, fast, field)
        }
    }
}

fn cmd_validate(plant_path: &Path) -> CliResult<()> {
    println!("Validating plant: {}", plant_path.display());
    let plant = tk_config::load_yaml(plant_path)?;
    let registry = tk_blocks::builtin_registry()?;
    let program = plant.build(&registry)?;
    println!(
        "✓ Plant '{}' is valid ({} blocks, {} registers)",
        plant.name,
        program.blocks().len(),
        program.register_count()
    );
    Ok(())
}

fn cmd_blocks() -> CliResult<()> {
    let registry = tk_blocks::builtin_registry()?;
    print_blocks(&registry);
    Ok(())
}

fn print_blocks(registry: &Registry) {
    let keys = |slots: &[Option<&'static str>]| {
        slots
            .iter()
            .map(|k| k.unwrap_or("*"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    for ty in registry.iter() {
        println!("{}", ty.name());
        if !ty.outputs().is_empty() {
            println!("  outputs:   {}", ty.outputs().join(", "));
        }
        if !ty.inputs().is_empty() {
            println!("  inputs:    {}", keys(ty.inputs()));
        }
        if !ty.setpoints().is_empty() {
            println!("  setpoints: {}", keys(ty.setpoints()));
        }
        if !ty.strings().is_empty() {
            println!("  strings:   {}", keys(ty.strings()));
        }
    }
}

#[derive(Serialize)]
struct RegisterValue {
    name: String,
    value: Word,
}

#[derive(Serialize)]
struct Report<'a> {
    plant: &'a str,
    ticks: u64,
    registers: Vec<RegisterValue>,
    digital_outputs: Vec<(String, bool)>,
    analog_outputs: Vec<(String, Word)>,
    stats: &'a SweepStats,
}

fn cmd_run(
    plant_path: &Path,
    ticks: Option<u64>,
    json: bool,
    fast: bool,
    field: SimulatedField,
) -> CliResult<()> {
    let plant = tk_config::load_yaml(plant_path)?;
    let registry = tk_blocks::builtin_registry()?;
    let program = plant.build(&registry)?;
    let mut scheduler = Scheduler::new(program, plant.scheduler_config(), field)?;

    if fast {
        let n = ticks.unwrap_or(1);
        info!(ticks = n, "sweeping without waiting");
        for _ in 0..n {
            scheduler.step();
        }
    } else {
        // no signal handler: without --ticks the loop runs until the process is killed
        let stop = AtomicBool::new(false);
        scheduler.run_for(ticks, &stop);
    }

    let report = Report {
        plant: &plant.name,
        ticks: scheduler.ticks(),
        registers: scheduler
            .program()
            .snapshot()
            .into_iter()
            .map(|(name, value)| RegisterValue { name, value })
            .collect(),
        digital_outputs: label(scheduler.field().digital_outputs()),
        analog_outputs: label(scheduler.field().analog_outputs()),
        stats: scheduler.stats(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn label<T>(points: Vec<(ChannelAddr, T)>) -> Vec<(String, T)> {
    points
        .into_iter()
        .map(|(addr, v)| (addr.to_string(), v))
        .collect()
}

fn print_report(report: &Report<'_>) {
    println!("Plant '{}' after {} ticks", report.plant, report.ticks);
    let width = report
        .registers
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0);
    for r in &report.registers {
        println!("  {:width$}  {}", r.name, r.value);
    }
    for (addr, on) in &report.digital_outputs {
        println!("  DO {addr} = {}", u8::from(*on));
    }
    for (addr, value) in &report.analog_outputs {
        println!("  AO {addr} = {value}");
    }
    if report.stats.sweeps > 0 {
        println!(
            "  sweeps: {}, avg {:?}, longest {:?}, overruns {}",
            report.stats.sweeps,
            report.stats.average(),
            report.stats.longest,
            report.stats.overruns
        );
    }
}

/// Parse `module/channel=value`.
fn parse_point(text: &str) -> CliResult<(ChannelAddr, Word)> {
    let bad = || CliError::FieldPoint(text.to_string());
    let (addr, value) = text.split_once('=').ok_or_else(bad)?;
    let (module, channel) = addr.split_once('/').ok_or_else(bad)?;
    let module = module.trim().parse().map_err(|_| bad())?;
    let channel = channel.trim().parse().map_err(|_| bad())?;
    let value = parse_word(value).ok_or_else(bad)?;
    Ok((ChannelAddr::new(module, channel), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_points() {
        assert_eq!(
            parse_point("2/7=-15").unwrap(),
            (ChannelAddr::new(2, 7), -15)
        );
        assert!(parse_point("2/7").is_err());
        assert!(parse_point("2=1").is_err());
        assert!(parse_point("70000/1=1").is_err());
        assert!(parse_point("1/1=x").is_err());
    }
}
