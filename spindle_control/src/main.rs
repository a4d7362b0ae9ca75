//! # Spindle Control
//!
//! Command-line front end of the spindle output subsystem.
//!
//! - `check` loads the unit file, builds every tool and prints its status
//!   and calibration segments.
//! - `run` executes one spindle command through the tool selector with
//!   real ramp delays and prints the ramp plan and the resulting status.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use spindle_common::config::LogLevel;
use spindle_common::consts::DEFAULT_CONFIG_PATH;
use spindle_common::spindle::config::SpindleUnitConfig;
use spindle_common::spindle::state::SpindleState;
use spindle_control::calibration::Segment;
use spindle_control::config::load_config;
use spindle_control::governor::{BlockingDelay, RampPlan};
use spindle_control::rt::rt_setup;
use spindle_control::status::ToolStatus;
use spindle_control::{RealtimeState, ToolRegistry};
use spindle_hal::{DriverRegistry, OutputChannelAllocator};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Spindle Control: calibration mapping, ramp timing and tool selection
#[derive(Parser, Debug)]
#[command(name = "spindle_control")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Spindle output control: calibration mapping, ramp governor, tool selection")]
struct Args {
    /// Path to the spindle unit TOML.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Apply RT scheduling (mlockall, affinity, SCHED_FIFO) before running.
    #[arg(long)]
    rt: bool,

    /// CPU core to pin the command thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level, overrides `shared.log_level`).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and reports in JSON format.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and show every tool.
    Check,
    /// Execute one spindle command.
    Run {
        /// Requested tool number (T-word).
        #[arg(long, default_value_t = 0)]
        tool: u32,

        /// Target state: off, cw or ccw (M5 / M3 / M4).
        #[arg(long)]
        state: SpindleState,

        /// Requested speed (S-word).
        #[arg(long, default_value_t = 0)]
        speed: u32,

        /// Spindle speed override [%], clamped to 10..=200.
        #[arg(long = "override")]
        override_percent: Option<u32>,
    },
}

#[derive(Serialize)]
struct ToolReport<'a> {
    #[serde(flatten)]
    status: ToolStatus,
    segments: &'a [Segment],
}

#[derive(Serialize)]
struct RunReport {
    ramp_down: u32,
    ramp_up: u32,
    down_delay_ms: u64,
    up_delay_ms: u64,
    report_speed: u32,
    rate_adjusted: bool,
    status: Vec<ToolStatus>,
}

fn main() {
    let args = Args::parse();
    // Loaded before the subscriber exists so its log level applies.
    let config = load_config(&args.config);
    let log_level = config
        .as_ref()
        .map_or(LogLevel::default(), |c| c.shared.log_level);
    setup_tracing(&args, log_level);

    info!("Spindle Control v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(Box::<dyn std::error::Error>::from)
        .and_then(|config| run(&args, &config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn run(args: &Args, config: &SpindleUnitConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.tools.is_empty() {
        warn!("configuration defines no spindles");
    }
    info!(
        "Config OK: {} tools, clock {} Hz",
        config.tools.len(),
        config.output.clock_hz
    );

    let mut registry = build_registry(config)?;

    match &args.command {
        Command::Check => print_check(&registry, args.json)?,
        Command::Run {
            tool,
            state,
            speed,
            override_percent,
        } => {
            if args.rt {
                rt_setup(args.cpu_core, args.rt_priority)?;
                info!(
                    "RT setup complete (cpu_core={}, priority={})",
                    args.cpu_core, args.rt_priority
                );
            }
            if let Some(percent) = override_percent {
                registry.realtime().set_spindle_override(*percent);
            }
            let ramp = registry.set_state(*tool, *state, *speed)?;
            print_run(&registry, &ramp, args.json)?;
        }
    }
    Ok(())
}

fn build_registry(
    config: &SpindleUnitConfig,
) -> Result<ToolRegistry<BlockingDelay>, Box<dyn std::error::Error>> {
    let drivers = DriverRegistry::with_builtin();
    let pool = OutputChannelAllocator::new(
        config.output.channel_count,
        config.output.reserved_channels,
    );
    let realtime = Arc::new(RealtimeState::new());
    let registry = ToolRegistry::from_config(config, &drivers, &pool, BlockingDelay, realtime)?;
    Ok(registry)
}

fn print_check(
    registry: &ToolRegistry<BlockingDelay>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let reports: Vec<ToolReport<'_>> = registry
        .tools()
        .iter()
        .map(|tool| ToolReport {
            status: tool.status(false),
            segments: tool.table().map_or(&[][..], |t| t.segments()),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        let s = &report.status;
        println!(
            "{:<12} T{:<4} {:?} ch={} bits={} max={} faults=[{}]",
            s.name,
            s.tool_num,
            s.kind,
            s.channel.map_or_else(|| "-".to_string(), |c| c.to_string()),
            s.precision_bits,
            s.max_raw_output,
            s.faults.join(",")
        );
        for seg in report.segments {
            println!(
                "    from {:>8}  offset {:>6}  slope {:>10}",
                seg.threshold, seg.offset, seg.slope
            );
        }
    }
    Ok(())
}

fn print_run(
    registry: &ToolRegistry<BlockingDelay>,
    ramp: &RampPlan,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = RunReport {
        ramp_down: ramp.down,
        ramp_up: ramp.up,
        down_delay_ms: ramp.down_delay.as_millis() as u64,
        up_delay_ms: ramp.up_delay.as_millis() as u64,
        report_speed: registry.current_report_speed(),
        rate_adjusted: registry.is_rate_adjusted(),
        status: registry.statuses(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "ramp: down {} codes / {} ms, up {} codes / {} ms",
        report.ramp_down, report.down_delay_ms, report.ramp_up, report.up_delay_ms
    );
    println!(
        "speed: {} (rate adjusted: {})",
        report.report_speed, report.rate_adjusted
    );
    for s in &report.status {
        let marker = if s.active { "*" } else { " " };
        println!(
            "{marker} {:<12} {:<4} raw={:<6} report={}",
            s.name,
            s.state.as_str(),
            s.raw_speed,
            s.report_speed
        );
    }
    Ok(())
}

/// Filter directive: `--verbose` wins over the configured level.
fn filter_directive(verbose: bool, configured: LogLevel) -> &'static str {
    if verbose {
        LogLevel::Debug.as_str()
    } else {
        configured.as_str()
    }
}

/// Setup tracing subscriber based on CLI arguments and `shared.log_level`.
///
/// `RUST_LOG` replaces both when set.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(args.verbose, configured)));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
