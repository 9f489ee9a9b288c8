//! Brake Light Node CLI Application
//!
//! Host-side harness for the brake light node core library:
//! - Replays a recorded candump trace in virtual time and reports every
//!   brake light and buzzer transition (TXT/JSON)
//! - Runs the node live against candump lines arriving on stdin, with the
//!   buzzer countdown on a real timer thread

use anyhow::{bail, Context, Result};
use brake_light_core::formats::{self, CandumpParser};
use brake_light_core::{ChannelSource, NodeConfig, SharedLine, SharedNode, Simulator};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

mod config;
mod report;

use config::{AppConfig, OutputFormat};
use report::ReplayReport;

/// Brake Light Node - replay or run the brake light / buzzer decision core
#[derive(Parser, Debug)]
#[command(name = "brake-light-cli")]
#[command(about = "Drive the brake light node from candump traces", long_about = None)]
#[command(version)]
struct Args {
    /// Path to a candump -L log to replay
    #[arg(short, long, value_name = "FILE", conflicts_with = "live")]
    log: Option<PathBuf>,

    /// Run live against candump lines read from stdin
    #[arg(long)]
    live: bool,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file for the replay report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Buzzer pulse length in milliseconds (1000-3000)
    #[arg(long, value_name = "MS")]
    buzzer_pulse_ms: Option<u64>,

    /// Maximum number of frames to replay
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Brake Light Node CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using core library v{}", brake_light_core::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.node.validate()?;

    if args.live {
        live_mode(&config.node)
    } else if let Some(log_path) = config.input.log.clone() {
        replay_mode(&log_path, &config, args.max_frames)
    } else {
        println!("Brake Light Node - No input specified");
        println!("\nQuick Start:");
        println!("  brake-light-cli --log trace.log");
        println!("  candump -L can0 | brake-light-cli --live");
        println!("\nUse --help for more options");
        Ok(())
    }
}

/// Command-line flags take precedence over the configuration file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(log) = &args.log {
        config.input.log = Some(log.clone());
    }
    if let Some(output) = &args.output {
        config.output.file = Some(output.clone());
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(pulse_ms) = args.buzzer_pulse_ms {
        config.node = config
            .node
            .clone()
            .with_buzzer_pulse(Duration::from_millis(pulse_ms));
    }
}

/// Replay mode - run a recorded trace through the node in virtual time
fn replay_mode(log_path: &Path, config: &AppConfig, max_frames: Option<usize>) -> Result<()> {
    let frames = CandumpParser::open(log_path)
        .with_context(|| format!("Failed to open log file: {:?}", log_path))?;
    let mut sim = Simulator::new(&config.node)?;
    let mut transitions = Vec::new();

    for frame in frames.take(max_frames.unwrap_or(usize::MAX)) {
        let frame = frame.with_context(|| format!("Failed to read {:?}", log_path))?;
        transitions.extend(sim.step(&frame));
    }
    transitions.extend(sim.finish());

    log::info!(
        "Replayed {} frames ({} ignored), {} output transitions",
        sim.frames_seen(),
        sim.frames_ignored(),
        transitions.len()
    );

    let report = ReplayReport {
        source: log_path.display().to_string(),
        frames_seen: sim.frames_seen(),
        frames_ignored: sim.frames_ignored(),
        transitions,
        final_status: sim.status(),
    };

    match &config.output.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            let mut out = BufWriter::new(file);
            report::write_report(
                &mut out,
                &report,
                config.output.format,
                config.output.include_summary,
            )?;
            out.flush()?;
            log::info!("Report written to {:?}", path);
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            report::write_report(
                &mut out,
                &report,
                config.output.format,
                config.output.include_summary,
            )?;
        }
    }

    Ok(())
}

/// Live mode - stdin feeds the bus, the main loop spins on the node
fn live_mode(node_config: &NodeConfig) -> Result<()> {
    let brake_light = SharedLine::new("BrakeLight");
    let buzzer = SharedLine::new("Buzzer");
    let node = SharedNode::start(brake_light.clone(), buzzer.clone(), node_config)?;

    let (tx, rx) = mpsc::channel();
    let reader = thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for (index, line) in stdin.lock().lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::error!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                match formats::parse_line(&line, index + 1) {
                    Ok(Some(frame)) => {
                        if tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("{}", e),
                }
            }
        })
        .context("Failed to spawn stdin reader")?;

    let mut source = ChannelSource::new(rx);
    let mut last = (false, false);

    log::info!("Live mode: reading candump lines from stdin");
    loop {
        node.run_cycle(&mut source);

        let levels = (brake_light.is_high(), buzzer.is_high());
        if levels != last {
            if levels.0 != last.0 {
                print_live_transition(brake_light.name(), levels.0)?;
            }
            if levels.1 != last.1 {
                print_live_transition(buzzer.name(), levels.1)?;
            }
            last = levels;
        }

        if source.is_disconnected() && !buzzer.is_high() {
            break;
        }
        thread::yield_now();
    }

    if reader.join().is_err() {
        bail!("stdin reader panicked");
    }

    let status = node.status();
    log::info!(
        "Input closed: state {} brake light {} buzzer {:?}",
        status.current_state,
        if status.brake_light { "ON" } else { "OFF" },
        status.buzzer
    );
    Ok(())
}

fn print_live_transition(line: &str, high: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(
        out,
        "{} {:<12} {}",
        chrono::Utc::now().format("%H:%M:%S%.3f"),
        line,
        if high { "HIGH" } else { "LOW" }
    )?;
    out.flush()?;
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
