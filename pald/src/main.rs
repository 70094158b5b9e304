//! # Platform Host Daemon
//!
//! Main entry point: runs the palette demo on a simulated host.

use pal::PalConfig;
use pald::{DaemonConfig, DaemonRuntime, StderrLogger};
use std::env;
use std::fs;
use std::process;

/// Steps to run when no script bounds the session
const DEFAULT_STEPS: usize = 60;

struct Args {
    config: DaemonConfig,
    verbose: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("pald");

    let Args { config, verbose } = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(program);
        process::exit(1);
    });

    let level = if verbose {
        Ok(log::LevelFilter::Debug)
    } else {
        StderrLogger::parse_level(&config.pal.log_level)
    };
    let installed = level.and_then(|level| StderrLogger::new(level).install());
    if let Err(e) = installed {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let mut runtime = DaemonRuntime::new(config).unwrap_or_else(|e| {
        log::error!("failed to start: {}", e);
        process::exit(1);
    });

    match runtime.run() {
        Ok(stats) => match serde_json::to_string(&stats) {
            Ok(json) => println!("{}", json),
            Err(e) => log::warn!("could not encode stats: {}", e),
        },
        Err(e) => {
            log::error!("runtime error: {}", e);
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut config = DaemonConfig::default();
    let mut verbose = false;
    let mut max_steps = None;
    let mut i = 1;

    let value = |i: usize, flag: &str| -> Result<&String, String> {
        args.get(i).ok_or_else(|| format!("Missing value for {}", flag))
    };

    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                let path = value(i, "--config")?;
                config.pal = PalConfig::load(path)
                    .map_err(|e| format!("Failed to load config {}: {}", path, e))?;
            }
            "--script" | "-s" => {
                i += 1;
                let path = value(i, "--script")?;
                let text = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read script file: {}", e))?;
                config.script = Some(text);
            }
            "--max-steps" => {
                i += 1;
                let raw = value(i, "--max-steps")?;
                max_steps = Some(
                    raw.parse()
                        .map_err(|_| format!("Invalid max-steps value: {}", raw))?,
                );
            }
            "--single-buffer" => config.double_buffer = false,
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => return Err(format!("Unknown option: {}", other)),
        }
        i += 1;
    }

    if config.script.is_none() {
        config.exit_on_idle = false;
        config.max_steps = max_steps.unwrap_or(DEFAULT_STEPS);
    } else {
        config.max_steps = max_steps.unwrap_or(0);
    }
    Ok(Args { config, verbose })
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>      Platform configuration (JSON)");
    eprintln!("  -s, --script <FILE>      Host event script to replay");
    eprintln!("  --max-steps <N>          Maximum steps to run (0 = unlimited)");
    eprintln!("  --single-buffer          Present from a single buffer");
    eprintln!("  -v, --verbose            Log at debug level");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --script demos/palette.hostscript", program);
    eprintln!("  {} --config pal.json --max-steps 120 -v", program);
}
