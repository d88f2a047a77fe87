mod app;
mod capture;
mod colors;
mod config;
mod stats;
mod terminal;

use clap::{ArgAction, Parser};
use config::constants::{BLOCK_SIZE, DISPLAY_SAMPLES, SAMPLE_RATE};
use config::VisualizerConfig;
use log::LevelFilter;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "micthing")]
#[command(author = "Terminal Art Generator")]
#[command(version = "0.1.0")]
#[command(about = "Raw microphone visualizer: color-coded samples with rolling peak/RMS", long_about = None)]
struct Cli {
    /// Input device name (default: system default input)
    #[arg(short, long)]
    device: Option<String>,

    /// List available input devices and exit
    #[arg(short, long)]
    list_devices: bool,

    /// Samples shown per line
    #[arg(short = 'n', long = "display", default_value_t = DISPLAY_SAMPLES)]
    display: usize,

    /// Frames requested per audio callback
    #[arg(short, long, default_value_t = BLOCK_SIZE)]
    block_size: usize,

    /// Requested sample rate in Hz
    #[arg(short = 'r', long, default_value_t = SAMPLE_RATE)]
    sample_rate: u32,

    /// Print plain text without color codes
    #[arg(long)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_devices {
        return match capture::list_input_devices() {
            Ok(names) => {
                for name in names {
                    println!("{}", name);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = VisualizerConfig {
        sample_rate: cli.sample_rate,
        block_size: cli.block_size,
        display_samples: cli.display,
        device: cli.device,
        color: !cli.no_color,
    }
    .normalized();

    match app::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("{:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
