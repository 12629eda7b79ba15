//! midisplit - batch transforms for Standard MIDI Files
//!
//! Subcommands:
//! - `midisplit split <method> <in> <out>` - Split tracks by channel, chord, instrument,
//!   velocity or key
//! - `midisplit sort <in> <out>` - Canonical ordering of same-tick events
//! - `midisplit volconv <in> <out>` - Convert velocities and volume between loudness curves
//! - `midisplit config` - Show the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use midisplit::{
    SortOptions, SplitOptions, SplitStrategy, VolumeCurve, VolumeEvents, VolumeOptions,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "midisplit")]
#[command(about = "Split, sort and rescale Standard MIDI Files")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./midisplit.toml)
    #[arg(long, global = true, env = "MIDISPLIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "midisplit=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split every track into several tracks
    Split {
        /// chn|channel, chord|note, ins|instrument, vol|velocity or key
        method: SplitStrategy,

        /// Input MIDI file
        input: PathBuf,

        /// Output MIDI file
        output: PathBuf,

        /// Split tracks in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Sort events that share a tick into canonical order
    Sort {
        /// Input MIDI file
        input: PathBuf,

        /// Output MIDI file
        output: PathBuf,

        /// Order notes by pitch
        #[arg(long)]
        notes: bool,

        /// Order controllers by number
        #[arg(long)]
        controllers: bool,

        /// Sort mask: 0x01 notes, 0x02 controllers
        #[arg(short = 'e', long, value_parser = parse_mask)]
        mask: Option<u8>,
    },

    /// Convert note velocities and volume controllers between curves
    Volconv {
        /// Input MIDI file
        input: PathBuf,

        /// Output MIDI file
        output: PathBuf,

        /// Source curve: GM, Lin, FM, PSG2, PSG3 or WinFM
        #[arg(short, long)]
        source: Option<VolumeCurve>,

        /// Destination curve
        #[arg(short, long)]
        dest: Option<VolumeCurve>,

        /// Gain in dB
        #[arg(short, long, allow_negative_numbers = true)]
        gain: Option<f64>,

        /// Events to convert: vel, vol, exp (comma separated)
        #[arg(short, long)]
        events: Option<VolumeEvents>,

        /// Channel mask, bit n = channel n
        #[arg(short, long, value_parser = parse_channel_mask)]
        channels: Option<u16>,
    },

    /// Show the effective configuration and where it came from
    Config,
}

fn parse_int(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid number {value:?}: {e}"))
}

fn parse_mask(value: &str) -> Result<u8, String> {
    u8::try_from(parse_int(value)?).map_err(|_| format!("mask out of range: {value}"))
}

fn parse_channel_mask(value: &str) -> Result<u16, String> {
    u16::try_from(parse_int(value)?).map_err(|_| format!("channel mask out of range: {value}"))
}

fn init_logging(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .with_context(|| format!("Invalid log filter {filter:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = Config::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.telemetry.log_level);
    init_logging(log_level)?;

    tracing::debug!(
        files = ?sources.files,
        env = ?sources.env_overrides,
        "configuration loaded"
    );

    match cli.command {
        Commands::Split {
            method,
            input,
            output,
            parallel,
        } => {
            let options = SplitOptions {
                strategy: method,
                parallel: parallel || config.split.parallel,
            };
            commands::split(&input, &output, &options)?;
        }
        Commands::Sort {
            input,
            output,
            notes,
            controllers,
            mask,
        } => {
            let mut options = mask.map(SortOptions::from_mask).unwrap_or(SortOptions {
                notes_by_pitch: config.sort.notes,
                controllers_by_number: config.sort.controllers,
            });
            options.notes_by_pitch |= notes;
            options.controllers_by_number |= controllers;
            commands::sort(&input, &output, &options)?;
        }
        Commands::Volconv {
            input,
            output,
            source,
            dest,
            gain,
            events,
            channels,
        } => {
            let defaults = VolumeOptions::default();
            let options = VolumeOptions {
                source: source.unwrap_or(config.volume.source),
                dest: dest.unwrap_or(config.volume.dest),
                gain_db: gain.unwrap_or(config.volume.gain_db),
                events: events.unwrap_or(defaults.events),
                channels: channels.unwrap_or(defaults.channels),
            };
            commands::volconv(&input, &output, &options)?;
        }
        Commands::Config => {
            commands::show_config(&config, &sources)?;
        }
    }

    Ok(())
}
