//! Subcommand implementations. Each one loads a file, transforms it and
//! writes the result.

use anyhow::{Context, Result};
use midisplit::{MidiFile, SortOptions, SplitOptions, SplitSummary, VolumeOptions};
use std::path::Path;
use tracing::info;

use crate::config::{Config, ConfigSources};

fn load(path: &Path) -> Result<MidiFile> {
    let file = MidiFile::load(path)
        .with_context(|| format!("Failed to read MIDI file {}", path.display()))?;
    info!(
        path = %path.display(),
        tracks = file.track_count(),
        format = ?file.format,
        "loaded"
    );
    Ok(file)
}

fn save(file: &MidiFile, path: &Path) -> Result<()> {
    file.save(path)
        .with_context(|| format!("Failed to write MIDI file {}", path.display()))?;
    info!(path = %path.display(), tracks = file.track_count(), "saved");
    Ok(())
}

pub fn split(input: &Path, output: &Path, options: &SplitOptions) -> Result<SplitSummary> {
    let mut file = load(input)?;
    let summary = midisplit::split_with(&mut file, options);
    save(&file, output)?;

    println!(
        "{}: {} tracks -> {} tracks ({})",
        output.display(),
        summary.tracks_before,
        summary.tracks_after,
        options.strategy
    );
    Ok(summary)
}

pub fn sort(input: &Path, output: &Path, options: &SortOptions) -> Result<usize> {
    let mut file = load(input)?;
    let moved = midisplit::sort_events(&mut file, options);
    save(&file, output)?;

    println!("{}: {} events moved", output.display(), moved);
    Ok(moved)
}

pub fn volconv(input: &Path, output: &Path, options: &VolumeOptions) -> Result<usize> {
    let mut file = load(input)?;
    let converted = midisplit::convert_volume(&mut file, options);
    save(&file, output)?;

    println!(
        "{}: {} events converted ({} -> {}, {:+} dB)",
        output.display(),
        converted,
        options.source,
        options.dest,
        options.gain_db
    );
    Ok(converted)
}

/// Print where the configuration came from and what it resolved to.
pub fn show_config(config: &Config, sources: &ConfigSources) -> Result<()> {
    if sources.files.is_empty() {
        println!("# no config files found");
    }
    for file in &sources.files {
        println!("# file: {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# env: {var}");
    }
    let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
    print!("{rendered}");
    Ok(())
}
