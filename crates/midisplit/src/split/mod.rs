//! Multi-strategy track splitting.
//!
//! Each track of a file is split on its own:
//!
//! 1. [`keys::split_keys`] collects the distinct grouping keys,
//! 2. [`SplitGroup::allocate`] binds each key to a destination track (the
//!    lowest key keeps the original track),
//! 3. [`router::route_events`] moves every event to its destination,
//! 4. [`namer::name_tracks`] names the destinations and closes them,
//!
//! and the new tracks are inserted into the file right after their source.
//! The chord split skips steps 1 and 2 and allocates voices while routing.

pub mod group;
pub mod keys;
pub mod namer;
pub mod registry;
pub mod router;

pub use group::{DestId, Destination, SplitGroup};

use crate::track::{Format, MidiFile, Track};
use rayon::prelude::*;
use router::{route_events, ChannelRouter, ChordRouter, KeyRule, KeyedRouter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Criterion used to partition a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// One track per MIDI channel
    Channel,
    /// One track per simultaneously sounding voice
    Chord,
    /// One track per program (instrument)
    Instrument,
    /// One track per Note-On velocity, loudest first
    Velocity,
    /// One track per note pitch
    Key,
}

impl SplitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Chord => "chord",
            Self::Instrument => "instrument",
            Self::Velocity => "velocity",
            Self::Key => "key",
        }
    }

    /// Human readable suffix for the destination bound to `key`.
    fn describe(&self, key: i32) -> String {
        match self {
            Self::Channel => format!("ch {}", key + 1),
            Self::Instrument => format!("ins {}", key + 1),
            Self::Velocity => format!("vol {}", -key),
            Self::Key => format!("note {key}"),
            Self::Chord => String::new(),
        }
    }
}

impl std::fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SplitStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chn" | "channel" => Ok(Self::Channel),
            "chord" | "note" => Ok(Self::Chord),
            "ins" | "instrument" => Ok(Self::Instrument),
            "vol" | "velocity" => Ok(Self::Velocity),
            "key" => Ok(Self::Key),
            _ => Err(crate::Error::UnknownStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitOptions {
    pub strategy: SplitStrategy,
    /// Split tracks on the rayon pool. Output is identical either way.
    pub parallel: bool,
}

impl SplitOptions {
    pub fn new(strategy: SplitStrategy) -> Self {
        Self {
            strategy,
            parallel: false,
        }
    }
}

/// What a split did to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub tracks_before: usize,
    pub tracks_after: usize,
    /// Destination count per original track, in file order.
    pub destinations: Vec<usize>,
}

/// Split every track of `file` in place.
pub fn split(file: &mut MidiFile, strategy: SplitStrategy) -> SplitSummary {
    split_with(file, &SplitOptions::new(strategy))
}

pub fn split_with(file: &mut MidiFile, options: &SplitOptions) -> SplitSummary {
    let tracks_before = file.track_count();
    let strategy = options.strategy;

    let sources: Vec<Track> = file.tracks.iter_mut().map(std::mem::take).collect();
    let groups: Vec<SplitGroup> = if options.parallel {
        sources
            .into_par_iter()
            .enumerate()
            .map(|(index, track)| split_track(track, index, strategy))
            .collect()
    } else {
        sources
            .into_iter()
            .enumerate()
            .map(|(index, track)| split_track(track, index, strategy))
            .collect()
    };

    // Each original track sits at its old index plus the number of tracks
    // inserted before it.
    let mut destinations = Vec::with_capacity(groups.len());
    let mut insert_at = 0;
    for group in groups {
        destinations.push(group.len());
        let mut tracks = group.into_tracks().into_iter();

        if let Some(source) = tracks.next() {
            match file.track_at_mut(insert_at) {
                Some(slot) => *slot = source,
                None => file.insert_track(insert_at, source),
            }
        }
        insert_at += 1;

        for track in tracks {
            file.insert_track(insert_at, track);
            insert_at += 1;
        }
    }

    // Format 0 allows a single track only.
    if file.format == Format::SingleTrack && file.track_count() > 1 {
        debug!("promoted format 0 file to format 1");
        file.format = Format::Parallel;
    }

    let summary = SplitSummary {
        tracks_before,
        tracks_after: file.track_count(),
        destinations,
    };
    info!(
        %strategy,
        before = summary.tracks_before,
        after = summary.tracks_after,
        "split file"
    );
    summary
}

/// Split one track into a group of destinations, named and closed.
pub fn split_track(source: Track, track_index: usize, strategy: SplitStrategy) -> SplitGroup {
    let mut group = SplitGroup::new(source);

    if strategy == SplitStrategy::Chord {
        route_events(&mut group, &mut ChordRouter);
    } else {
        let keys = keys::split_keys(group.source(), strategy);
        debug!(track = track_index, keys = keys.len(), "enumerated");
        if keys.len() <= 1 {
            return group;
        }

        let lookup = group.allocate(&keys, |dest, key| dest.descriptor = strategy.describe(key));
        debug!(track = track_index, destinations = group.len(), "allocated");

        match KeyRule::for_strategy(strategy) {
            Some(rule) => {
                let mut router = KeyedRouter::new(lookup, rule);
                route_events(&mut group, &mut router);
                let hanging = router.sounding_notes();
                if hanging > 0 {
                    debug!(track = track_index, hanging, "notes without Note-Off");
                }
            }
            None => route_events(&mut group, &mut ChannelRouter::new(lookup)),
        }
    }
    debug!(track = track_index, destinations = group.len(), "routed");

    namer::name_tracks(&mut group, track_index);
    if !group.is_single() {
        info!(track = track_index, destinations = group.len(), "split track");
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::track::Timing;
    use pretty_assertions::assert_eq;

    fn two_channel_track(name: &str) -> Track {
        Track::from_events(vec![
            Event::track_name(0, name),
            Event::note_on(0, 0, 60, 100),
            Event::note_on(0, 1, 40, 100),
            Event::note_off(480, 0, 60),
            Event::note_off(480, 1, 40),
            Event::end_of_track(480),
        ])
    }

    fn track_names(file: &MidiFile) -> Vec<String> {
        file.tracks
            .iter()
            .map(|t| {
                t.events()
                    .iter()
                    .find(|e| e.is_track_name())
                    .map(|e| String::from_utf8_lossy(&e.payload).into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn new_tracks_follow_their_source() {
        let mut file = MidiFile::new(Format::Parallel, Timing::Metrical(480));
        file.tracks.push(Track::from_events(vec![Event::track_name(0, "Conductor")]));
        file.tracks.push(two_channel_track("A"));
        file.tracks.push(two_channel_track("B"));

        let summary = split(&mut file, SplitStrategy::Channel);

        assert_eq!(
            summary,
            SplitSummary {
                tracks_before: 3,
                tracks_after: 5,
                destinations: vec![1, 2, 2],
            }
        );
        assert_eq!(
            track_names(&file),
            vec!["Conductor", "A ch 1", "A ch 2", "B ch 1", "B ch 2"]
        );
    }

    #[test]
    fn parallel_split_matches_serial() {
        let mut serial = MidiFile::new(Format::Parallel, Timing::Metrical(96));
        for name in ["one", "two", "three", "four"] {
            serial.tracks.push(two_channel_track(name));
        }
        let mut parallel = serial.clone();

        split(&mut serial, SplitStrategy::Channel);
        split_with(
            &mut parallel,
            &SplitOptions {
                strategy: SplitStrategy::Channel,
                parallel: true,
            },
        );

        assert_eq!(parallel, serial);
        assert_eq!(serial.track_count(), 8);
    }

    #[test]
    fn format_zero_becomes_format_one_when_split() {
        let mut file = MidiFile::new(Format::SingleTrack, Timing::Metrical(480));
        file.tracks.push(two_channel_track("Song"));
        let mut untouched = MidiFile::new(Format::SingleTrack, Timing::Metrical(480));
        untouched.tracks.push(Track::from_events(vec![
            Event::note_on(0, 0, 60, 100),
            Event::note_off(10, 0, 60),
        ]));

        split(&mut file, SplitStrategy::Channel);
        split(&mut untouched, SplitStrategy::Channel);

        assert_eq!(file.format, Format::Parallel);
        assert_eq!(untouched.format, Format::SingleTrack);
    }

    #[test]
    fn strategy_names_parse_case_insensitively() {
        assert_eq!("Note".parse::<SplitStrategy>().unwrap(), SplitStrategy::Chord);
        assert_eq!("INS".parse::<SplitStrategy>().unwrap(), SplitStrategy::Instrument);
        assert_eq!("vol".parse::<SplitStrategy>().unwrap(), SplitStrategy::Velocity);
        assert_eq!("chn".parse::<SplitStrategy>().unwrap(), SplitStrategy::Channel);
        assert_eq!("key".parse::<SplitStrategy>().unwrap(), SplitStrategy::Key);
        assert!("pan".parse::<SplitStrategy>().is_err());
    }

    #[test]
    fn descriptors() {
        assert_eq!(SplitStrategy::Channel.describe(3), "ch 4");
        assert_eq!(SplitStrategy::Instrument.describe(0), "ins 1");
        assert_eq!(SplitStrategy::Velocity.describe(-100), "vol 100");
        assert_eq!(SplitStrategy::Key.describe(60), "note 60");
    }
}
