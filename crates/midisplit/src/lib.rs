//! MIDI file batch transforms.
//!
//! The main transform is [`split`]: every track of a file is partitioned into
//! several tracks by channel, polyphonic voice, instrument, velocity or key,
//! keeping each Note-Off with its Note-On. [`sort_events`] and
//! [`convert_volume`] are simpler single-pass companions.

pub mod event;
pub mod smf;
pub mod sort;
pub mod split;
pub mod track;
pub mod volume;
pub mod writer;

pub use event::{Event, Message};
pub use sort::{sort_events, SortOptions};
pub use split::{split, split_with, SplitOptions, SplitStrategy, SplitSummary};
pub use track::{Format, MidiFile, Timing, Track};
pub use volume::{convert_volume, VolumeCurve, VolumeEvents, VolumeOptions};

/// Errors from loading or saving MIDI files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown split strategy: {0}")]
    UnknownStrategy(String),

    #[error("unknown volume curve: {0}")]
    UnknownCurve(String),

    #[error("unknown volume event: {0} (expected vel, vol or exp)")]
    UnknownVolumeEvent(String),
}

pub type Result<T> = std::result::Result<T, Error>;
