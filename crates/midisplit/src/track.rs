use crate::event::Event;
use serde::{Deserialize, Serialize};

/// Ordered event store for one MIDI track.
///
/// Events are kept in non-decreasing tick order. Positional edits never
/// reorder the events they don't touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    events: Vec<Event>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn append(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Remove and return the event at `index`; `None` when out of range.
    pub fn remove_at(&mut self, index: usize) -> Option<Event> {
        (index < self.events.len()).then(|| self.events.remove(index))
    }

    pub fn insert_before(&mut self, index: usize, event: Event) {
        self.events.insert(index, event);
    }

    /// Tick of the last event, 0 for an empty track.
    pub fn last_tick(&self) -> u32 {
        self.events.last().map(|e| e.tick).unwrap_or(0)
    }

    /// Move every event out, leaving the track empty.
    pub(crate) fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&Event) -> bool) {
        self.events.retain(keep);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    SingleTrack,
    Parallel,
    Sequential,
}

impl Format {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::SingleTrack => 0,
            Self::Parallel => 1,
            Self::Sequential => 2,
        }
    }
}

/// Header time division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    /// Ticks per quarter note.
    Metrical(u16),
    /// Frames per second (24, 25, 29 or 30) and ticks per frame.
    Timecode(u8, u8),
}

/// An in-memory Standard MIDI File.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiFile {
    pub format: Format,
    pub timing: Timing,
    pub tracks: Vec<Track>,
}

impl MidiFile {
    pub fn new(format: Format, timing: Timing) -> Self {
        Self {
            format,
            timing,
            tracks: Vec::new(),
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_at_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Insert `track` at `index`, shifting later tracks back.
    /// Indices past the end append.
    pub fn insert_track(&mut self, index: usize, track: Track) {
        let index = index.min(self.tracks.len());
        self.tracks.insert(index, track);
    }
}
