//! Note-On/Note-Off pairing.
//!
//! Two schemes are used depending on the split strategy:
//!
//! - [`NoteRegistry`] remembers where each sounding note was routed, so the
//!   keyed splits (instrument, velocity, key) can send the Note-Off after it.
//! - [`claim_voice`] / [`release_voice`] pack notes into monophonic voice
//!   slots per destination for the chord split, creating destinations on
//!   demand.

use super::group::{DestId, SplitGroup};
use std::collections::{HashMap, VecDeque};

/// A note that has been routed but not yet released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveNote {
    pub pitch: u8,
    pub channel: u8,
    pub start_tick: u32,
    pub destination: DestId,
}

#[derive(Debug, Default)]
pub struct NoteRegistry {
    notes: HashMap<(u8, u8), VecDeque<ActiveNote>>,
    channel_destination: [Option<DestId>; 16],
}

impl NoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_note(&mut self, pitch: u8, channel: u8, start_tick: u32, destination: DestId) {
        self.notes
            .entry((channel & 0x0F, pitch))
            .or_default()
            .push_back(ActiveNote {
                pitch,
                channel: channel & 0x0F,
                start_tick,
                destination,
            });
        self.channel_destination[(channel & 0x0F) as usize] = Some(destination);
    }

    /// Release the earliest-started sounding note with this pitch and channel.
    pub fn remove_note(&mut self, pitch: u8, channel: u8) -> Option<DestId> {
        let queue = self.notes.get_mut(&(channel & 0x0F, pitch))?;
        let (index, _) = queue
            .iter()
            .enumerate()
            .min_by_key(|(_, note)| note.start_tick)?;
        let note = queue.remove(index)?;
        if queue.is_empty() {
            self.notes.remove(&(channel & 0x0F, pitch));
        }
        Some(note.destination)
    }

    /// Destination of the earliest-started sounding note, without releasing it.
    pub fn peek_note(&self, pitch: u8, channel: u8) -> Option<DestId> {
        self.notes
            .get(&(channel & 0x0F, pitch))?
            .iter()
            .min_by_key(|note| note.start_tick)
            .map(|note| note.destination)
    }

    /// Where the channel's most recent Note-On went; the source if none yet.
    pub fn channel_destination(&self, channel: u8) -> DestId {
        self.channel_destination[(channel & 0x0F) as usize].unwrap_or(DestId::SOURCE)
    }

    pub fn active_count(&self) -> usize {
        self.notes.values().map(VecDeque::len).sum()
    }
}

/// Pitch occupying one channel of a voice destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSlot {
    pub pitch: u8,
    pub start_tick: u32,
}

/// Place a Note-On in the first destination whose slot for `channel` is free,
/// allocating a new destination when every slot is taken.
pub fn claim_voice(group: &mut SplitGroup, channel: u8, pitch: u8, tick: u32) -> DestId {
    let ch = (channel & 0x0F) as usize;
    let free = group
        .destinations()
        .iter()
        .position(|dest| dest.note_playing[ch].is_none());

    let id = match free {
        Some(index) => DestId(index),
        None => group.push_destination(),
    };
    group.destination_mut(id).note_playing[ch] = Some(VoiceSlot {
        pitch,
        start_tick: tick,
    });
    id
}

/// Free the slot holding `pitch` on `channel`, earliest-started first.
///
/// Returns `None` when no destination is playing that pitch.
pub fn release_voice(group: &mut SplitGroup, channel: u8, pitch: u8) -> Option<DestId> {
    let ch = (channel & 0x0F) as usize;
    let (index, _) = group
        .destinations()
        .iter()
        .enumerate()
        .filter_map(|(index, dest)| match dest.note_playing[ch] {
            Some(slot) if slot.pitch == pitch => Some((index, slot.start_tick)),
            _ => None,
        })
        .min_by_key(|&(_, start_tick)| start_tick)?;

    let id = DestId(index);
    group.destination_mut(id).note_playing[ch] = None;
    Some(id)
}
