use super::SplitStrategy;
use crate::event::{Message, META_CHANNEL_PREFIX};
use crate::track::Track;
use std::collections::BTreeSet;

/// Per-channel "current instrument", as a player would track it.
///
/// A channel starts unset. A Program-Change sets it; a Note-On on an unset
/// channel implies the GM default program 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentCursor {
    current: [Option<u8>; 16],
}

impl InstrumentCursor {
    pub fn current(&self, channel: u8) -> Option<u8> {
        self.current[(channel & 0x0F) as usize]
    }

    pub fn note_on(&mut self, channel: u8) -> u8 {
        *self.current[(channel & 0x0F) as usize].get_or_insert(0)
    }

    pub fn program_change(&mut self, channel: u8, program: u8) -> u8 {
        self.current[(channel & 0x0F) as usize] = Some(program);
        program
    }
}

/// Collect the distinct grouping keys of `track` for `strategy`.
///
/// The chord split allocates lazily and always yields an empty set.
pub fn split_keys(track: &Track, strategy: SplitStrategy) -> BTreeSet<i32> {
    let mut keys = BTreeSet::new();
    let mut instruments = InstrumentCursor::default();

    for event in track.events() {
        let key = match (strategy, event.message()) {
            (SplitStrategy::Channel, Message::Meta { kind, data }) => {
                if kind == META_CHANNEL_PREFIX {
                    data.first().map(|&ch| ch as i32)
                } else {
                    None
                }
            }
            (SplitStrategy::Channel, Message::SysEx(_)) => None,
            (SplitStrategy::Channel, _) => event.channel().map(i32::from),

            (SplitStrategy::Instrument, Message::NoteOn { channel, .. }) => {
                match instruments.current(channel) {
                    Some(_) => None,
                    None => Some(instruments.note_on(channel) as i32),
                }
            }
            (SplitStrategy::Instrument, Message::ProgramChange { channel, program }) => {
                Some(instruments.program_change(channel, program) as i32)
            }

            (SplitStrategy::Velocity, Message::NoteOn { vel, .. }) => Some(-(vel as i32)),
            (SplitStrategy::Key, Message::NoteOn { key, .. }) => Some(key as i32),

            _ => None,
        };

        if let Some(key) = key {
            keys.insert(key);
        }
    }

    keys
}
