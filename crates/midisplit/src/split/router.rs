use super::group::{DestId, SplitGroup};
use super::keys::InstrumentCursor;
use super::registry::{claim_voice, release_voice, NoteRegistry};
use super::SplitStrategy;
use crate::event::{Event, Message, META_CHANNEL_PREFIX};
use std::collections::BTreeMap;

/// Decides where one event of the source track goes.
///
/// `None` keeps the event on the source track.
pub trait Route {
    fn destination(&mut self, event: &Event, group: &mut SplitGroup) -> Option<DestId>;
}

/// Distribute the source track's events over the group's destinations.
///
/// The source's events are taken out and revisited in their original order;
/// each one is appended to the destination chosen for it, the source
/// included. Every destination therefore stays tick-sorted and equal-tick
/// events keep their relative order.
pub fn route_events<R: Route>(group: &mut SplitGroup, router: &mut R) {
    let events = group.destination_mut(DestId::SOURCE).track.take_events();

    for event in events {
        let dest = router
            .destination(&event, group)
            .unwrap_or(DestId::SOURCE);
        group.destination_mut(dest).track.append(event);
    }
}

/// Channel events go to their channel's destination.
pub struct ChannelRouter {
    lookup: BTreeMap<i32, DestId>,
}

impl ChannelRouter {
    pub fn new(lookup: BTreeMap<i32, DestId>) -> Self {
        Self { lookup }
    }
}

impl Route for ChannelRouter {
    fn destination(&mut self, event: &Event, _group: &mut SplitGroup) -> Option<DestId> {
        let channel = match event.message() {
            Message::Meta { kind, data } if kind == META_CHANNEL_PREFIX => *data.first()?,
            Message::Meta { .. } | Message::SysEx(_) => return None,
            _ => event.channel()?,
        };
        self.lookup.get(&(channel as i32)).copied()
    }
}

/// How the keyed splits derive a key from an event.
#[derive(Debug, Clone, Copy)]
pub enum KeyRule {
    Instrument(InstrumentCursor),
    Velocity,
    Key,
}

impl KeyRule {
    pub fn instrument() -> Self {
        Self::Instrument(InstrumentCursor::default())
    }

    /// Rule for the keyed strategies; `None` for channel and chord.
    pub fn for_strategy(strategy: SplitStrategy) -> Option<Self> {
        match strategy {
            SplitStrategy::Instrument => Some(Self::instrument()),
            SplitStrategy::Velocity => Some(Self::Velocity),
            SplitStrategy::Key => Some(Self::Key),
            SplitStrategy::Channel | SplitStrategy::Chord => None,
        }
    }

    fn note_key(&mut self, channel: u8, key: u8, vel: u8) -> i32 {
        match self {
            Self::Instrument(cursor) => cursor.note_on(channel) as i32,
            Self::Velocity => -(vel as i32),
            Self::Key => key as i32,
        }
    }

    /// Key for channel events other than notes, pitch bends and key pressure.
    fn event_key(&mut self, message: Message) -> Option<i32> {
        let Self::Instrument(cursor) = self else {
            return None;
        };
        match message {
            Message::ProgramChange { channel, program } => {
                Some(cursor.program_change(channel, program) as i32)
            }
            Message::Controller { channel, .. } | Message::ChannelPressure { channel, .. } => {
                cursor.current(channel).map(i32::from)
            }
            _ => None,
        }
    }
}

/// Instrument, velocity and key splits.
///
/// Note-Ons go to their key's destination and are recorded in a
/// [`NoteRegistry`]; the matching Note-Off follows them there. Pitch bends
/// follow the channel's most recent Note-On.
pub struct KeyedRouter {
    lookup: BTreeMap<i32, DestId>,
    rule: KeyRule,
    registry: NoteRegistry,
}

impl KeyedRouter {
    pub fn new(lookup: BTreeMap<i32, DestId>, rule: KeyRule) -> Self {
        Self {
            lookup,
            rule,
            registry: NoteRegistry::new(),
        }
    }

    fn lookup(&self, key: i32) -> DestId {
        self.lookup.get(&key).copied().unwrap_or(DestId::SOURCE)
    }

    /// Notes routed so far whose Note-Off has not been seen.
    pub fn sounding_notes(&self) -> usize {
        self.registry.active_count()
    }
}

impl Route for KeyedRouter {
    fn destination(&mut self, event: &Event, _group: &mut SplitGroup) -> Option<DestId> {
        match event.message() {
            Message::NoteOn { channel, key, vel } => {
                let note_key = self.rule.note_key(channel, key, vel);
                let dest = self.lookup(note_key);
                self.registry.add_note(key, channel, event.tick, dest);
                Some(dest)
            }
            Message::NoteOff { channel, key, .. } => self.registry.remove_note(key, channel),
            Message::PitchBend { channel, .. } => Some(self.registry.channel_destination(channel)),
            Message::KeyPressure { channel, key, .. } => self.registry.peek_note(key, channel),
            Message::Meta { .. } | Message::SysEx(_) => None,
            message => self.rule.event_key(message).map(|key| self.lookup(key)),
        }
    }
}

/// Chord split: notes are packed into monophonic voices, one per
/// destination, allocated on demand. Everything else stays on the source.
#[derive(Debug, Default)]
pub struct ChordRouter;

impl Route for ChordRouter {
    fn destination(&mut self, event: &Event, group: &mut SplitGroup) -> Option<DestId> {
        match event.message() {
            Message::NoteOn { channel, key, .. } => {
                Some(claim_voice(group, channel, key, event.tick))
            }
            Message::NoteOff { channel, key, .. } => release_voice(group, channel, key),
            _ => None,
        }
    }
}
