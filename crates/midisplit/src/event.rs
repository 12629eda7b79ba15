use serde::{Deserialize, Serialize};

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const KEY_PRESSURE: u8 = 0xA0;
pub const CONTROLLER: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;
pub const SYSEX: u8 = 0xF0;
pub const ESCAPE: u8 = 0xF7;
pub const META: u8 = 0xFF;

pub const META_TRACK_NAME: u8 = 0x03;
pub const META_CHANNEL_PREFIX: u8 = 0x20;
pub const META_END_OF_TRACK: u8 = 0x2F;

/// A single track event with an absolute tick.
///
/// Channel events keep kind and channel in `status` (`0x90 | channel`), their
/// two data bytes in `data_a`/`data_b` and an empty payload. Meta events use
/// status `0xFF` with the meta type in `data_a`; sysex and escape events use
/// `0xF0`/`0xF7`. For both, `payload` holds the raw bytes after the length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub tick: u32,
    pub status: u8,
    pub data_a: u8,
    pub data_b: u8,
    pub payload: Vec<u8>,
}

/// Typed view over an [`Event`].
///
/// A Note-On with velocity 0 is reported as [`Message::NoteOff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    NoteOff { channel: u8, key: u8, vel: u8 },
    NoteOn { channel: u8, key: u8, vel: u8 },
    KeyPressure { channel: u8, key: u8, pressure: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    PitchBend { channel: u8, bend: u16 },
    SysEx(&'a [u8]),
    Meta { kind: u8, data: &'a [u8] },
}

impl Event {
    pub fn channel_event(tick: u32, status: u8, data_a: u8, data_b: u8) -> Self {
        Self {
            tick,
            status,
            data_a,
            data_b,
            payload: Vec::new(),
        }
    }

    pub fn note_on(tick: u32, channel: u8, key: u8, vel: u8) -> Self {
        Self::channel_event(tick, NOTE_ON | (channel & 0x0F), key, vel)
    }

    pub fn note_off(tick: u32, channel: u8, key: u8) -> Self {
        Self::channel_event(tick, NOTE_OFF | (channel & 0x0F), key, 0)
    }

    pub fn key_pressure(tick: u32, channel: u8, key: u8, pressure: u8) -> Self {
        Self::channel_event(tick, KEY_PRESSURE | (channel & 0x0F), key, pressure)
    }

    pub fn controller(tick: u32, channel: u8, controller: u8, value: u8) -> Self {
        Self::channel_event(tick, CONTROLLER | (channel & 0x0F), controller, value)
    }

    pub fn program_change(tick: u32, channel: u8, program: u8) -> Self {
        Self::channel_event(tick, PROGRAM_CHANGE | (channel & 0x0F), program, 0)
    }

    pub fn pitch_bend(tick: u32, channel: u8, bend: u16) -> Self {
        Self::channel_event(
            tick,
            PITCH_BEND | (channel & 0x0F),
            (bend & 0x7F) as u8,
            ((bend >> 7) & 0x7F) as u8,
        )
    }

    pub fn meta(tick: u32, kind: u8, payload: Vec<u8>) -> Self {
        Self {
            tick,
            status: META,
            data_a: kind,
            data_b: 0,
            payload,
        }
    }

    pub fn sysex(tick: u32, status: u8, payload: Vec<u8>) -> Self {
        Self {
            tick,
            status,
            data_a: 0,
            data_b: 0,
            payload,
        }
    }

    pub fn track_name(tick: u32, name: impl Into<Vec<u8>>) -> Self {
        Self::meta(tick, META_TRACK_NAME, name.into())
    }

    pub fn end_of_track(tick: u32) -> Self {
        Self::meta(tick, META_END_OF_TRACK, Vec::new())
    }

    /// High nibble of the status byte (`0xF0` for meta and sysex).
    pub fn kind(&self) -> u8 {
        self.status & 0xF0
    }

    /// MIDI channel of a channel event, `None` for meta and sysex.
    pub fn channel(&self) -> Option<u8> {
        (self.status < SYSEX).then_some(self.status & 0x0F)
    }

    pub fn is_meta(&self, kind: u8) -> bool {
        self.status == META && self.data_a == kind
    }

    pub fn is_track_name(&self) -> bool {
        self.is_meta(META_TRACK_NAME)
    }

    pub fn is_end_of_track(&self) -> bool {
        self.is_meta(META_END_OF_TRACK)
    }

    pub fn message(&self) -> Message<'_> {
        let channel = self.status & 0x0F;
        match self.status & 0xF0 {
            NOTE_OFF => Message::NoteOff {
                channel,
                key: self.data_a,
                vel: self.data_b,
            },
            NOTE_ON if self.data_b == 0 => Message::NoteOff {
                channel,
                key: self.data_a,
                vel: 0,
            },
            NOTE_ON => Message::NoteOn {
                channel,
                key: self.data_a,
                vel: self.data_b,
            },
            KEY_PRESSURE => Message::KeyPressure {
                channel,
                key: self.data_a,
                pressure: self.data_b,
            },
            CONTROLLER => Message::Controller {
                channel,
                controller: self.data_a,
                value: self.data_b,
            },
            PROGRAM_CHANGE => Message::ProgramChange {
                channel,
                program: self.data_a,
            },
            CHANNEL_PRESSURE => Message::ChannelPressure {
                channel,
                pressure: self.data_a,
            },
            PITCH_BEND => Message::PitchBend {
                channel,
                bend: (self.data_a as u16 & 0x7F) | ((self.data_b as u16 & 0x7F) << 7),
            },
            _ if self.status == META => Message::Meta {
                kind: self.data_a,
                data: &self.payload,
            },
            _ => Message::SysEx(&self.payload),
        }
    }
}
