use crate::event::{self, Event};
use crate::track::{Format, MidiFile, Timing, Track};
use midly::{Fps, MetaMessage, MidiMessage, Smf, TrackEventKind};
use std::path::Path;

impl MidiFile {
    /// Parse Standard MIDI File bytes into absolute-tick tracks.
    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        let smf = Smf::parse(bytes).map_err(|e| crate::Error::MidiParse(e.to_string()))?;
        Ok(Self::from_smf(&smf))
    }

    pub fn from_smf(smf: &Smf) -> Self {
        let format = match smf.header.format {
            midly::Format::SingleTrack => Format::SingleTrack,
            midly::Format::Parallel => Format::Parallel,
            midly::Format::Sequential => Format::Sequential,
        };

        let timing = match smf.header.timing {
            midly::Timing::Metrical(ticks) => Timing::Metrical(ticks.as_int()),
            midly::Timing::Timecode(fps, subframes) => Timing::Timecode(fps_value(fps), subframes),
        };

        let tracks = smf
            .tracks
            .iter()
            .map(|track| {
                let mut current_tick: u32 = 0;
                let events = track
                    .iter()
                    .map(|ev| {
                        current_tick = current_tick.saturating_add(ev.delta.as_int());
                        convert_event(current_tick, &ev.kind)
                    })
                    .collect();
                Track::from_events(events)
            })
            .collect();

        Self {
            format,
            timing,
            tracks,
        }
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }
}

fn fps_value(fps: Fps) -> u8 {
    match fps {
        Fps::Fps24 => 24,
        Fps::Fps25 => 25,
        Fps::Fps29 => 29,
        Fps::Fps30 => 30,
    }
}

fn convert_event(tick: u32, kind: &TrackEventKind) -> Event {
    match *kind {
        TrackEventKind::Midi { channel, message } => {
            let ch = channel.as_int();
            let (status, a, b) = match message {
                MidiMessage::NoteOff { key, vel } => (event::NOTE_OFF, key.as_int(), vel.as_int()),
                MidiMessage::NoteOn { key, vel } => (event::NOTE_ON, key.as_int(), vel.as_int()),
                MidiMessage::Aftertouch { key, vel } => {
                    (event::KEY_PRESSURE, key.as_int(), vel.as_int())
                }
                MidiMessage::Controller { controller, value } => {
                    (event::CONTROLLER, controller.as_int(), value.as_int())
                }
                MidiMessage::ProgramChange { program } => {
                    (event::PROGRAM_CHANGE, program.as_int(), 0)
                }
                MidiMessage::ChannelAftertouch { vel } => {
                    (event::CHANNEL_PRESSURE, vel.as_int(), 0)
                }
                MidiMessage::PitchBend { bend } => {
                    let value = bend.0.as_int();
                    (event::PITCH_BEND, (value & 0x7F) as u8, (value >> 7) as u8)
                }
            };
            Event::channel_event(tick, status | ch, a, b)
        }
        TrackEventKind::SysEx(data) => Event::sysex(tick, event::SYSEX, data.to_vec()),
        TrackEventKind::Escape(data) => Event::sysex(tick, event::ESCAPE, data.to_vec()),
        TrackEventKind::Meta(meta) => {
            let (kind, payload) = meta_bytes(&meta);
            Event::meta(tick, kind, payload)
        }
    }
}

/// Raw type byte and payload of a parsed meta message.
fn meta_bytes(meta: &MetaMessage) -> (u8, Vec<u8>) {
    match *meta {
        MetaMessage::TrackNumber(number) => (
            0x00,
            number.map(|n| n.to_be_bytes().to_vec()).unwrap_or_default(),
        ),
        MetaMessage::Text(data) => (0x01, data.to_vec()),
        MetaMessage::Copyright(data) => (0x02, data.to_vec()),
        MetaMessage::TrackName(data) => (event::META_TRACK_NAME, data.to_vec()),
        MetaMessage::InstrumentName(data) => (0x04, data.to_vec()),
        MetaMessage::Lyric(data) => (0x05, data.to_vec()),
        MetaMessage::Marker(data) => (0x06, data.to_vec()),
        MetaMessage::CuePoint(data) => (0x07, data.to_vec()),
        MetaMessage::ProgramName(data) => (0x08, data.to_vec()),
        MetaMessage::DeviceName(data) => (0x09, data.to_vec()),
        MetaMessage::MidiChannel(channel) => (event::META_CHANNEL_PREFIX, vec![channel.as_int()]),
        MetaMessage::MidiPort(port) => (0x21, vec![port.as_int()]),
        MetaMessage::EndOfTrack => (event::META_END_OF_TRACK, Vec::new()),
        MetaMessage::Tempo(tempo) => {
            let usec = tempo.as_int();
            (0x51, vec![(usec >> 16) as u8, (usec >> 8) as u8, usec as u8])
        }
        MetaMessage::SmpteOffset(time) => {
            let rate = match time.fps() {
                Fps::Fps24 => 0u8,
                Fps::Fps25 => 1,
                Fps::Fps29 => 2,
                Fps::Fps30 => 3,
            };
            (
                0x54,
                vec![
                    (rate << 5) | time.hour(),
                    time.minute(),
                    time.second(),
                    time.frame(),
                    time.subframe(),
                ],
            )
        }
        MetaMessage::TimeSignature(num, denom_pow, clocks, thirty_seconds) => {
            (0x58, vec![num, denom_pow, clocks, thirty_seconds])
        }
        MetaMessage::KeySignature(sharps, minor) => (0x59, vec![sharps as u8, minor as u8]),
        MetaMessage::SequencerSpecific(data) => (0x7F, data.to_vec()),
        MetaMessage::Unknown(kind, data) => (kind, data.to_vec()),
    }
}
