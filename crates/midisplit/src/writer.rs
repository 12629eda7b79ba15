use crate::event::{self, Event};
use crate::track::{MidiFile, Timing, Track};

impl MidiFile {
    /// Serialize to Standard MIDI File bytes.
    ///
    /// Every event is written with an explicit status byte (no running
    /// status). Tracks are written as stored; nothing is appended.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tracks: Vec<Vec<u8>> = self.tracks.iter().map(build_track).collect();
        build_midi_file(self.format.as_u16(), self.timing, &tracks)
    }
}

/// Encode one track's events as MTrk chunk data.
fn build_track(track: &Track) -> Vec<u8> {
    let mut track_data = Vec::new();
    let mut last_tick = 0u32;

    for ev in track.events() {
        let delta = ev.tick.saturating_sub(last_tick);
        write_vlq(&mut track_data, delta);
        write_event(&mut track_data, ev);
        last_tick = last_tick.max(ev.tick);
    }

    track_data
}

fn write_event(buf: &mut Vec<u8>, ev: &Event) {
    match ev.status {
        event::META => {
            buf.push(event::META);
            buf.push(ev.data_a);
            write_vlq(buf, ev.payload.len() as u32);
            buf.extend_from_slice(&ev.payload);
        }
        event::SYSEX | event::ESCAPE => {
            buf.push(ev.status);
            write_vlq(buf, ev.payload.len() as u32);
            buf.extend_from_slice(&ev.payload);
        }
        status => {
            buf.push(status);
            buf.push(ev.data_a & 0x7F);
            // Program change and channel pressure carry a single data byte
            if !matches!(status & 0xF0, event::PROGRAM_CHANGE | event::CHANNEL_PRESSURE) {
                buf.push(ev.data_b & 0x7F);
            }
        }
    }
}

/// Assemble a complete MIDI file from track data blobs.
fn build_midi_file(format: u16, timing: Timing, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    let division: u16 = match timing {
        Timing::Metrical(ppq) => ppq & 0x7FFF,
        Timing::Timecode(fps, subframes) => {
            let frames = (fps as i8).wrapping_neg() as u8;
            ((frames as u16) << 8) | subframes as u16
        }
    };

    // MThd header
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&format.to_be_bytes());
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&division.to_be_bytes());

    // MTrk chunks
    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    // SMF quantities are at most 28 bits
    value &= 0x0FFF_FFFF;
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut bytes = Vec::new();
    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buf.extend_from_slice(&bytes);
}
