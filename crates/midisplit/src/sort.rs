//! Canonical ordering of events that share a tick.
//!
//! Within one tick, note offs come first, then bank select and program
//! changes, controllers, pressure and pitch bends, and note ons last. Events
//! that must keep their exact position (meta, sysex, RPN/NRPN and data entry
//! controllers, channel mode messages) stay put and split the tick into
//! independently sorted runs.

use crate::event::{Event, Message};
use crate::track::{MidiFile, Track};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    /// Order notes by pitch within their class.
    pub notes_by_pitch: bool,
    /// Order controllers below 0x40 by number.
    pub controllers_by_number: bool,
}

impl SortOptions {
    /// Options from the classic bit mask: 0x01 notes, 0x02 controllers.
    pub fn from_mask(mask: u8) -> Self {
        Self {
            notes_by_pitch: mask & 0x01 != 0,
            controllers_by_number: mask & 0x02 != 0,
        }
    }
}

/// Sort every tick group of every track in place.
///
/// Returns the number of events that changed position.
pub fn sort_events(file: &mut MidiFile, options: &SortOptions) -> usize {
    let moved = file
        .tracks
        .iter_mut()
        .map(|track| sort_track(track, options))
        .sum();
    debug!(moved, "sorted events");
    moved
}

pub fn sort_track(track: &mut Track, options: &SortOptions) -> usize {
    let events = track.events_mut();
    let mut moved = 0;
    let mut start = 0;

    while start < events.len() {
        let tick = events[start].tick;
        let end = start
            + events[start..]
                .iter()
                .take_while(|e| e.tick == tick)
                .count();
        moved += sort_tick_group(&mut events[start..end], options);
        start = end;
    }

    moved
}

/// Stable-sort each run of relocatable events within one tick.
fn sort_tick_group(group: &mut [Event], options: &SortOptions) -> usize {
    let mut moved = 0;
    let mut run_start = 0;

    for index in 0..=group.len() {
        let fixed = group
            .get(index)
            .map_or(true, |e| sort_id(e, options).is_none());
        if fixed {
            moved += sort_run(&mut group[run_start..index], options);
            run_start = index + 1;
        }
    }

    moved
}

fn sort_run(run: &mut [Event], options: &SortOptions) -> usize {
    if run.len() < 2 {
        return 0;
    }
    let before = run.to_vec();
    run.sort_by_key(|e| sort_id(e, options));
    before.iter().zip(run.iter()).filter(|(a, b)| a != b).count()
}

/// Ordering key of an event within its tick, or `None` if it must not move.
pub fn sort_id(event: &Event, options: &SortOptions) -> Option<u32> {
    let ch = |channel: u8| (channel as u32) << 8;
    match event.message() {
        Message::NoteOff { channel, key, .. } => Some(note_part(key, options) | channel as u32),
        Message::NoteOn { channel, key, .. } => {
            Some(0xF000 | note_part(key, options) | channel as u32)
        }
        Message::KeyPressure { channel, .. } => Some(0x3000 | ch(channel)),
        Message::Controller {
            channel,
            controller,
            ..
        } => controller_id(channel, controller, options),
        Message::ProgramChange { channel, .. } => Some(0x1002 | ch(channel)),
        Message::ChannelPressure { channel, .. } => Some(0x3001 | ch(channel)),
        Message::PitchBend { channel, .. } => Some(0x3002 | ch(channel)),
        Message::SysEx(_) | Message::Meta { .. } => None,
    }
}

fn note_part(key: u8, options: &SortOptions) -> u32 {
    if options.notes_by_pitch {
        (key as u32) << 4
    } else {
        0
    }
}

fn controller_id(channel: u8, controller: u8, options: &SortOptions) -> Option<u32> {
    let ch = (channel as u32) << 8;
    match controller {
        // channel mode messages
        0x78.. => None,
        // data increment/decrement, NRPN, RPN
        0x60..=0x65 => None,
        0x00..=0x3F => {
            let number = (controller & 0x1F) as u32;
            let lsb = ((controller & 0x20) >> 5) as u32;
            match number {
                // bank select goes right before the program change
                0x00 => Some(0x1000 | ch | lsb),
                // data entry
                0x06 => None,
                _ if options.controllers_by_number => Some(0x2000 | ch | (number << 1) | lsb),
                _ => Some(0x2000 | ch),
            }
        }
        _ => Some(0x2000 | ch | controller as u32),
    }
}
