//! Structural properties every split strategy must keep.

use midisplit::{split, Event, Format, Message, MidiFile, SplitStrategy, Timing, Track};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

const STRATEGIES: [SplitStrategy; 5] = [
    SplitStrategy::Channel,
    SplitStrategy::Chord,
    SplitStrategy::Instrument,
    SplitStrategy::Velocity,
    SplitStrategy::Key,
];

/// Small linear congruential generator so the fixtures are reproducible.
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, bound: u32) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as u32) % bound
    }
}

fn busy_track(seed: u64) -> Track {
    let mut rng = Lcg(seed);
    let mut events = Vec::new();

    for _ in 0..80 {
        let start = rng.below(2000);
        let length = 1 + rng.below(300);
        let channel = rng.below(4) as u8;
        let pitch = 48 + rng.below(12) as u8;
        let vel = 1 + rng.below(127) as u8;
        events.push(Event::note_on(start, channel, pitch, vel));
        events.push(Event::note_off(start + length, channel, pitch));
    }
    for _ in 0..15 {
        let channel = rng.below(4) as u8;
        events.push(Event::program_change(rng.below(2000), channel, rng.below(8) as u8));
        events.push(Event::controller(rng.below(2000), channel, 7, rng.below(128) as u8));
        events.push(Event::pitch_bend(rng.below(2000), channel, rng.below(0x4000) as u16));
        let pitch = 48 + rng.below(12) as u8;
        events.push(Event::key_pressure(rng.below(2000), channel, pitch, rng.below(128) as u8));
    }
    events.push(Event::meta(rng.below(2000), 0x06, b"marker".to_vec()));
    events.sort_by_key(|e| e.tick);

    let end = events.last().map(|e| e.tick).unwrap_or(0);
    events.insert(0, Event::track_name(0, "Busy"));
    events.push(Event::end_of_track(end));
    Track::from_events(events)
}

fn single_track_file(track: Track) -> MidiFile {
    let mut file = MidiFile::new(Format::Parallel, Timing::Metrical(480));
    file.tracks.push(track);
    file
}

fn is_added_meta(event: &Event) -> bool {
    event.is_track_name() || event.is_end_of_track()
}

fn body(events: &[Event]) -> Vec<Event> {
    events.iter().filter(|e| !is_added_meta(e)).cloned().collect()
}

fn counts(events: impl IntoIterator<Item = Event>) -> HashMap<Event, usize> {
    let mut counts = HashMap::new();
    for event in events {
        *counts.entry(event).or_insert(0) += 1;
    }
    counts
}

fn is_subsequence(needle: &[Event], haystack: &[Event]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|event| rest.any(|candidate| candidate == event))
}

fn name_of(track: &Track) -> String {
    track
        .events()
        .iter()
        .find(|e| e.is_track_name())
        .map(|e| String::from_utf8_lossy(&e.payload).into_owned())
        .unwrap_or_default()
}

#[test]
fn events_are_conserved() {
    for strategy in STRATEGIES {
        for seed in 1..6 {
            let source = busy_track(seed);
            let mut file = single_track_file(source.clone());
            split(&mut file, strategy);

            let before = counts(body(source.events()));
            let after = counts(file.tracks.iter().flat_map(|t| body(t.events())));
            assert_eq!(after, before, "{strategy} seed {seed}");

            for track in &file.tracks {
                let names = track.events().iter().filter(|e| e.is_track_name()).count();
                let ends = track.events().iter().filter(|e| e.is_end_of_track()).count();
                assert_eq!((names, ends), (1, 1), "{strategy} seed {seed}");
                assert!(track.events().last().is_some_and(Event::is_end_of_track));
            }
        }
    }
}

#[test]
fn destinations_keep_source_order() {
    for strategy in STRATEGIES {
        let source = busy_track(42);
        let original = body(source.events());
        let mut file = single_track_file(source);
        split(&mut file, strategy);

        for track in &file.tracks {
            let ticks: Vec<u32> = track.events().iter().map(|e| e.tick).collect();
            assert!(ticks.windows(2).all(|w| w[0] <= w[1]), "{strategy}");
            assert!(is_subsequence(&body(track.events()), &original), "{strategy}");
        }
    }
}

#[test]
fn note_offs_land_with_their_note_ons() {
    for strategy in STRATEGIES {
        let mut file = single_track_file(busy_track(7));
        split(&mut file, strategy);

        for track in &file.tracks {
            let mut sounding: HashMap<(u8, u8), i32> = HashMap::new();
            for event in track.events() {
                match event.message() {
                    Message::NoteOn { channel, key, .. } => {
                        *sounding.entry((channel, key)).or_insert(0) += 1
                    }
                    Message::NoteOff { channel, key, .. } => {
                        let count = sounding.entry((channel, key)).or_insert(0);
                        *count -= 1;
                        assert!(*count >= 0, "{strategy}: Note-Off before its Note-On");
                    }
                    _ => {}
                }
            }
            assert!(sounding.values().all(|&n| n == 0), "{strategy}: hanging note");
        }
    }
}

#[test]
fn single_key_leaves_track_untouched() {
    let track = Track::from_events(vec![
        Event::track_name(0, "Bass"),
        Event::program_change(0, 2, 33),
        Event::note_on(0, 2, 40, 90),
        Event::note_off(240, 2, 40),
        Event::note_on(240, 2, 40, 90),
        Event::note_off(480, 2, 40),
        Event::end_of_track(480),
    ]);

    for strategy in STRATEGIES {
        let mut file = single_track_file(track.clone());
        let summary = split(&mut file, strategy);
        assert_eq!(summary.destinations, vec![1], "{strategy}");
        assert_eq!(file.tracks, vec![track.clone()], "{strategy}");
    }
}

#[test]
fn channel_split_names_by_channel() {
    let mut file = single_track_file(Track::from_events(vec![
        Event::track_name(0, "Keys"),
        Event::note_on(0, 0, 60, 100),
        Event::note_on(5, 3, 62, 100),
        Event::controller(7, 0, 64, 127),
        Event::note_off(10, 0, 60),
        Event::note_off(12, 3, 62),
        Event::end_of_track(12),
    ]));

    split(&mut file, SplitStrategy::Channel);

    assert_eq!(
        file.tracks,
        vec![
            Track::from_events(vec![
                Event::track_name(0, "Keys ch 1"),
                Event::note_on(0, 0, 60, 100),
                Event::controller(7, 0, 64, 127),
                Event::note_off(10, 0, 60),
                Event::end_of_track(12),
            ]),
            Track::from_events(vec![
                Event::track_name(0, "Keys ch 4"),
                Event::note_on(5, 3, 62, 100),
                Event::note_off(12, 3, 62),
                Event::end_of_track(12),
            ]),
        ]
    );
}

#[test]
fn chord_split_allocates_by_polyphony() {
    let sequential = Track::from_events(vec![
        Event::note_on(0, 0, 60, 100),
        Event::note_off(5, 0, 60),
        Event::note_on(10, 0, 60, 100),
        Event::note_off(15, 0, 60),
        Event::note_on(20, 0, 60, 100),
        Event::note_off(25, 0, 60),
    ]);
    let mut file = single_track_file(sequential);
    assert_eq!(split(&mut file, SplitStrategy::Chord).destinations, vec![1]);

    let overlapping = Track::from_events(vec![
        Event::note_on(0, 0, 60, 100),
        Event::note_on(10, 0, 60, 100),
        Event::note_on(20, 0, 60, 100),
        Event::note_off(30, 0, 60),
        Event::note_off(35, 0, 60),
        Event::note_off(40, 0, 60),
    ]);
    let mut file = single_track_file(overlapping);
    assert_eq!(split(&mut file, SplitStrategy::Chord).destinations, vec![3]);

    let names: Vec<String> = file.tracks.iter().map(name_of).collect();
    assert_eq!(names, vec!["tk0 #1", "tk0 #2", "tk0 #3"]);
    for (track, off_tick) in file.tracks.iter().zip([30, 35, 40]) {
        assert_eq!(track.events()[2], Event::note_off(off_tick, 0, 60));
    }
}

#[test]
fn velocity_split_orders_loudest_first() {
    let mut file = single_track_file(Track::from_events(vec![
        Event::track_name(0, "Drums"),
        Event::note_on(0, 9, 36, 40),
        Event::note_on(0, 9, 38, 100),
        Event::note_off(10, 9, 36),
        Event::note_off(10, 9, 38),
    ]));

    split(&mut file, SplitStrategy::Velocity);

    let names: Vec<String> = file.tracks.iter().map(name_of).collect();
    assert_eq!(names, vec!["Drums vol 100", "Drums vol 40"]);
    assert_eq!(
        body(file.tracks[1].events()),
        vec![Event::note_on(0, 9, 36, 40), Event::note_off(10, 9, 36)]
    );
}

#[test]
fn split_file_survives_serialization() {
    let mut file = single_track_file(busy_track(3));
    split(&mut file, SplitStrategy::Channel);

    let bytes = file.to_bytes();
    let smf = midly::Smf::parse(&bytes).unwrap();
    assert_eq!(smf.tracks.len(), file.track_count());

    let reparsed = MidiFile::parse(&bytes).unwrap();
    assert_eq!(reparsed, file);
}

#[test]
fn split_format_zero_file_is_written_as_format_one() {
    let mut file = MidiFile::new(Format::SingleTrack, Timing::Metrical(480));
    file.tracks.push(Track::from_events(vec![
        Event::note_on(0, 0, 60, 100),
        Event::note_on(0, 3, 48, 100),
        Event::note_off(10, 0, 60),
        Event::note_off(10, 3, 48),
    ]));

    split(&mut file, SplitStrategy::Channel);

    let bytes = file.to_bytes();
    let smf = midly::Smf::parse(&bytes).unwrap();
    assert_eq!(smf.header.format, midly::Format::Parallel);
    assert_eq!(smf.tracks.len(), 2);
    assert_eq!(u16::from_be_bytes([bytes[8], bytes[9]]), 1);
}
