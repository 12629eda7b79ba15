use super::group::SplitGroup;
use crate::event::Event;
use crate::track::Track;

/// Name every destination of a split and close it with an End-of-Track.
///
/// Names are `"{base} {descriptor}"`, where `base` is the source's tick-0
/// track name or `tk{track_index}` when it has none. The source's own name
/// event is rewritten in place; all other destinations get a new name event
/// at the front. Destinations without a descriptor are numbered `#1`, `#2`,
/// ... A group that was not split is left untouched.
pub fn name_tracks(group: &mut SplitGroup, track_index: usize) {
    if group.is_single() {
        return;
    }

    let name_pos = group
        .source()
        .events()
        .iter()
        .take_while(|e| e.tick == 0)
        .position(Event::is_track_name);

    let base: Vec<u8> = match name_pos.map(|pos| &group.source().events()[pos].payload) {
        Some(name) if !name.is_empty() => name.clone(),
        _ => format!("tk{track_index}").into_bytes(),
    };

    let width = count_digits(group.len());
    for (index, dest) in group.destinations_mut().iter_mut().enumerate() {
        if dest.descriptor.is_empty() {
            dest.descriptor = format!("#{:0width$}", index + 1);
        }

        let mut name = base.clone();
        name.push(b' ');
        name.extend_from_slice(dest.descriptor.as_bytes());

        match name_pos {
            Some(pos) if index == 0 => dest.track.events_mut()[pos].payload = name,
            _ => dest.track.insert_before(0, Event::track_name(0, name)),
        }

        close_track(&mut dest.track);
    }
}

/// Replace any End-of-Track markers with a single one at the very end.
fn close_track(track: &mut Track) {
    let mut end_tick = 0;
    track.retain(|e| {
        if e.is_end_of_track() {
            end_tick = end_tick.max(e.tick);
            false
        } else {
            true
        }
    });
    let end_tick = end_tick.max(track.last_tick());
    track.append(Event::end_of_track(end_tick));
}

fn count_digits(mut value: usize) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}
