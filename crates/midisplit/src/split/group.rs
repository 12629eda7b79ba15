use super::registry::VoiceSlot;
use crate::track::Track;
use std::collections::{BTreeMap, BTreeSet};

/// Index of a destination within its [`SplitGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestId(pub usize);

impl DestId {
    /// The original track.
    pub const SOURCE: DestId = DestId(0);
}

/// One output track of a split plus the bookkeeping the engine keeps for it.
#[derive(Debug, Clone, Default)]
pub struct Destination {
    pub track: Track,
    /// Suffix appended to the track name, e.g. `"ch 4"`. Empty until named.
    pub descriptor: String,
    /// Sounding note per channel, used by the chord split.
    pub note_playing: [Option<VoiceSlot>; 16],
}

impl Destination {
    fn new(track: Track) -> Self {
        Self {
            track,
            ..Self::default()
        }
    }

    pub fn reset_scratch(&mut self) {
        self.note_playing = [None; 16];
    }
}

/// The destinations produced from one source track.
///
/// Never empty: destination 0 is always the source track itself.
#[derive(Debug, Clone)]
pub struct SplitGroup {
    destinations: Vec<Destination>,
}

impl SplitGroup {
    pub fn new(source: Track) -> Self {
        Self {
            destinations: vec![Destination::new(source)],
        }
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_single(&self) -> bool {
        self.destinations.len() == 1
    }

    pub fn source(&self) -> &Track {
        &self.destinations[0].track
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn destinations_mut(&mut self) -> &mut [Destination] {
        &mut self.destinations
    }

    pub fn destination(&self, id: DestId) -> Option<&Destination> {
        self.destinations.get(id.0)
    }

    /// Destination for `id`, falling back to the source for unknown ids.
    pub fn destination_mut(&mut self, id: DestId) -> &mut Destination {
        let index = if id.0 < self.destinations.len() { id.0 } else { 0 };
        &mut self.destinations[index]
    }

    /// Append a new empty destination.
    pub fn push_destination(&mut self) -> DestId {
        self.destinations.push(Destination::default());
        DestId(self.destinations.len() - 1)
    }

    /// Bind every key to a destination, lowest key first.
    ///
    /// The lowest key reuses the source track; each further key gets a new
    /// empty track. `init` runs once per bound destination.
    pub fn allocate(
        &mut self,
        keys: &BTreeSet<i32>,
        mut init: impl FnMut(&mut Destination, i32),
    ) -> BTreeMap<i32, DestId> {
        let mut lookup = BTreeMap::new();

        for (n, &key) in keys.iter().enumerate() {
            let id = if n == 0 {
                DestId::SOURCE
            } else {
                self.push_destination()
            };
            let dest = self.destination_mut(id);
            dest.reset_scratch();
            init(dest, key);
            lookup.insert(key, id);
        }

        lookup
    }

    /// Consume the group, yielding its tracks with the source first.
    pub fn into_tracks(self) -> Vec<Track> {
        self.destinations.into_iter().map(|d| d.track).collect()
    }
}
