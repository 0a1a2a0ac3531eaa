// Interval overlap classifier
// Single pass over a key event stream classifying every release against the keys still held

use crate::events::{Direction, EventStream, KeyEvent};
use crate::keys::{KeyFlags, KeyId, KeyTable};

use super::types::{
    AnalysisWarning, IntersectionEntry, OverlapStats, PairKey, Relation, ReleaseOutcome,
    StateConsistencyError, NO_OVERLAP_RATIO,
};

/// Default upper bound (exclusive) for recorded release-to-press gaps
pub const DEFAULT_GAP_LIMIT_MS: i64 = 1500;

/// Keys currently held, in press order, with their press timestamps
#[derive(Debug, Clone, Default)]
struct DownSet {
    keys: Vec<(KeyId, i64)>,
}

impl DownSet {
    fn contains(&self, key: KeyId) -> bool {
        self.keys.iter().any(|(k, _)| *k == key)
    }

    fn insert(&mut self, key: KeyId, pressed_at: i64) {
        self.keys.push((key, pressed_at));
    }

    fn remove(&mut self, key: KeyId) -> Option<i64> {
        let pos = self.keys.iter().position(|(k, _)| *k == key)?;
        Some(self.keys.remove(pos).1)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn ids(&self) -> Vec<KeyId> {
        self.keys.iter().map(|(k, _)| *k).collect()
    }
}

/// Streaming classifier of key hold intervals
///
/// Owns the set of currently held keys and every aggregate for the lifetime
/// of one stream. Feed events with `push`, then call `finish`.
pub struct IntervalClassifier<'a> {
    keys: &'a KeyTable,
    flags: KeyFlags,
    gap_limit_ms: i64,

    down: DownSet,
    mods_down: Vec<KeyId>,
    previous: Option<KeyEvent>,
    last_release_ms: Option<i64>,
    index: usize,

    stats: OverlapStats,
}

impl<'a> IntervalClassifier<'a> {
    pub fn new(keys: &'a KeyTable, flags: KeyFlags) -> Self {
        Self::with_gap_limit(keys, flags, DEFAULT_GAP_LIMIT_MS)
    }

    pub fn with_gap_limit(keys: &'a KeyTable, flags: KeyFlags, gap_limit_ms: i64) -> Self {
        IntervalClassifier {
            keys,
            flags,
            gap_limit_ms,
            down: DownSet::default(),
            mods_down: Vec::new(),
            previous: None,
            last_release_ms: None,
            index: 0,
            stats: OverlapStats::default(),
        }
    }

    /// Keys currently held
    pub fn down_keys(&self) -> Vec<KeyId> {
        self.down.ids()
    }

    /// Consume the next event of the stream
    pub fn push(&mut self, event: &KeyEvent) -> Result<(), StateConsistencyError> {
        match event.direction {
            Direction::Press => self.press(event)?,
            Direction::Release => self.release(event)?,
        }

        self.previous = Some(*event);
        self.index += 1;
        Ok(())
    }

    /// End of stream: report keys still held and hand over the statistics
    pub fn finish(mut self) -> OverlapStats {
        if !self.down.is_empty() {
            let keys = self.down_snapshot();
            log::warn!("Stream ended with keys still down: {:?}", keys);
            self.stats
                .warnings
                .push(AnalysisWarning::UnterminatedKeys { keys });
        }

        self.stats
    }

    fn press(&mut self, event: &KeyEvent) -> Result<(), StateConsistencyError> {
        let key = event.key;
        if self.down.contains(key) {
            return Err(StateConsistencyError::DoublePress {
                index: self.index,
                key: self.keys.name(key).to_string(),
                timestamp_ms: event.timestamp_ms,
                down: self.down_snapshot(),
            });
        }

        self.down.insert(key, event.timestamp_ms);

        let is_mod = self.flags.is_modifier(key);
        self.stats.presses.add(is_mod);
        self.stats.key_presses.add(key);

        if is_mod {
            self.mods_down.push(key);
        } else if !self.mods_down.is_empty() && !self.is_exempt_chord() {
            let mut held = self.down.ids();
            self.keys.sort_by_name(&mut held);
            self.stats.co_occurrences.add(held);
        }

        Ok(())
    }

    /// Only the exempt modifier (shift) plus the key just pressed
    fn is_exempt_chord(&self) -> bool {
        match self.flags.co_occurrence_exempt() {
            Some(exempt) => self.down.len() <= 2 && self.down.contains(exempt),
            None => false,
        }
    }

    fn release(&mut self, event: &KeyEvent) -> Result<(), StateConsistencyError> {
        let key = event.key;
        let released_at = event.timestamp_ms;

        let pressed_at = match self.down.remove(key) {
            Some(t) => t,
            None => {
                return Err(StateConsistencyError::ReleaseWithoutPress {
                    index: self.index,
                    key: self.keys.name(key).to_string(),
                    timestamp_ms: released_at,
                    down: self.down_snapshot(),
                })
            }
        };

        if let Some(pos) = self.mods_down.iter().position(|k| *k == key) {
            if self.mods_down.len() > 1 {
                let mut held = self.mods_down.clone();
                self.keys.sort_by_name(&mut held);
                self.stats.modifier_simultaneity.add(held);
            }
            self.mods_down.remove(pos);
        }

        let duration = released_at - pressed_at;
        let is_mod = self.flags.is_modifier(key);

        // A negative gap means the previous key was still down when this one was pressed
        if let Some(last_release) = self.last_release_ms {
            let gap = pressed_at - last_release;
            if (0..self.gap_limit_ms).contains(&gap) {
                self.stats.release_gaps.entry(key).or_default().push(gap);
            }
        }
        self.last_release_ms = Some(released_at);

        self.stats.key_durations.entry(key).or_default().push(duration);

        if duration == 0 {
            log::debug!(
                "{} from {} to {} was pressed for 0 ms",
                self.keys.name(key),
                pressed_at,
                released_at
            );
            self.stats.warnings.push(AnalysisWarning::ZeroDuration {
                key: self.keys.name(key).to_string(),
                timestamp_ms: released_at,
            });
        }

        if self.down.is_empty() && self.previous_is_press_of(key) {
            self.stats.zero_overlaps.add(is_mod);
            self.stats
                .zero_overlap_durations
                .get_mut(is_mod)
                .push(duration);
            self.stats
                .release_outcomes
                .add((is_mod, ReleaseOutcome::ZeroOverlap));
            return Ok(());
        }

        let mut wrapped = false;
        let mut overlapping = false;

        for &(other, other_pressed_at) in self.down.keys.iter() {
            let other_is_mod = self.flags.is_modifier(other);

            let (pair, overlap_ms) = if other_pressed_at < pressed_at {
                // The other key went down first and is still held: it wraps this one
                wrapped = true;
                self.stats.wraps.add((other_is_mod, is_mod));
                self.stats
                    .wrap_press_offsets
                    .push(other_pressed_at - pressed_at);
                (
                    PairKey {
                        relation: Relation::Wrap,
                        outer: other,
                        inner: key,
                    },
                    duration,
                )
            } else {
                // The other key went down later and outlives this one
                overlapping = true;
                self.stats.overlaps.add((is_mod, other_is_mod));
                (
                    PairKey {
                        relation: Relation::Overlap,
                        outer: key,
                        inner: other,
                    },
                    released_at - other_pressed_at,
                )
            };

            let overlap_ratio = if duration == 0 {
                NO_OVERLAP_RATIO
            } else {
                overlap_ms as f64 / duration as f64
            };

            let entry = IntersectionEntry {
                overlap_ms,
                overlap_ratio,
                press_gap_ms: (other_pressed_at - pressed_at).abs(),
            };

            let table = if is_mod || other_is_mod {
                &mut self.stats.mod_intersections
            } else {
                &mut self.stats.non_mod_intersections
            };
            table.record(pair, entry);
        }

        let outcome = if wrapped {
            ReleaseOutcome::Wrapped
        } else if overlapping {
            ReleaseOutcome::Overlapping
        } else {
            ReleaseOutcome::OverlappedEarlier
        };
        self.stats.release_outcomes.add((is_mod, outcome));

        Ok(())
    }

    fn previous_is_press_of(&self, key: KeyId) -> bool {
        matches!(
            self.previous,
            Some(KeyEvent {
                direction: Direction::Press,
                key: k,
                ..
            }) if k == key
        )
    }

    fn down_snapshot(&self) -> Vec<(String, i64)> {
        self.down
            .keys
            .iter()
            .map(|(k, t)| (self.keys.name(*k).to_string(), *t))
            .collect()
    }
}

/// Classify a whole stream in one pass
pub fn classify_stream(
    keys: &KeyTable,
    flags: KeyFlags,
    gap_limit_ms: i64,
    stream: &EventStream,
) -> Result<OverlapStats, StateConsistencyError> {
    let mut classifier = IntervalClassifier::with_gap_limit(keys, flags, gap_limit_ms);
    for event in stream.events.iter() {
        classifier.push(event)?;
    }
    Ok(classifier.finish())
}
