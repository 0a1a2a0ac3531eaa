// Overlap classification types
// Relations between held keys, intersection records and aggregate statistics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::keys::KeyId;
use crate::tally::Tally;

/// Overlap ratio recorded when the releasing key was held for 0 ms
pub const NO_OVERLAP_RATIO: f64 = -1.0;

/// Modifier flags of a key pair, `(outer_is_mod, inner_is_mod)`
pub type ModPair = (bool, bool);

/// How two concurrently held key intervals relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// Both held independently; the outer key is released while the inner continues
    Overlap,

    /// The outer key was pressed first and is held through the whole inner interval
    Wrap,
}

/// Classification of a single key release
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReleaseOutcome {
    /// No other key was down at any point of the interval
    ZeroOverlap,

    /// Some still-held key was pressed before this one
    Wrapped,

    /// Every still-held key was pressed after this one
    Overlapping,

    /// Other keys were down during the interval but all were released first
    OverlappedEarlier,
}

/// Values split by whether the key is a modifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByModifier<T> {
    pub non_modifier: T,
    pub modifier: T,
}

impl<T> ByModifier<T> {
    pub fn get(&self, is_mod: bool) -> &T {
        if is_mod {
            &self.modifier
        } else {
            &self.non_modifier
        }
    }

    pub fn get_mut(&mut self, is_mod: bool) -> &mut T {
        if is_mod {
            &mut self.modifier
        } else {
            &mut self.non_modifier
        }
    }
}

/// Identity of an intersection: relation plus ordered key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub relation: Relation,
    pub outer: KeyId,
    pub inner: KeyId,
}

/// Measurements of one intersection occurrence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionEntry {
    /// How long both keys were held together
    pub overlap_ms: i64,

    /// `overlap_ms` divided by the releasing key's hold duration,
    /// or `NO_OVERLAP_RATIO` when that duration is zero
    pub overlap_ratio: f64,

    /// Absolute distance between the two press timestamps
    pub press_gap_ms: i64,
}

impl IntersectionEntry {
    pub fn has_ratio(&self) -> bool {
        self.overlap_ratio >= 0.0
    }
}

/// Intersection records keyed by relation and ordered key pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntersectionTable {
    entries: BTreeMap<PairKey, Vec<IntersectionEntry>>,
}

impl IntersectionTable {
    pub fn record(&mut self, key: PairKey, entry: IntersectionEntry) {
        self.entries.entry(key).or_default().push(entry);
    }

    pub fn get(&self, key: &PairKey) -> &[IntersectionEntry] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &Vec<IntersectionEntry>)> {
        self.entries.iter()
    }

    /// Total number of recorded entries across all pairs
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn merge(&mut self, other: &IntersectionTable) {
        for (key, entries) in other.entries.iter() {
            self.entries
                .entry(*key)
                .or_default()
                .extend(entries.iter().copied());
        }
    }
}

/// Non-fatal findings recorded while classifying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisWarning {
    /// Press and release share a timestamp
    ZeroDuration { key: String, timestamp_ms: i64 },

    /// Keys still down when the stream ended (truncated session)
    UnterminatedKeys { keys: Vec<(String, i64)> },
}

/// Fatal violation of the per-key press/release alternation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateConsistencyError {
    #[error("event {index}: key {key} pressed at {timestamp_ms} but already down - down: {down:?}")]
    DoublePress {
        index: usize,
        key: String,
        timestamp_ms: i64,
        down: Vec<(String, i64)>,
    },

    #[error("event {index}: key {key} released at {timestamp_ms} but not pressed - down: {down:?}")]
    ReleaseWithoutPress {
        index: usize,
        key: String,
        timestamp_ms: i64,
        down: Vec<(String, i64)>,
    },
}

impl StateConsistencyError {
    pub fn key(&self) -> &str {
        match self {
            StateConsistencyError::DoublePress { key, .. }
            | StateConsistencyError::ReleaseWithoutPress { key, .. } => key,
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        match self {
            StateConsistencyError::DoublePress { timestamp_ms, .. }
            | StateConsistencyError::ReleaseWithoutPress { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// Keys down (with press timestamps) when the violation was detected
    pub fn down(&self) -> &[(String, i64)] {
        match self {
            StateConsistencyError::DoublePress { down, .. }
            | StateConsistencyError::ReleaseWithoutPress { down, .. } => down,
        }
    }
}

/// Everything the interval classifier aggregates over a stream
#[derive(Debug, Clone, Default)]
pub struct OverlapStats {
    /// Presses per key
    pub key_presses: Tally<KeyId>,

    /// Presses per modifier flag
    pub presses: Tally<bool>,

    /// Hold durations per key
    pub key_durations: BTreeMap<KeyId, Vec<i64>>,

    /// Releases with no concurrent key, per modifier flag
    pub zero_overlaps: Tally<bool>,

    /// Hold durations of zero-overlap releases
    pub zero_overlap_durations: ByModifier<Vec<i64>>,

    /// Overlap occurrences by `(outer_is_mod, inner_is_mod)`
    pub overlaps: Tally<ModPair>,

    /// Wrap occurrences by `(outer_is_mod, inner_is_mod)`
    pub wraps: Tally<ModPair>,

    /// One outcome per release, keyed by the releasing key's modifier flag
    pub release_outcomes: Tally<(bool, ReleaseOutcome)>,

    /// Intersections where at least one key is a modifier
    pub mod_intersections: IntersectionTable,

    /// Intersections between two non-modifiers
    pub non_mod_intersections: IntersectionTable,

    /// `outer_pressed - inner_pressed` for every wrap (never positive)
    pub wrap_press_offsets: Vec<i64>,

    /// Gap between the previous release of any key and this key's press,
    /// only when within `[0, gap_limit)`
    pub release_gaps: BTreeMap<KeyId, Vec<i64>>,

    /// Non-modifier presses made while modifiers were held, by held key set
    pub co_occurrences: Tally<Vec<KeyId>>,

    /// Modifier releases while other modifiers were held, by held modifier set
    pub modifier_simultaneity: Tally<Vec<KeyId>>,

    pub warnings: Vec<AnalysisWarning>,
}

impl OverlapStats {
    pub fn total_presses(&self) -> usize {
        self.presses.total()
    }

    /// Releases of keys with the given flag that wrapped a key with `inner_is_mod`
    pub fn wraps(&self, outer_is_mod: bool, inner_is_mod: bool) -> usize {
        self.wraps.get(&(outer_is_mod, inner_is_mod))
    }

    /// Same count as `wraps`, asked from the inner key's side
    pub fn wrapped_by(&self, inner_is_mod: bool, outer_is_mod: bool) -> usize {
        self.wraps.get(&(outer_is_mod, inner_is_mod))
    }

    pub fn overlaps(&self, outer_is_mod: bool, inner_is_mod: bool) -> usize {
        self.overlaps.get(&(outer_is_mod, inner_is_mod))
    }

    pub fn overlapped_by(&self, inner_is_mod: bool, outer_is_mod: bool) -> usize {
        self.overlaps.get(&(outer_is_mod, inner_is_mod))
    }

    /// Release outcomes recorded for one modifier bucket
    pub fn outcomes(&self, is_mod: bool, outcome: ReleaseOutcome) -> usize {
        self.release_outcomes.get(&(is_mod, outcome))
    }

    pub fn zero_duration_warnings(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, AnalysisWarning::ZeroDuration { .. }))
            .count()
    }

    /// Combine statistics of an independently processed session
    /// Both must have been produced against the same `KeyTable`
    pub fn merge(&mut self, other: &OverlapStats) {
        self.key_presses.merge(&other.key_presses);
        self.presses.merge(&other.presses);
        merge_lists(&mut self.key_durations, &other.key_durations);
        self.zero_overlaps.merge(&other.zero_overlaps);
        self.zero_overlap_durations
            .non_modifier
            .extend_from_slice(&other.zero_overlap_durations.non_modifier);
        self.zero_overlap_durations
            .modifier
            .extend_from_slice(&other.zero_overlap_durations.modifier);
        self.overlaps.merge(&other.overlaps);
        self.wraps.merge(&other.wraps);
        self.release_outcomes.merge(&other.release_outcomes);
        self.mod_intersections.merge(&other.mod_intersections);
        self.non_mod_intersections.merge(&other.non_mod_intersections);
        self.wrap_press_offsets
            .extend_from_slice(&other.wrap_press_offsets);
        merge_lists(&mut self.release_gaps, &other.release_gaps);
        self.co_occurrences.merge(&other.co_occurrences);
        self.modifier_simultaneity
            .merge(&other.modifier_simultaneity);
        self.warnings.extend(other.warnings.iter().cloned());
    }
}

fn merge_lists(into: &mut BTreeMap<KeyId, Vec<i64>>, from: &BTreeMap<KeyId, Vec<i64>>) {
    for (key, values) in from.iter() {
        into.entry(*key).or_default().extend_from_slice(values);
    }
}
