// Training data types
// Training examples cut from tap-hold chords and their running counts

use serde::{Deserialize, Serialize};

use crate::keys::KeyId;
use crate::overlap::ByModifier;
use crate::tally::Tally;

/// One labeled tap-hold candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub prev_down_ms: i64,
    pub prev_up_ms: i64,
    pub th_down_ms: i64,
    pub next_down_ms: i64,
    pub next_up_ms: i64,
    pub th_up_ms: i64,

    /// Press of the first key after the next key
    pub last_down_ms: i64,

    pub prev_is_mod: bool,

    /// Whether the tap-hold key is a modifier
    pub is_mod: bool,

    /// Next key released while the tap-hold key was still down
    pub wrapped: bool,

    /// Trailing key pressed immediately after the next key (three keys down)
    pub triple_down: bool,
}

impl TrainingExample {
    /// The seven timestamps in dataset column order
    pub fn timestamps(&self) -> [i64; 7] {
        [
            self.prev_down_ms,
            self.prev_up_ms,
            self.th_down_ms,
            self.next_down_ms,
            self.next_up_ms,
            self.th_up_ms,
            self.last_down_ms,
        ]
    }
}

/// Why a chord match was not turned into an example
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// Modifier tap-hold followed by a key outside the main typing area
    NotAShortcut,

    /// Next key released too long after the tap-hold press
    SessionGap,

    /// A bound event sits right before a cleaning discontinuity
    StraddlesRemoval,

    /// Match does not bind every chord role
    Incomplete,
}

/// Accepted example counts, split by the tap-hold key's modifier flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingCounts {
    pub total: usize,
    pub examples: ByModifier<usize>,
    pub overlap: ByModifier<usize>,
    pub wrap: ByModifier<usize>,
    pub triple_down: ByModifier<usize>,
}

impl TrainingCounts {
    pub fn add(&mut self, example: &TrainingExample) {
        let is_mod = example.is_mod;
        self.total += 1;
        *self.examples.get_mut(is_mod) += 1;
        if example.wrapped {
            *self.wrap.get_mut(is_mod) += 1;
        } else {
            *self.overlap.get_mut(is_mod) += 1;
        }
        if example.triple_down {
            *self.triple_down.get_mut(is_mod) += 1;
        }
    }

    pub fn merge(&mut self, other: &TrainingCounts) {
        self.total += other.total;
        for (mine, theirs) in [
            (&mut self.examples, &other.examples),
            (&mut self.overlap, &other.overlap),
            (&mut self.wrap, &other.wrap),
            (&mut self.triple_down, &other.triple_down),
        ] {
            mine.modifier += theirs.modifier;
            mine.non_modifier += theirs.non_modifier;
        }
    }
}

/// Extracted examples plus everything counted along the way
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub examples: Vec<TrainingExample>,
    pub counts: TrainingCounts,

    /// Chord matches seen, accepted or not
    pub matches: usize,

    pub rejected: Tally<RejectReason>,

    /// Accepted examples per modifier used as the tap-hold key
    pub modifier_tap_holds: Tally<KeyId>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn merge(&mut self, other: &TrainingSet) {
        self.examples.extend_from_slice(&other.examples);
        self.counts.merge(&other.counts);
        self.matches += other.matches;
        self.rejected.merge(&other.rejected);
        self.modifier_tap_holds.merge(&other.modifier_tap_holds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(is_mod: bool, wrapped: bool, triple_down: bool) -> TrainingExample {
        TrainingExample {
            prev_down_ms: 0,
            prev_up_ms: 20,
            th_down_ms: 40,
            next_down_ms: 80,
            next_up_ms: 150,
            th_up_ms: 170,
            last_down_ms: 200,
            prev_is_mod: false,
            is_mod,
            wrapped,
            triple_down,
        }
    }

    #[test]
    fn test_timestamps_order() {
        assert_eq!(example(false, true, false).timestamps(), [0, 20, 40, 80, 150, 170, 200]);
    }

    #[test]
    fn test_counts() {
        let mut counts = TrainingCounts::default();
        counts.add(&example(true, true, false));
        counts.add(&example(false, false, true));
        counts.add(&example(false, true, true));

        assert_eq!(counts.total, 3);
        assert_eq!(counts.examples.modifier, 1);
        assert_eq!(counts.examples.non_modifier, 2);
        assert_eq!(counts.wrap.modifier, 1);
        assert_eq!(counts.wrap.non_modifier, 1);
        assert_eq!(counts.overlap.non_modifier, 1);
        assert_eq!(counts.triple_down.non_modifier, 2);
        assert_eq!(counts.triple_down.modifier, 0);
    }

    #[test]
    fn test_merge_sets() {
        let mut left = TrainingSet::default();
        left.examples.push(example(false, true, false));
        left.counts.add(&left.examples[0]);
        left.matches = 2;
        left.rejected.add(RejectReason::SessionGap);

        let right = left.clone();
        left.merge(&right);

        assert_eq!(left.len(), 2);
        assert_eq!(left.counts.total, 2);
        assert_eq!(left.counts.wrap.non_modifier, 2);
        assert_eq!(left.matches, 4);
        assert_eq!(left.rejected.get(&RejectReason::SessionGap), 2);
    }
}
