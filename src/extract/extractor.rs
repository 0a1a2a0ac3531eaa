// Tap-hold example extractor
// Filters chord matches and turns the accepted ones into training examples

use serde::{Deserialize, Serialize};

use crate::events::Direction::{Press, Release};
use crate::events::{Direction, EventStream, KeyEvent, RemovedMarkers};
use crate::keys::KeyFlags;
use crate::pattern::{MatchResult, PatternError, PatternMatcher};

use super::template::{tap_hold_template, ChordRole};
use super::types::{RejectReason, TrainingExample, TrainingSet};

/// Acceptance thresholds for chord matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Longest allowed time from tap-hold press to next-key release
    pub max_chord_span_ms: i64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            max_chord_span_ms: 9000,
        }
    }
}

/// Scans streams for tap-hold chords and labels them
pub struct Extractor {
    matcher: PatternMatcher<ChordRole>,
    flags: KeyFlags,
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(flags: KeyFlags, config: ExtractorConfig) -> Result<Self, PatternError> {
        Ok(Extractor {
            matcher: PatternMatcher::new(tap_hold_template()?),
            flags,
            config,
        })
    }

    pub fn matcher(&self) -> &PatternMatcher<ChordRole> {
        &self.matcher
    }

    /// Extract every accepted example from a stream
    pub fn extract(&self, stream: &EventStream) -> TrainingSet {
        let mut set = TrainingSet::default();

        for found in self.matcher.matches(&stream.events) {
            set.matches += 1;

            match self.label(&stream.events, &stream.removed, &found) {
                Ok(example) => {
                    if example.is_mod {
                        let th_index = found.anchor_index();
                        set.modifier_tap_holds.add(stream.events[th_index].key);
                    }
                    set.counts.add(&example);
                    set.examples.push(example);
                }
                Err(reason) => {
                    log::trace!("Chord at event {} rejected: {:?}", found.first_index(), reason);
                    set.rejected.add(reason);
                }
            }
        }

        log::debug!(
            "{} chord matches, {} accepted as training examples",
            set.matches,
            set.len()
        );
        set
    }

    /// Apply the acceptance filters to one match and build its example
    pub fn label(
        &self,
        events: &[KeyEvent],
        removed: &RemovedMarkers,
        found: &MatchResult<ChordRole>,
    ) -> Result<TrainingExample, RejectReason> {
        let (_, prev_down) = bound(events, found, ChordRole::Prev, Press)?;
        let (_, prev_up) = bound(events, found, ChordRole::Prev, Release)?;
        let (_, th_down) = bound(events, found, ChordRole::TapHold, Press)?;
        let (th_up_i, th_up) = bound(events, found, ChordRole::TapHold, Release)?;
        let (next_down_i, next_down) = bound(events, found, ChordRole::Next, Press)?;
        let (next_up_i, next_up) = bound(events, found, ChordRole::Next, Release)?;
        let (last_down_i, last_down) = bound(events, found, ChordRole::Trailing, Press)?;

        let is_mod = self.flags.is_modifier(th_down.key);
        if is_mod && !self.flags.is_main_area(next_down.key) {
            return Err(RejectReason::NotAShortcut);
        }

        if next_up.timestamp_ms - th_down.timestamp_ms > self.config.max_chord_span_ms {
            return Err(RejectReason::SessionGap);
        }

        let last = found.last_index();
        if found.indices().any(|i| i != last && removed.contains(i)) {
            return Err(RejectReason::StraddlesRemoval);
        }

        Ok(TrainingExample {
            prev_down_ms: prev_down.timestamp_ms,
            prev_up_ms: prev_up.timestamp_ms,
            th_down_ms: th_down.timestamp_ms,
            next_down_ms: next_down.timestamp_ms,
            next_up_ms: next_up.timestamp_ms,
            th_up_ms: th_up.timestamp_ms,
            last_down_ms: last_down.timestamp_ms,
            prev_is_mod: self.flags.is_modifier(prev_down.key),
            is_mod,
            wrapped: next_up_i < th_up_i,
            triple_down: next_down_i + 1 == last_down_i,
        })
    }
}

fn bound<'e>(
    events: &'e [KeyEvent],
    found: &MatchResult<ChordRole>,
    role: ChordRole,
    direction: Direction,
) -> Result<(usize, &'e KeyEvent), RejectReason> {
    found
        .index(role, direction)
        .and_then(|i| events.get(i).map(|e| (i, e)))
        .ok_or(RejectReason::Incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyClasses, KeyTable};

    struct Chord {
        keys: KeyTable,
        events: Vec<KeyEvent>,
    }

    /// prev `a`, tap-hold `th`, next `n`, trailing `k`; next released first
    fn chord(th: &str, n: &str, next_up_ms: i64) -> Chord {
        let mut keys = KeyTable::new();
        let a = keys.intern("a");
        let th = keys.intern(th);
        let n = keys.intern(n);
        let k = keys.intern("k");

        let events = vec![
            KeyEvent::press(0, a),
            KeyEvent::release(20, a),
            KeyEvent::press(40, th),
            KeyEvent::press(80, n),
            KeyEvent::release(next_up_ms, n),
            KeyEvent::release(next_up_ms + 20, th),
            KeyEvent::press(next_up_ms + 50, k),
            KeyEvent::release(next_up_ms + 60, k),
        ];
        Chord { keys, events }
    }

    fn extractor(keys: &KeyTable) -> Extractor {
        Extractor::new(KeyClasses::default().resolve(keys), ExtractorConfig::default()).unwrap()
    }

    #[test]
    fn test_accepts_plain_chord() {
        let c = chord("f", "j", 150);
        let set = extractor(&c.keys).extract(&EventStream::new(c.events));

        assert_eq!(set.len(), 1);
        assert_eq!(set.matches, 1);
        let ex = set.examples[0];
        assert_eq!(ex.timestamps(), [0, 20, 40, 80, 150, 170, 200]);
        assert!(ex.wrapped);
        assert!(!ex.triple_down);
        assert!(!ex.is_mod);
        assert!(!ex.prev_is_mod);
        assert_eq!(set.counts.wrap.non_modifier, 1);
        assert!(set.modifier_tap_holds.is_empty());
    }

    #[test]
    fn test_modifier_tap_hold_needs_main_area_next() {
        let c = chord("ctrl", "space", 150);
        let set = extractor(&c.keys).extract(&EventStream::new(c.events));
        assert!(set.is_empty());
        assert_eq!(set.rejected.get(&RejectReason::NotAShortcut), 1);

        let c = chord("ctrl", "c", 150);
        let set = extractor(&c.keys).extract(&EventStream::new(c.events));
        assert_eq!(set.len(), 1);
        assert!(set.examples[0].is_mod);
        assert_eq!(set.counts.examples.modifier, 1);
        let ctrl = c.keys.get("ctrl").unwrap();
        assert_eq!(set.modifier_tap_holds.get(&ctrl), 1);
    }

    #[test]
    fn test_session_gap_rejected() {
        let c = chord("f", "j", 9041);
        let set = extractor(&c.keys).extract(&EventStream::new(c.events));
        assert!(set.is_empty());
        assert_eq!(set.rejected.get(&RejectReason::SessionGap), 1);

        // exactly at the limit is still a chord
        let c = chord("f", "j", 9040);
        let set = extractor(&c.keys).extract(&EventStream::new(c.events));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_removed_marker_rejects_unless_last() {
        let c = chord("f", "j", 150);
        let stream = EventStream::with_removed(c.events.clone(), [3].into_iter().collect());
        let set = extractor(&c.keys).extract(&stream);
        assert_eq!(set.rejected.get(&RejectReason::StraddlesRemoval), 1);

        // the trailing press is the last bound event
        let stream = EventStream::with_removed(c.events, [6].into_iter().collect());
        let set = extractor(&c.keys).extract(&stream);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_triple_down_overlap() {
        let mut keys = KeyTable::new();
        let a = keys.intern("a");
        let f = keys.intern("f");
        let j = keys.intern("j");
        let k = keys.intern("k");

        let events = vec![
            KeyEvent::press(0, a),
            KeyEvent::press(30, f),
            KeyEvent::release(35, a),
            KeyEvent::press(60, j),
            KeyEvent::press(90, k),
            KeyEvent::release(100, f),
            KeyEvent::release(120, j),
            KeyEvent::release(130, k),
        ];

        let set = extractor(&keys).extract(&EventStream::new(events));
        assert_eq!(set.len(), 1);
        let ex = set.examples[0];
        assert_eq!(ex.timestamps(), [0, 35, 30, 60, 120, 100, 90]);
        assert!(!ex.wrapped);
        assert!(ex.triple_down);
        assert_eq!(set.counts.overlap.non_modifier, 1);
        assert_eq!(set.counts.triple_down.non_modifier, 1);
    }
}
