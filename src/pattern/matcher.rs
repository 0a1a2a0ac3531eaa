// Pattern matcher
// Lazy scan of an event stream for occurrences of a slot template

use std::fmt::Debug;

use crate::events::{Direction, KeyEvent};
use crate::keys::KeyId;

use super::spec::{Binding, PatternSpec, Slot};

/// One event bound by a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleBinding<R> {
    pub role: R,
    pub direction: Direction,
    pub index: usize,
}

/// Stream indices assigned to the roles of a template, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<R> {
    bindings: Vec<RoleBinding<R>>,
    anchor: (R, Direction),
}

impl<R: Copy + Eq + Debug> MatchResult<R> {
    /// Index of the first event bound to `(role, direction)`
    pub fn index(&self, role: R, direction: Direction) -> Option<usize> {
        self.bindings
            .iter()
            .find(|b| b.role == role && b.direction == direction)
            .map(|b| b.index)
    }

    pub fn bindings(&self) -> &[RoleBinding<R>] {
        &self.bindings
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bindings.iter().map(|b| b.index)
    }

    pub fn first_index(&self) -> usize {
        self.bindings.first().map(|b| b.index).unwrap_or(0)
    }

    /// Index of the chronologically last bound event
    pub fn last_index(&self) -> usize {
        self.bindings.last().map(|b| b.index).unwrap_or(0)
    }

    pub fn anchor_index(&self) -> usize {
        let (role, direction) = self.anchor;
        self.index(role, direction).unwrap_or_else(|| self.first_index())
    }
}

/// Roles and keys bound so far by one trial
struct Attempt<R> {
    bindings: Vec<RoleBinding<R>>,
    role_keys: Vec<(R, KeyId)>,
}

impl<R: Copy + Eq + Debug> Attempt<R> {
    fn new() -> Self {
        Attempt {
            bindings: Vec::new(),
            role_keys: Vec::new(),
        }
    }

    fn key_of(&self, label: R) -> Option<KeyId> {
        self.role_keys
            .iter()
            .find(|(r, _)| *r == label)
            .map(|(_, k)| *k)
    }

    fn binds_key(&self, key: KeyId) -> bool {
        self.role_keys.iter().any(|(_, k)| *k == key)
    }

    fn is_bound(&self, role: R, direction: Direction) -> bool {
        self.bindings
            .iter()
            .any(|b| b.role == role && b.direction == direction)
    }

    fn accepts(&self, slot: &Slot<R>, event: &KeyEvent) -> bool {
        if slot.direction != event.direction {
            return false;
        }

        match slot.binding {
            Binding::Introduces(label) => self.key_of(label).is_none(),
            Binding::SameKeyAs(label) => self.key_of(label) == Some(event.key),
            Binding::Wildcard => !self.binds_key(event.key),
        }
    }

    fn bind(&mut self, slot: &Slot<R>, index: usize, key: KeyId) {
        self.bindings.push(RoleBinding {
            role: slot.role,
            direction: slot.direction,
            index,
        });
        if let Binding::Introduces(label) = slot.binding {
            self.role_keys.push((label, key));
        }
    }
}

/// Finds template occurrences in an event slice
#[derive(Debug, Clone)]
pub struct PatternMatcher<R> {
    spec: PatternSpec<R>,
}

impl<R: Copy + Eq + Debug> PatternMatcher<R> {
    pub fn new(spec: PatternSpec<R>) -> Self {
        PatternMatcher { spec }
    }

    pub fn spec(&self) -> &PatternSpec<R> {
        &self.spec
    }

    /// All matches, scanning from the start of `events`
    pub fn matches<'e>(&'e self, events: &'e [KeyEvent]) -> Matches<'e, R> {
        self.matches_from(events, 0)
    }

    /// All matches whose first event is at or after `start`
    pub fn matches_from<'e>(&'e self, events: &'e [KeyEvent], start: usize) -> Matches<'e, R> {
        Matches {
            matcher: self,
            events,
            origin: start,
        }
    }

    /// Try to match the template with its first event at `origin`
    ///
    /// Every event from `origin` on must fill a slot; the scan looks at most
    /// one event per slot ahead.
    pub fn match_at(&self, events: &[KeyEvent], origin: usize) -> Option<MatchResult<R>> {
        let mut attempt = Attempt::new();
        let mut cursor = 0;

        let window = events.get(origin..)?.iter().take(self.spec.len());
        for (offset, event) in window.enumerate() {
            let slot_index = self.select_slot(cursor, event, &attempt)?;
            attempt.bind(&self.spec.slots()[slot_index], origin + offset, event.key);
            cursor = slot_index + 1;

            if self.is_complete(&attempt) {
                return Some(MatchResult {
                    bindings: attempt.bindings,
                    anchor: self.spec.anchor(),
                });
            }
        }

        None
    }

    /// Pick the slot the event fills, starting at `cursor`
    ///
    /// Slots whose pair is already bound are passed over. An unbound required
    /// slot may only be passed over when its pair has an alternative position
    /// after the chosen slot. Required slots win over wildcards.
    fn select_slot(&self, cursor: usize, event: &KeyEvent, attempt: &Attempt<R>) -> Option<usize> {
        let slots = self.spec.slots();
        let mut fallback = None;
        let mut skipped: Vec<usize> = Vec::new();

        for (i, slot) in slots.iter().enumerate().skip(cursor) {
            let required = !slot.is_wildcard();
            if required && attempt.is_bound(slot.role, slot.direction) {
                continue;
            }

            let reachable = skipped
                .iter()
                .all(|&k| slots[k].pair() == slot.pair() || self.spec.has_alternative_after(k, i));

            if reachable && attempt.accepts(slot, event) {
                if required {
                    return Some(i);
                }
                fallback.get_or_insert(i);
            }

            if required {
                if !self.spec.has_alternative_after(i, i) {
                    break;
                }
                skipped.push(i);
            }
        }

        fallback
    }

    fn is_complete(&self, attempt: &Attempt<R>) -> bool {
        self.spec
            .required()
            .iter()
            .all(|(role, direction)| attempt.is_bound(*role, *direction))
    }
}

/// Lazy iterator over matches
///
/// After a match, scanning resumes right after the anchor's index;
/// after a failed origin it moves on by one event.
pub struct Matches<'e, R> {
    matcher: &'e PatternMatcher<R>,
    events: &'e [KeyEvent],
    origin: usize,
}

impl<'e, R> Matches<'e, R> {
    /// Next trial origin, usable with `matches_from` to resume a scan
    pub fn position(&self) -> usize {
        self.origin
    }
}

impl<'e, R: Copy + Eq + Debug> Iterator for Matches<'e, R> {
    type Item = MatchResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.origin < self.events.len() {
            match self.matcher.match_at(self.events, self.origin) {
                Some(found) => {
                    self.origin = found.anchor_index() + 1;
                    return Some(found);
                }
                None => self.origin += 1,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyTable;
    use Direction::{Press, Release};

    /// x down, y down, x up, y up with an optional unrelated release before y
    fn roll_matcher() -> PatternMatcher<&'static str> {
        let spec = PatternSpec::new(
            vec![
                Slot::introduces("x", Press),
                Slot::wildcard("w", Release),
                Slot::introduces("y", Press),
                Slot::same_key("x", Release),
                Slot::same_key("y", Release),
            ],
            "y",
        )
        .unwrap();
        PatternMatcher::new(spec)
    }

    #[test]
    fn test_simple_match() {
        let mut keys = KeyTable::new();
        let a = keys.intern("a");
        let b = keys.intern("b");
        let events = vec![
            KeyEvent::press(0, a),
            KeyEvent::press(10, b),
            KeyEvent::release(20, a),
            KeyEvent::release(30, b),
        ];

        let matcher = roll_matcher();
        let found: Vec<_> = matcher.matches(&events).collect();
        assert_eq!(found.len(), 1);

        let m = &found[0];
        assert_eq!(m.index("x", Press), Some(0));
        assert_eq!(m.index("y", Press), Some(1));
        assert_eq!(m.index("x", Release), Some(2));
        assert_eq!(m.index("y", Release), Some(3));
        assert_eq!(m.anchor_index(), 1);
        assert_eq!(m.last_index(), 3);
    }

    #[test]
    fn test_wildcard_absorbs_unrelated_release() {
        let mut keys = KeyTable::new();
        let shift = keys.intern("shift");
        let a = keys.intern("a");
        let b = keys.intern("b");
        let events = vec![
            KeyEvent::press(0, shift),
            KeyEvent::press(5, a),
            KeyEvent::release(8, shift),
            KeyEvent::press(10, b),
            KeyEvent::release(20, a),
            KeyEvent::release(30, b),
        ];

        let matcher = roll_matcher();
        let m = matcher.match_at(&events, 1).unwrap();
        assert_eq!(m.index("w", Release), Some(2));
        assert_eq!(m.index("y", Press), Some(3));
        assert_eq!(m.indices().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_unabsorbed_event_breaks_match() {
        let mut keys = KeyTable::new();
        let a = keys.intern("a");
        let b = keys.intern("b");
        let c = keys.intern("c");
        let events = vec![
            KeyEvent::press(0, a),
            KeyEvent::press(5, c),
            KeyEvent::press(10, b),
            KeyEvent::release(20, a),
            KeyEvent::release(30, b),
            KeyEvent::release(40, c),
        ];

        let matcher = roll_matcher();
        assert!(matcher.match_at(&events, 0).is_none());
        // c, b, ... does not close with c released before b
        assert!(matcher.match_at(&events, 1).is_none());
    }

    #[test]
    fn test_alternative_positions() {
        // y released either before or after x
        let spec = PatternSpec::new(
            vec![
                Slot::introduces("x", Press),
                Slot::introduces("y", Press),
                Slot::same_key("y", Release),
                Slot::same_key("x", Release),
                Slot::same_key("y", Release),
            ],
            "x",
        )
        .unwrap();
        let matcher = PatternMatcher::new(spec);

        let mut keys = KeyTable::new();
        let a = keys.intern("a");
        let b = keys.intern("b");

        let wrapped = vec![
            KeyEvent::press(0, a),
            KeyEvent::press(5, b),
            KeyEvent::release(10, b),
            KeyEvent::release(15, a),
        ];
        let m = matcher.match_at(&wrapped, 0).unwrap();
        assert_eq!(m.index("y", Release), Some(2));
        assert_eq!(m.index("x", Release), Some(3));

        let rolled = vec![
            KeyEvent::press(0, a),
            KeyEvent::press(5, b),
            KeyEvent::release(10, a),
            KeyEvent::release(15, b),
        ];
        let m = matcher.match_at(&rolled, 0).unwrap();
        assert_eq!(m.index("x", Release), Some(2));
        assert_eq!(m.index("y", Release), Some(3));
    }

    #[test]
    fn test_scan_resumes_after_anchor() {
        let mut keys = KeyTable::new();
        let a = keys.intern("a");
        let b = keys.intern("b");
        let c = keys.intern("c");
        let d = keys.intern("d");
        let events = vec![
            KeyEvent::press(0, a),
            KeyEvent::press(10, b),
            KeyEvent::release(20, a),
            KeyEvent::release(30, b),
            KeyEvent::press(40, c),
            KeyEvent::press(50, d),
            KeyEvent::release(60, c),
            KeyEvent::release(70, d),
        ];

        let matcher = roll_matcher();
        let mut matches = matcher.matches(&events);

        let first = matches.next().unwrap();
        assert_eq!(first.first_index(), 0);
        assert_eq!(matches.position(), 2);

        let second = matches.next().unwrap();
        assert_eq!(second.first_index(), 4);
        assert!(second.anchor_index() >= first.anchor_index());
        assert!(matches.next().is_none());

        // restart from a saved position
        let resumed: Vec<_> = matcher.matches_from(&events, 2).collect();
        assert_eq!(resumed, vec![second]);
    }

    #[test]
    fn test_window_limited_to_pattern_length() {
        let mut keys = KeyTable::new();
        let a = keys.intern("a");
        let b = keys.intern("b");
        let events = vec![KeyEvent::press(0, a), KeyEvent::press(10, b)];

        let matcher = roll_matcher();
        assert!(matcher.match_at(&events, 0).is_none());
        assert!(matcher.match_at(&events, 5).is_none());
        assert_eq!(matcher.matches(&events).count(), 0);
    }
}
