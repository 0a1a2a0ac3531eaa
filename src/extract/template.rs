// Tap-hold chord template
// Roles and slot layout of the chord shape training examples are cut from

use crate::events::Direction::{Press, Release};
use crate::pattern::{PatternError, PatternSpec, Slot};

/// Roles of a tap-hold candidate chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordRole {
    /// Unrelated key held from before the chord, released before the tap-hold press
    Filler,

    /// Key typed right before the tap-hold key
    Prev,

    /// The key that may be a tap or a hold
    TapHold,

    /// Key pressed while the tap-hold key is down
    Next,

    /// First key pressed after the next key
    Trailing,
}

/// The chord template, anchored on the tap-hold press
///
/// ```text
/// filler↑? prev↓ filler↑? prev↑ filler↑? taphold↓ prev↑ next↓ trailing↓
/// taphold↑ trailing↓ next↑ trailing↓ taphold↑ trailing↓
/// ```
///
/// Repeated entries are alternative positions: prev may be released before or
/// after the tap-hold press, the tap-hold key before or after the next key,
/// and the trailing press may land anywhere after the next press.
pub fn tap_hold_template() -> Result<PatternSpec<ChordRole>, PatternError> {
    use ChordRole::*;

    PatternSpec::new(
        vec![
            Slot::wildcard(Filler, Release),
            Slot::introduces(Prev, Press),
            Slot::wildcard(Filler, Release),
            Slot::same_key(Prev, Release),
            Slot::wildcard(Filler, Release),
            Slot::introduces(TapHold, Press),
            Slot::same_key(Prev, Release),
            Slot::introduces(Next, Press),
            Slot::introduces(Trailing, Press),
            Slot::same_key(TapHold, Release),
            Slot::introduces(Trailing, Press),
            Slot::same_key(Next, Release),
            Slot::introduces(Trailing, Press),
            Slot::same_key(TapHold, Release),
            Slot::introduces(Trailing, Press),
        ],
        TapHold,
    )
}
