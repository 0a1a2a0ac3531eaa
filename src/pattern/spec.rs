// Pattern templates
// Declarative slot lists describing ordered, key-linked press/release sequences

use std::fmt::Debug;
use thiserror::Error;

use crate::events::Direction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("Pattern has no slots")]
    Empty,

    #[error("Pattern has only wildcard slots")]
    OnlyWildcards,

    #[error("Slot {slot} refers to role {role} before it is introduced")]
    UnboundRole { slot: usize, role: String },

    #[error("Anchor role {0} is never introduced")]
    AnchorNotIntroduced(String),
}

/// How a slot constrains the key of the event it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding<R> {
    /// Binds the label to whatever key occurs here
    Introduces(R),

    /// Must be the key previously bound to the label
    SameKeyAs(R),

    /// Any key not bound to a role; may also match nothing
    Wildcard,
}

/// One position of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<R> {
    pub role: R,
    pub direction: Direction,
    pub binding: Binding<R>,
}

impl<R: Copy + Eq + Debug> Slot<R> {
    /// Press or release that binds `role` to its key
    pub fn introduces(role: R, direction: Direction) -> Self {
        Slot {
            role,
            direction,
            binding: Binding::Introduces(role),
        }
    }

    /// Press or release of the key bound to `role`
    pub fn same_key(role: R, direction: Direction) -> Self {
        Slot {
            role,
            direction,
            binding: Binding::SameKeyAs(role),
        }
    }

    pub fn wildcard(role: R, direction: Direction) -> Self {
        Slot {
            role,
            direction,
            binding: Binding::Wildcard,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.binding, Binding::Wildcard)
    }

    /// The `(role, direction)` this slot fills in a match
    pub fn pair(&self) -> (R, Direction) {
        (self.role, self.direction)
    }
}

/// A validated template plus the role whose index decides where scanning resumes
///
/// A non-wildcard `(role, direction)` listed in several slots is one event
/// with alternative positions: it binds at the first of them that fits.
#[derive(Debug, Clone)]
pub struct PatternSpec<R> {
    slots: Vec<Slot<R>>,
    anchor: (R, Direction),
    required: Vec<(R, Direction)>,
}

impl<R: Copy + Eq + Debug> PatternSpec<R> {
    pub fn new(slots: Vec<Slot<R>>, anchor: R) -> Result<Self, PatternError> {
        if slots.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut introduced: Vec<R> = Vec::new();
        let mut required: Vec<(R, Direction)> = Vec::new();

        for (i, slot) in slots.iter().enumerate() {
            match slot.binding {
                Binding::Introduces(label) => {
                    if !introduced.contains(&label) {
                        introduced.push(label);
                    }
                }
                Binding::SameKeyAs(label) => {
                    if !introduced.contains(&label) {
                        return Err(PatternError::UnboundRole {
                            slot: i,
                            role: format!("{:?}", label),
                        });
                    }
                }
                Binding::Wildcard => continue,
            }

            if !required.contains(&slot.pair()) {
                required.push(slot.pair());
            }
        }

        if required.is_empty() {
            return Err(PatternError::OnlyWildcards);
        }

        let anchor = slots
            .iter()
            .find(|s| s.binding == Binding::Introduces(anchor))
            .map(|s| s.pair())
            .ok_or_else(|| PatternError::AnchorNotIntroduced(format!("{:?}", anchor)))?;

        Ok(PatternSpec {
            slots,
            anchor,
            required,
        })
    }

    pub fn slots(&self) -> &[Slot<R>] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Role and direction whose matched index is the resume point
    pub fn anchor(&self) -> (R, Direction) {
        self.anchor
    }

    /// Distinct `(role, direction)` pairs every match must bind
    pub fn required(&self) -> &[(R, Direction)] {
        &self.required
    }

    /// Whether the required pair of slot `slot` appears again after index `after`
    pub fn has_alternative_after(&self, slot: usize, after: usize) -> bool {
        let pair = self.slots[slot].pair();
        self.slots
            .iter()
            .skip(after + 1)
            .any(|s| !s.is_wildcard() && s.pair() == pair)
    }
}
