// Pattern matching module
// Templates of role-linked press/release slots and the stream scanner that finds them

pub mod matcher;
pub mod spec;

pub use matcher::{MatchResult, Matches, PatternMatcher, RoleBinding};
pub use spec::{Binding, PatternError, PatternSpec, Slot};
