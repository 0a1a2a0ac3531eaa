// Key identity and classification
// Interned key ids, modifier / main-area key sets and their resolved flags

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Interned key identifier
/// Only meaningful together with the `KeyTable` that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyId(u32);

impl KeyId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Normalize a raw key name (lowercase, trimmed)
pub fn normalize_key_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Key name interner
/// Shared across sessions so that statistics keyed by `KeyId` can be merged
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    names: Vec<String>,
    ids: HashMap<String, KeyId>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a key name, normalizing it first
    pub fn intern(&mut self, raw: &str) -> KeyId {
        let name = normalize_key_name(raw);
        if let Some(id) = self.ids.get(&name) {
            return *id;
        }

        let id = KeyId(self.names.len() as u32);
        self.names.push(name.clone());
        self.ids.insert(name, id);
        id
    }

    /// Look up an already interned key
    pub fn get(&self, raw: &str) -> Option<KeyId> {
        self.ids.get(&normalize_key_name(raw)).copied()
    }

    /// Name of an interned key
    /// Ids from a different table render as `?`
    pub fn name(&self, id: KeyId) -> &str {
        self.names.get(id.index()).map(String::as_str).unwrap_or("?")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Sort key ids by their names
    pub fn sort_by_name(&self, ids: &mut [KeyId]) {
        ids.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
    }

    /// Join key names with a single space
    pub fn join_names(&self, ids: &[KeyId]) -> String {
        ids.iter()
            .map(|id| self.name(*id))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Named key sets used to classify keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyClasses {
    /// Modifier keys (shift, ctrl, alt, cmd and their sided variants)
    pub modifiers: BTreeSet<String>,

    /// Keys of the main typing area, plausible shortcut targets
    pub main_area: BTreeSet<String>,

    /// A lone modifier that does not count as a co-occurrence
    /// when held with a single other key (shift + letter is just typing)
    pub co_occurrence_exempt: Option<String>,
}

impl Default for KeyClasses {
    fn default() -> Self {
        let modifiers = [
            "alt", "alt_gr", "alt_l", "alt_r", "cmd", "cmd_r", "ctrl", "ctrl_l", "ctrl_r",
            "shift", "shift_r",
        ];

        KeyClasses {
            modifiers: modifiers.iter().map(|s| s.to_string()).collect(),
            main_area: "abcdefghijklmnopqrstuvwxyzäöüß,.-<"
                .chars()
                .map(|c| c.to_string())
                .collect(),
            co_occurrence_exempt: Some("shift".to_string()),
        }
    }
}

impl KeyClasses {
    pub fn is_modifier_name(&self, name: &str) -> bool {
        contains_normalized(&self.modifiers, &normalize_key_name(name))
    }

    pub fn is_main_area_name(&self, name: &str) -> bool {
        contains_normalized(&self.main_area, &normalize_key_name(name))
    }

    /// Resolve the name sets against every key interned so far
    /// Configured names are normalized the same way interned names are
    pub fn resolve(&self, keys: &KeyTable) -> KeyFlags {
        let modifiers = normalized(&self.modifiers);
        let main_areas = normalized(&self.main_area);

        let mut modifier = Vec::with_capacity(keys.len());
        let mut main_area = Vec::with_capacity(keys.len());

        for name in &keys.names {
            modifier.push(modifiers.contains(name));
            main_area.push(main_areas.contains(name));
        }

        KeyFlags {
            modifier,
            main_area,
            co_occurrence_exempt: self
                .co_occurrence_exempt
                .as_deref()
                .and_then(|name| keys.get(name)),
        }
    }
}

fn normalized(names: &BTreeSet<String>) -> BTreeSet<String> {
    names.iter().map(|n| normalize_key_name(n)).collect()
}

fn contains_normalized(names: &BTreeSet<String>, name: &str) -> bool {
    names.contains(name) || names.iter().any(|n| normalize_key_name(n) == name)
}

/// Per-key predicates resolved from `KeyClasses`
/// Immutable once built; keys unknown to the table are neither modifier nor main-area
#[derive(Debug, Clone, Default)]
pub struct KeyFlags {
    modifier: Vec<bool>,
    main_area: Vec<bool>,
    co_occurrence_exempt: Option<KeyId>,
}

impl KeyFlags {
    pub fn is_modifier(&self, key: KeyId) -> bool {
        self.modifier.get(key.index()).copied().unwrap_or(false)
    }

    pub fn is_main_area(&self, key: KeyId) -> bool {
        self.main_area.get(key.index()).copied().unwrap_or(false)
    }

    pub fn co_occurrence_exempt(&self) -> Option<KeyId> {
        self.co_occurrence_exempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_normalizes_and_dedups() {
        let mut keys = KeyTable::new();
        let a = keys.intern("A");
        let b = keys.intern(" a ");
        let shift = keys.intern("shift");

        assert_eq!(a, b);
        assert_ne!(a, shift);
        assert_eq!(keys.name(a), "a");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("SHIFT"), Some(shift));
        assert_eq!(keys.get("ctrl"), None);
    }

    #[test]
    fn test_join_names_sorted() {
        let mut keys = KeyTable::new();
        let mut ids = vec![keys.intern("shift"), keys.intern("ctrl"), keys.intern("a")];
        keys.sort_by_name(&mut ids);
        assert_eq!(keys.join_names(&ids), "a ctrl shift");
    }

    #[test]
    fn test_default_classes() {
        let classes = KeyClasses::default();
        assert!(classes.is_modifier_name("Shift_R"));
        assert!(!classes.is_modifier_name("space"));
        assert!(classes.is_main_area_name("ß"));
        assert!(classes.is_main_area_name(","));
        assert!(!classes.is_main_area_name("space"));
        assert!(!classes.is_main_area_name("backspace"));
    }

    #[test]
    fn test_resolve_flags() {
        let mut keys = KeyTable::new();
        let a = keys.intern("a");
        let ctrl = keys.intern("ctrl");
        let space = keys.intern("space");

        let flags = KeyClasses::default().resolve(&keys);
        assert!(flags.is_modifier(ctrl));
        assert!(!flags.is_modifier(a));
        assert!(flags.is_main_area(a));
        assert!(!flags.is_main_area(space));
        // shift was never interned
        assert_eq!(flags.co_occurrence_exempt(), None);

        let shift = keys.intern("shift");
        let flags = KeyClasses::default().resolve(&keys);
        assert_eq!(flags.co_occurrence_exempt(), Some(shift));
    }

    #[test]
    fn test_custom_classes_substitute() {
        let mut keys = KeyTable::new();
        let caps = keys.intern("caps_lock");

        let mut classes = KeyClasses::default();
        classes.modifiers.insert("caps_lock".to_string());

        assert!(classes.resolve(&keys).is_modifier(caps));
        assert!(!KeyClasses::default().resolve(&keys).is_modifier(caps));
    }

    #[test]
    fn test_classes_deserialize_partial() {
        let classes: KeyClasses = serde_json::from_str(r#"{"modifiers": ["fn"]}"#).unwrap();
        assert!(classes.is_modifier_name("fn"));
        assert!(!classes.is_modifier_name("shift"));
        assert!(classes.is_main_area_name("a"));
    }

    #[test]
    fn test_mixed_case_class_names() {
        let classes: KeyClasses =
            serde_json::from_str(r#"{"modifiers": ["Shift", " Ctrl "], "main_area": ["A"]}"#).unwrap();
        assert!(classes.is_modifier_name("shift"));
        assert!(classes.is_modifier_name("CTRL"));
        assert!(classes.is_main_area_name("a"));

        let mut keys = KeyTable::new();
        let shift = keys.intern("Shift");
        let ctrl = keys.intern("ctrl");
        let a = keys.intern("a");
        let flags = classes.resolve(&keys);
        assert!(flags.is_modifier(shift));
        assert!(flags.is_modifier(ctrl));
        assert!(flags.is_main_area(a));
    }
}
