// THEORY:
// The `input` module is the engine's only window onto physical input devices. Device
// reading and synthetic event emission live outside the core, behind the `InputPort`
// trait. The core never receives callbacks. Instead the frame loop polls one
// `KeySnapshot` per frame and diffs it against the previous one, so key handling is
// single-threaded and never re-enters the loop.

use crate::core_modules::geometry::Point;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

/// A key or button name, normalised to lowercase (e.g. `"capslock"`, `"f1"`, `"mouse4"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(from = "String")]
pub struct KeyCode(String);

impl KeyCode {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for KeyCode {
    fn from(name: String) -> Self {
        KeyCode::new(name)
    }
}

impl From<&str> for KeyCode {
    fn from(name: &str) -> Self {
        KeyCode::new(name)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single edge in a key's state between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub key: KeyCode,
    /// True if the key went down, false if it was released.
    pub pressed: bool,
}

/// The set of keys held down at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    pressed: BTreeSet<KeyCode>,
}

impl KeySnapshot {
    pub fn new(pressed: impl IntoIterator<Item = KeyCode>) -> Self {
        Self {
            pressed: pressed.into_iter().collect(),
        }
    }

    pub fn is_pressed(&self, key: &KeyCode) -> bool {
        self.pressed.contains(key)
    }

    /// Every key whose state differs from `previous`, ordered by key name. A key that
    /// was never seen before and is now down counts as a press.
    pub fn diff(&self, previous: &KeySnapshot) -> Vec<KeyChange> {
        self.pressed
            .symmetric_difference(&previous.pressed)
            .map(|key| KeyChange {
                key: key.clone(),
                pressed: self.pressed.contains(key),
            })
            .collect()
    }
}

/// The narrow, synchronous interface to input devices.
pub trait InputPort {
    /// Reads the current key state. Called once per frame.
    fn poll_keys(&mut self) -> KeySnapshot;

    /// True while the configured activation control is held.
    fn is_activation_held(&self, control: &KeyCode) -> bool;

    /// Moves the pointer by `delta` device units. Implementations truncate toward zero.
    fn move_relative(&mut self, delta: Point);

    /// A single press-then-release of the fire button.
    fn fire_once(&mut self);
}


#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(keys: &[&str]) -> KeySnapshot {
        KeySnapshot::new(keys.iter().map(|k| KeyCode::new(k)))
    }

    #[test]
    fn key_codes_are_normalised() {
        assert_eq!(KeyCode::new(" CapsLock "), KeyCode::new("capslock"));
        assert_eq!(KeyCode::from("F1").as_str(), "f1");
    }

    #[test]
    fn diff_reports_presses_and_releases_in_key_order() {
        let before = snapshot(&["f1", "w"]);
        let after = snapshot(&["w", "f3", "a"]);
        let changes = after.diff(&before);
        assert_eq!(
            changes,
            vec![
                KeyChange { key: KeyCode::new("a"), pressed: true },
                KeyChange { key: KeyCode::new("f1"), pressed: false },
                KeyChange { key: KeyCode::new("f3"), pressed: true },
            ]
        );
    }

    #[test]
    fn unchanged_snapshot_has_no_changes() {
        let s = snapshot(&["f1"]);
        assert!(s.diff(&s.clone()).is_empty());
        assert!(KeySnapshot::default().diff(&KeySnapshot::default()).is_empty());
    }

    #[test]
    fn first_sighting_of_a_held_key_is_a_press() {
        let changes = snapshot(&["f2"]).diff(&KeySnapshot::default());
        assert_eq!(changes.len(), 1);
        assert!(changes[0].pressed);
    }
}
