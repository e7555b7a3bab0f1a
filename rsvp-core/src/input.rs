use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalised key identifier. Comparison is case-insensitive and a literal
/// `" "` is the same key as `"space"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key(String);

impl Key {
    pub fn new(name: &str) -> Self {
        if !name.is_empty() && name.chars().all(char::is_whitespace) {
            return Self::space();
        }
        let lower = name.trim().to_lowercase();
        match lower.as_str() {
            "spacebar" => Self::space(),
            _ => Self(lower),
        }
    }

    pub fn space() -> Self {
        Self("space".to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::space()
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::new(&s)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::new(s)
    }
}

impl From<Key> for String {
    fn from(k: Key) -> Self {
        k.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One key-down event from the keyboard source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    /// Auto-repeat from a held key.
    pub repeat: bool,
}

impl KeyEvent {
    pub fn press(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            repeat: false,
        }
    }

    pub fn held(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            repeat: true,
        }
    }
}
