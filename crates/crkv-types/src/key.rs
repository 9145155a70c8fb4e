use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Path separator for hierarchical keys.
pub const SEPARATOR: char = '/';

/// A normalized hierarchical key such as `/foo/bar`.
///
/// Keys always start with a single `/` and never end with one, except for
/// the root key `/` itself. Hierarchy is a naming convention only; the store
/// treats keys as opaque strings apart from prefix listing.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(String);

impl Key {
    /// Normalize and validate a raw key.
    ///
    /// Leading and trailing separators are trimmed and a single leading `/` is
    /// added back, so `foo/bar/` becomes `/foo/bar`. A string made only of
    /// separators is the root key.
    ///
    /// # Examples
    ///
    /// ```
    /// use crkv_types::Key;
    ///
    /// assert_eq!(Key::new("foo/bar/").unwrap().as_str(), "/foo/bar");
    /// assert!(Key::new("/").unwrap().is_root());
    /// assert!(Key::new("").is_err());
    /// assert!(Key::new("/a//b").is_err());
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TypeError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(TypeError::InvalidKey {
                key: raw.to_string(),
                reason: "key must not be empty".into(),
            });
        }

        let trimmed = raw.trim_matches(SEPARATOR);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        if trimmed.contains("//") {
            return Err(TypeError::InvalidKey {
                key: raw.to_string(),
                reason: "must not contain empty path segments".into(),
            });
        }

        Ok(Self(format!("{SEPARATOR}{trimmed}")))
    }

    /// The root key `/`.
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Returns `true` for the root key `/`.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Key {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Key {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

/// A key paired with its value, as returned by searches and listings.
///
/// Listing results carry keys relative to the listed prefix (`b` for
/// `/a/b` under `/a`), so the key here is a plain string rather than a
/// normalized [`Key`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
