//! Snapshot version tags.
//!
//! This module provides [`Version`], the caller-supplied tag attached to
//! every published snapshot. The store never orders versions; it only
//! compares them for equality to decide whether a watcher has seen a change.

use std::fmt;

/// Opaque version tag of a snapshot.
///
/// An empty version is valid and means "no version supplied".
///
/// # Example
///
/// ```rust
/// use snapstore_core::Version;
///
/// let v1 = Version::new("1");
/// let v2: Version = "2".into();
///
/// assert_ne!(v1, v2);
/// assert_eq!(v1, "1");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    /// Create a new version from a string.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Check if the version is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&Version> for Version {
    fn from(v: &Version) -> Self {
        v.clone()
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Version {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
