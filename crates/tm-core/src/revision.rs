//! Strongly-typed revision identifier.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Number of hex digits in a generated revision id.
const GENERATED_LEN: usize = 12;

/// Opaque token naming one migration step.
///
/// Revisions are restricted to ASCII alphanumerics so that the id is always an
/// unambiguous leading token in a `<revision>_<slug>.yml` file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionId(String);

impl RevisionId {
    /// Try to create a new `RevisionId`, returning `None` if the token is empty
    /// or contains anything other than ASCII letters and digits.
    pub fn try_new(id: impl Into<String>) -> Option<Self> {
        let s = id.into();
        if is_valid_revision(&s) {
            Some(Self(s))
        } else {
            None
        }
    }

    /// Generate a fresh random revision id (12 lowercase hex digits).
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(hex[hex.len() - GENERATED_LEN..].to_string())
    }

    /// Return the underlying id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Check whether `s` is usable as a revision id.
pub fn is_valid_revision(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RevisionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for RevisionId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RevisionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RevisionId {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_valid_revision(&s) {
            Ok(Self(s))
        } else {
            Err(format!(
                "invalid revision '{s}': must be a non-empty ASCII alphanumeric token"
            ))
        }
    }
}

impl TryFrom<&str> for RevisionId {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::try_from(s.to_string())
    }
}

impl From<RevisionId> for String {
    fn from(id: RevisionId) -> Self {
        id.0
    }
}

impl PartialEq<str> for RevisionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RevisionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_accepts_alphanumeric() {
        let id = RevisionId::try_new("ae1027a6acf").unwrap();
        assert_eq!(id.as_str(), "ae1027a6acf");
        assert_eq!(format!("{}", id), "ae1027a6acf");
    }

    #[test]
    fn test_revision_rejects_separators() {
        assert!(RevisionId::try_new("").is_none());
        assert!(RevisionId::try_new("abc_def").is_none());
        assert!(RevisionId::try_new("abc-def").is_none());
        assert!(RevisionId::try_new("abc def").is_none());
    }

    #[test]
    fn test_generated_revision_shape() {
        let a = RevisionId::generate();
        let b = RevisionId::generate();
        assert_eq!(a.len(), GENERATED_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_revision_deserialize_validates() {
        let ok: RevisionId = serde_yaml::from_str("abc123").unwrap();
        assert_eq!(ok, "abc123");
        let err = serde_yaml::from_str::<RevisionId>("abc_123");
        assert!(err.is_err());
    }

    #[test]
    fn test_revision_borrow_lookup() {
        use std::collections::HashMap;
        let mut map: HashMap<RevisionId, i32> = HashMap::new();
        map.insert(RevisionId::try_new("a1").unwrap(), 1);
        assert_eq!(map.get("a1"), Some(&1));
    }
}
