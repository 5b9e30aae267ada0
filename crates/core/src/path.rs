//! Logical paths used by the tree index.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A clean, absolute, slash-separated path (e.g. `/backups/2018/db`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathName(String);

impl PathName {
    /// Validate a path. A single trailing slash is dropped.
    pub fn new(path: impl Into<String>) -> DomainResult<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(DomainError::invalid_path(format!("{path}: must be absolute")));
        }
        if path == "/" {
            return Ok(Self(path));
        }

        let trimmed = path.strip_suffix('/').unwrap_or(&path);
        for segment in trimmed[1..].split('/') {
            match segment {
                "" => {
                    return Err(DomainError::invalid_path(format!("{path}: empty segment")));
                }
                "." | ".." => {
                    return Err(DomainError::invalid_path(format!(
                        "{path}: relative segment '{segment}'"
                    )));
                }
                _ => {}
            }
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }
}

impl fmt::Display for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PathName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PathName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PathName> for String {
    fn from(value: PathName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_clean_absolute_paths() {
        assert_eq!(PathName::new("/").unwrap().as_str(), "/");
        assert!(PathName::new("/").unwrap().is_root());
        assert_eq!(PathName::new("/a/b").unwrap().as_str(), "/a/b");
        assert_eq!(PathName::new("/a/b/").unwrap().as_str(), "/a/b");
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "a/b", "/a//b", "/a/./b", "/a/../b", "//"] {
            assert!(
                matches!(PathName::new(bad), Err(DomainError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: validation is idempotent on accepted paths.
            #[test]
            fn normalization_is_idempotent(segments in proptest::collection::vec("[a-z0-9_-]{1,8}", 1..6)) {
                let raw = format!("/{}/", segments.join("/"));
                let path = PathName::new(raw).unwrap();
                let again = PathName::new(path.as_str()).unwrap();
                prop_assert_eq!(path, again);
            }
        }
    }
}
