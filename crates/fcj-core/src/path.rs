//! Mount-relative paths recorded by the journal.
//!
//! A [`RelPath`] is a normalized, forward-slash separated path relative to
//! the mount root. Paths are compared bytewise, so ordering is stable across
//! platforms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from validating a mount-relative path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path is absolute: {0:?}")]
    Absolute(String),

    #[error("invalid component {component:?} in path {path:?}")]
    InvalidComponent { path: String, component: String },
}

/// A normalized path relative to the mount root.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelPath(String);

impl RelPath {
    /// Validate and wrap a path.
    ///
    /// Rejects empty paths, absolute paths, and paths containing empty,
    /// `.`, or `..` components.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        if path.starts_with('/') {
            return Err(PathError::Absolute(path));
        }
        for component in path.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(PathError::InvalidComponent {
                    component: component.to_string(),
                    path: path.clone(),
                });
            }
        }
        Ok(RelPath(path))
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Heap bytes owned by this path, for memory accounting.
    pub fn heap_bytes(&self) -> usize {
        self.0.len()
    }
}

impl FromStr for RelPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelPath::new(s)
    }
}

impl fmt::Debug for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelPath({:?})", self.0)
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_normalized_paths() {
        assert!(RelPath::new("a").is_ok());
        assert!(RelPath::new("src/lib.rs").is_ok());
        assert!(RelPath::new("dir with spaces/file").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(RelPath::new(""), Err(PathError::Empty));
    }

    #[test]
    fn test_rejects_absolute() {
        assert!(matches!(RelPath::new("/etc/passwd"), Err(PathError::Absolute(_))));
    }

    #[test]
    fn test_rejects_dot_components() {
        for bad in ["./a", "a/./b", "a/../b", "a//b", "a/"] {
            assert!(
                matches!(RelPath::new(bad), Err(PathError::InvalidComponent { .. })),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_bytewise_ordering() {
        let a: RelPath = "a/b".parse().unwrap();
        let b: RelPath = "a/c".parse().unwrap();
        let c: RelPath = "a0".parse().unwrap();
        assert!(a < b);
        // '/' (0x2f) sorts before '0' (0x30)
        assert!(a < c);
    }

    #[test]
    fn test_heap_bytes_tracks_length() {
        let short: RelPath = "a".parse().unwrap();
        let long: RelPath = "a/much/longer/path".parse().unwrap();
        assert!(long.heap_bytes() > short.heap_bytes());
    }
}
