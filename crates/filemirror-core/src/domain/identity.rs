//! Identity keys for mirrored files
//!
//! An [`IdentityKey`] names one logical source file across cycles. In the
//! qualified scheme it is `parent@inode@target`, which stays stable when a
//! file is renamed inside its directory (log rotation keeps the inode) but
//! changes when the file is copied. The key is also the file name used in
//! the flat target directory.
//!
//! Inode numbers can be reused by the filesystem after a delete, so two
//! unrelated files may collide. This is a known limitation.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Separator between key components
pub const KEY_SEPARATOR: char = '@';

// ============================================================================
// IdentityKey
// ============================================================================

/// Stable identifier of a mirrored file, doubling as its target file name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Derive the qualified key `parent@inode@target_name`.
    ///
    /// Total and deterministic: the same inputs give the same key in every
    /// process.
    #[must_use]
    pub fn derive(parent_dir_name: &str, inode: u64, target_file_name: &str) -> Self {
        Self(format!(
            "{parent_dir_name}{KEY_SEPARATOR}{inode}{KEY_SEPARATOR}{target_file_name}"
        ))
    }

    /// Plain key: just the target file name.
    #[must_use]
    pub fn plain(target_file_name: &str) -> Self {
        Self(target_file_name.to_string())
    }

    /// Wrap an existing target-side file name.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidKey`] if the name is empty or contains a
    /// path separator, since keys must live in a flat directory.
    pub fn from_file_name(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() || name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            return Err(DomainError::InvalidKey(name));
        }
        Ok(Self(name))
    }

    /// Borrow the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key passes a prefix filter.
    ///
    /// An empty filter admits everything, as does an empty-string prefix
    /// (which is what splitting an empty `--file-key-pats` value produces).
    #[must_use]
    pub fn matches_any_prefix(&self, prefixes: &[String]) -> bool {
        prefixes.is_empty() || prefixes.iter().any(|p| self.0.starts_with(p.as_str()))
    }
}

impl Display for IdentityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// KeyScheme
// ============================================================================

/// How identity keys are derived from source entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    /// `parent@inode@target_name`
    #[default]
    Qualified,
    /// `target_name` only; every source file maps onto one target file
    Plain,
}

impl KeyScheme {
    /// Derive a key under this scheme
    #[must_use]
    pub fn key_for(self, parent_dir_name: &str, inode: u64, target_file_name: &str) -> IdentityKey {
        match self {
            Self::Qualified => IdentityKey::derive(parent_dir_name, inode, target_file_name),
            Self::Plain => IdentityKey::plain(target_file_name),
        }
    }
}

impl Display for KeyScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualified => write!(f, "qualified"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

impl FromStr for KeyScheme {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qualified" => Ok(Self::Qualified),
            "plain" => Ok(Self::Plain),
            other => Err(DomainError::UnknownVariant {
                kind: "key scheme",
                value: other.to_string(),
            }),
        }
    }
}
