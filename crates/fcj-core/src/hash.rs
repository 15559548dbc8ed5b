//! Snapshot identifiers for working-copy states.
//!
//! A [`Hash`] names the source-control snapshot a working copy is based
//! on. The journal never inspects hash contents: it compares them for
//! equality, chains consecutive checkout transitions, and prints them in
//! log lines. The reserved [`Hash::ZERO`] value stands for "no checkout
//! recorded yet".

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Width of a snapshot identifier, matching source-control revision hashes.
pub const HASH_LEN: usize = 20;

/// An opaque identifier for a source-control snapshot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// The reserved value of a journal that has not seen a checkout.
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    /// Wrap raw revision-hash bytes.
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Hash(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Whether this is the reserved pre-checkout value.
    pub fn is_zero(&self) -> bool {
        *self == Hash::ZERO
    }

    /// Derive a stable identifier from a revision name.
    ///
    /// The daemon receives real hashes from the checkout engine; tests and
    /// tools use this to fabricate them from names like `"rev-1"`.
    pub fn for_rev(rev: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(rev.as_ref());
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(&digest[..HASH_LEN]);
        Hash(bytes)
    }

    /// Abbreviated form for log lines and status output.
    pub fn short(&self) -> String {
        let mut out = String::with_capacity(8);
        for byte in &self.0[..4] {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::ZERO
    }
}
