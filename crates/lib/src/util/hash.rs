//! Hashing utilities for content-addressed artifacts.
//!
//! This module provides:
//! - `Checksum`: a 32-character truncated SHA-256 used in artifact filenames
//! - `hash_bytes()`: arbitrary byte hashing
//! - `Checksum::combine()`: the digest-of-digests used for multi-source bundles

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::CHECKSUM_LEN;

/// A content checksum identifying a source or a bundle.
///
/// The checksum is the first 32 characters of a lowercase hex SHA-256. It is
/// long enough to be collision resistant for cache keys and matches the
/// `<name>-<checksum>` artifact naming scheme.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Checksum(pub String);

impl fmt::Display for Checksum {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Checksum {
  /// Combine several checksums into one.
  ///
  /// A single checksum combines to itself. Otherwise the result is the hash of
  /// every member digest in order, each terminated by a newline, so both the
  /// set of inputs and their order determine the result.
  pub fn combine(parts: &[Checksum]) -> Checksum {
    if let [single] = parts {
      return single.clone();
    }

    let mut hasher = Sha256::new();
    for part in parts {
      hasher.update(part.0.as_bytes());
      hasher.update(b"\n");
    }
    truncate(hex::encode(hasher.finalize()))
  }

  /// Whether `s` has the shape of a checksum (32 lowercase hex characters).
  pub fn is_checksum(s: &str) -> bool {
    s.len() == CHECKSUM_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> Checksum {
  let mut hasher = Sha256::new();
  hasher.update(data);
  truncate(hex::encode(hasher.finalize()))
}

fn truncate(mut full: String) -> Checksum {
  full.truncate(CHECKSUM_LEN);
  Checksum(full)
}
