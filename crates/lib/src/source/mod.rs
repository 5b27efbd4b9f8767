//! Source resolution.
//!
//! A declared source reference is one of:
//! - a local path, searched under the source and static roots
//! - a glob pattern such as `js/*.js`, expanded when the bundle is declared
//! - a remote URL, downloaded once into the fetch cache
//!
//! # Modules
//!
//! - [`fetch`] - scheme handlers and the download cache
//! - [`glob`] - wildcard expansion against search roots
//! - [`resolve`] - the memoizing [`SourceResolver`]

pub mod fetch;
pub mod glob;
pub mod resolve;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use resolve::SourceResolver;

/// Errors that can occur while materializing a source.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// The reference exists neither locally nor remotely.
  #[error("could not find source '{reference}' (searched: {searched:?})")]
  NotFound { reference: String, searched: Vec<PathBuf> },

  /// The URL scheme has no handler.
  #[error("unsupported scheme '{scheme}' in '{reference}'")]
  UnsupportedScheme { reference: String, scheme: String },

  /// The HTTP request could not be completed.
  #[error("fetch failed for {url}: {message}")]
  Fetch { url: String, message: String },

  /// The server answered with a non-success status.
  #[error("fetch failed for {url}: HTTP {status}")]
  HttpStatus { url: String, status: u16 },

  /// Failed to create the download cache directory.
  #[error("failed to create cache directory '{0}': {1}")]
  CreateCacheDir(PathBuf, #[source] io::Error),

  /// Failed to write a downloaded body to the cache.
  #[error("failed to write cache file '{path}': {source}")]
  WriteCache {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The source exists but could not be read as text.
  #[error("failed to read source '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A materialized source: its original reference and a readable local file.
///
/// Content is read on demand, so a memoized `Source` always reflects the
/// current file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
  reference: String,
  path: PathBuf,
  remote: bool,
}

impl Source {
  pub fn local(reference: impl Into<String>, path: PathBuf) -> Self {
    Self {
      reference: reference.into(),
      path,
      remote: false,
    }
  }

  pub fn remote(reference: impl Into<String>, path: PathBuf) -> Self {
    Self {
      reference: reference.into(),
      path,
      remote: true,
    }
  }

  /// The reference as declared.
  pub fn reference(&self) -> &str {
    &self.reference
  }

  /// Local file holding the content (the download cache file for URLs).
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn is_remote(&self) -> bool {
    self.remote
  }

  /// Extension selecting the transform, e.g. `scss`.
  pub fn ext(&self) -> &str {
    self.path.extension().and_then(|e| e.to_str()).unwrap_or("")
  }

  pub fn read(&self) -> Result<String, ResolveError> {
    fs::read_to_string(&self.path).map_err(|e| ResolveError::Read {
      path: self.path.clone(),
      source: e,
    })
  }
}

/// Artifact name prefix for a reference: the file stem of its last path
/// segment with anything outside `[A-Za-z0-9_.-]` replaced by `_`.
pub fn reference_stem(reference: &str) -> String {
  let last = reference
    .split(['?', '#'])
    .next()
    .unwrap_or(reference)
    .trim_end_matches('/')
    .rsplit('/')
    .next()
    .unwrap_or("");
  let stem = Path::new(last).file_stem().and_then(|s| s.to_str()).unwrap_or("");
  let sanitized: String = stem
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
        c
      } else {
        '_'
      }
    })
    .collect();
  if sanitized.is_empty() {
    "source".to_string()
  } else {
    sanitized
  }
}
