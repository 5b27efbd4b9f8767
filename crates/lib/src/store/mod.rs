//! Content store for built artifacts.
//!
//! Artifacts are immutable files named after their content:
//!
//! ```text
//! public/packed/
//! ├── app-<checksum>.min.css     # combined + minified bundle
//! ├── reset-<checksum>.css       # one file of a non-minified bundle
//! ├── app-err.js                 # error artifact of a failed build
//! ├── cache/                     # downloaded remote sources
//! └── map.json                   # persisted moniker mapping
//! ```
//!
//! The store writes into a single output directory but reads from every
//! `packed/` directory of the configured static roots, so prebuilt artifacts
//! shipped in another root are found without rebuilding.

pub mod paths;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::consts::PACKED_DIR;
use crate::util::hash::Checksum;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
  /// Failed to create the output directory.
  #[error("failed to create directory '{path}': {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Failed to write an artifact.
  #[error("failed to write artifact '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Failed to move a finished artifact into place.
  #[error("failed to persist artifact '{path}': {source}")]
  Persist {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Failed to remove an artifact.
  #[error("failed to remove '{path}': {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A built file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
  /// Absolute location of the file.
  pub path: PathBuf,
  /// File name, e.g. `app-<checksum>.min.css`.
  pub name: String,
}

impl Artifact {
  pub fn new(path: PathBuf) -> Self {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default();
    Self { path, name }
  }

  /// Path relative to a static root, as stored in the mapping file.
  pub fn relative(&self) -> String {
    format!("{}/{}", PACKED_DIR, self.name)
  }

  /// Public URL of the artifact under `base_url`.
  pub fn url(&self, base_url: &str) -> String {
    format!("{}{}", base_url, self.name)
  }

  pub fn read(&self) -> io::Result<String> {
    fs::read_to_string(&self.path)
  }

  pub fn size(&self) -> u64 {
    fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
  }

  fn modified(&self) -> SystemTime {
    fs::metadata(&self.path)
      .and_then(|m| m.modified())
      .unwrap_or(SystemTime::UNIX_EPOCH)
  }
}

/// Matches `<name>-<checksum>[.min].<ext>` artifact file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPattern {
  name: String,
  ext: String,
  min: Option<bool>,
}

impl ArtifactPattern {
  /// Pattern for `name` and `ext`; `min` requires (`Some(true)`), forbids
  /// (`Some(false)`) or ignores (`None`) the `.min` marker.
  pub fn new(name: &str, ext: &str, min: Option<bool>) -> Self {
    Self {
      name: name.to_string(),
      ext: ext.to_string(),
      min,
    }
  }

  pub fn matches(&self, file_name: &str) -> bool {
    let Some(rest) = file_name
      .strip_prefix(self.name.as_str())
      .and_then(|r| r.strip_prefix('-'))
    else {
      return false;
    };
    let Some(middle) = rest
      .strip_suffix(self.ext.as_str())
      .and_then(|r| r.strip_suffix('.'))
    else {
      return false;
    };

    let (hash, is_min) = match middle.strip_suffix(".min") {
      Some(hash) => (hash, true),
      None => (middle, false),
    };

    Checksum::is_checksum(hash) && self.min.is_none_or(|min| min == is_min)
  }
}

/// Filesystem-backed artifact repository.
#[derive(Debug, Clone)]
pub struct ContentStore {
  /// Directory new artifacts are written to. Always the first root.
  out_dir: PathBuf,
  /// Every directory searched for existing artifacts, in lookup order.
  roots: Vec<PathBuf>,
}

impl ContentStore {
  /// Create a store writing to `out_dir` and reading from `out_dir` followed
  /// by the `packed/` directory of every static root.
  pub fn new(out_dir: PathBuf, static_paths: &[PathBuf]) -> Self {
    let mut roots = vec![out_dir.clone()];
    for static_path in static_paths {
      let packed = static_path.join(PACKED_DIR);
      if !roots.contains(&packed) {
        roots.push(packed);
      }
    }
    Self { out_dir, roots }
  }

  pub fn out_dir(&self) -> &Path {
    &self.out_dir
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  /// Find an artifact by exact file name, first root wins.
  pub fn locate(&self, file_name: &str) -> Option<Artifact> {
    self
      .roots
      .iter()
      .map(|root| root.join(file_name))
      .find(|path| path.is_file())
      .map(|path| {
        trace!(path = %path.display(), "located artifact");
        Artifact::new(path)
      })
  }

  /// The most recently modified artifact across all roots matching `pattern`.
  pub fn search(&self, pattern: &ArtifactPattern) -> Option<Artifact> {
    self.search_all(pattern).into_iter().next()
  }

  /// Every artifact across all roots matching `pattern`, newest first.
  pub fn search_all(&self, pattern: &ArtifactPattern) -> Vec<Artifact> {
    let mut found = self.scan(&self.roots, pattern);
    found.sort_by_key(|a| std::cmp::Reverse(a.modified()));
    found
  }

  /// Every artifact in the output directory matching `pattern`.
  pub fn list_out_dir(&self, pattern: &ArtifactPattern) -> Vec<Artifact> {
    let mut found = self.scan(std::slice::from_ref(&self.out_dir), pattern);
    found.sort_by(|a, b| a.name.cmp(&b.name));
    found
  }

  fn scan(&self, roots: &[PathBuf], pattern: &ArtifactPattern) -> Vec<Artifact> {
    let mut found: Vec<Artifact> = Vec::new();
    for root in roots {
      let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
        Err(e) => {
          warn!(root = %root.display(), error = %e, "failed to list artifact directory");
          continue;
        }
      };

      for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
          continue;
        }
        let matched = path
          .file_name()
          .and_then(|n| n.to_str())
          .is_some_and(|n| pattern.matches(n));
        if matched && !found.iter().any(|a| a.path == path) {
          found.push(Artifact::new(path));
        }
      }
    }
    found
  }

  /// Write an artifact from its chunks.
  ///
  /// Chunks are written to a temporary file in the output directory which is
  /// renamed to `file_name` once complete, so readers never observe a partial
  /// artifact.
  pub fn write<I, C>(&self, file_name: &str, chunks: I) -> Result<Artifact, StoreError>
  where
    I: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
  {
    fs::create_dir_all(&self.out_dir).map_err(|e| StoreError::CreateDir {
      path: self.out_dir.clone(),
      source: e,
    })?;

    let path = self.out_dir.join(file_name);
    let write_err = |source| StoreError::Write {
      path: path.clone(),
      source,
    };

    let mut temp = NamedTempFile::new_in(&self.out_dir).map_err(write_err)?;
    for chunk in chunks {
      temp.write_all(chunk.as_ref()).map_err(write_err)?;
    }
    temp.flush().map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o644)).map_err(write_err)?;
    }

    temp.persist(&path).map_err(|e| StoreError::Persist {
      path: path.clone(),
      source: e.error,
    })?;

    debug!(path = %path.display(), "wrote artifact");
    Ok(Artifact::new(path))
  }

  /// Remove an artifact from the output directory.
  ///
  /// Returns `Ok(false)` if there was nothing to remove.
  pub fn delete(&self, file_name: &str) -> Result<bool, StoreError> {
    let path = self.out_dir.join(file_name);
    match fs::remove_file(&path) {
      Ok(()) => {
        debug!(path = %path.display(), "removed artifact");
        Ok(true)
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(StoreError::Remove { path, source: e }),
    }
  }
}
