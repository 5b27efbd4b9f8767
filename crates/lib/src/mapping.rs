//! Persisted moniker to artifact mapping.
//!
//! Each artifact directory may hold a `map.json` recording which artifacts
//! every moniker was last built into, per mode:
//!
//! ```json
//! {
//!   "normal": { "app.css": ["packed/reset-<checksum>.css", "packed/app-<checksum>.css"] },
//!   "min": { "app.css": ["packed/app-<checksum>.min.css"] }
//! }
//! ```
//!
//! A process that starts without building (or whose build fails) can serve
//! the recorded artifacts instead.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::MAP_FILENAME;

/// Errors that can occur while reading or writing a mapping file.
#[derive(Debug, Error)]
pub enum MappingError {
  #[error("failed to read mapping '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse mapping '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize mapping: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write mapping '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Which section of the mapping a build belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
  Normal,
  Min,
}

impl MappingMode {
  pub fn from_minify(minify: bool) -> Self {
    if minify { MappingMode::Min } else { MappingMode::Normal }
  }
}

/// Moniker to artifact paths (`packed/<file>`), in serving order.
pub type Section = BTreeMap<String, Vec<String>>;

/// Contents of a `map.json` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingFile {
  pub normal: Section,
  pub min: Section,
}

impl MappingFile {
  pub fn section(&self, mode: MappingMode) -> &Section {
    match mode {
      MappingMode::Normal => &self.normal,
      MappingMode::Min => &self.min,
    }
  }

  pub fn section_mut(&mut self, mode: MappingMode) -> &mut Section {
    match mode {
      MappingMode::Normal => &mut self.normal,
      MappingMode::Min => &mut self.min,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.normal.is_empty() && self.min.is_empty()
  }

  /// Add entries from `other` for monikers not present yet.
  fn merge_missing(&mut self, other: MappingFile) {
    for mode in [MappingMode::Normal, MappingMode::Min] {
      let section = self.section_mut(mode);
      for (moniker, paths) in other.section(mode) {
        section.entry(moniker.clone()).or_insert_with(|| paths.clone());
      }
    }
  }
}

/// Reads and writes `map.json` files.
#[derive(Debug, Clone)]
pub struct MappingStore {
  /// Directory the mapping is saved to.
  out_dir: PathBuf,
  /// Directories mappings are loaded from, in priority order.
  roots: Vec<PathBuf>,
}

impl MappingStore {
  pub fn new(out_dir: PathBuf, roots: Vec<PathBuf>) -> Self {
    Self { out_dir, roots }
  }

  pub fn path(&self) -> PathBuf {
    self.out_dir.join(MAP_FILENAME)
  }

  /// Read one mapping file. A missing or empty file is an empty mapping.
  pub fn read(path: &Path) -> Result<MappingFile, MappingError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(MappingFile::default()),
      Err(e) => {
        return Err(MappingError::Read {
          path: path.to_path_buf(),
          source: e,
        });
      }
    };
    if content.trim().is_empty() {
      return Ok(MappingFile::default());
    }
    serde_json::from_str(&content).map_err(|e| MappingError::Parse {
      path: path.to_path_buf(),
      source: e,
    })
  }

  /// Merge the mapping files of every root.
  ///
  /// The first root mentioning a moniker wins. Entries referring to an
  /// artifact that no longer exists in any root are dropped, as are
  /// unreadable files.
  pub fn load(&self) -> MappingFile {
    let mut merged = MappingFile::default();
    for root in &self.roots {
      let path = root.join(MAP_FILENAME);
      match Self::read(&path) {
        Ok(file) if !file.is_empty() => {
          debug!(path = %path.display(), "loaded mapping");
          merged.merge_missing(file);
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "ignoring unreadable mapping"),
      }
    }

    for mode in [MappingMode::Normal, MappingMode::Min] {
      merged.section_mut(mode).retain(|moniker, paths| {
        let complete = paths.iter().all(|p| self.exists(p));
        if !complete {
          debug!(moniker = %moniker, "dropping mapping entry with missing artifacts");
        }
        complete
      });
    }
    merged
  }

  /// Replace the `mode` section of the saved mapping with `section`,
  /// keeping the other section as found on disk.
  pub fn try_save(&self, mode: MappingMode, section: &Section) -> Result<(), MappingError> {
    let path = self.path();
    let mut file = match Self::read(&path) {
      Ok(file) => file,
      Err(MappingError::Parse { .. }) => {
        warn!(path = %path.display(), "overwriting unparsable mapping");
        MappingFile::default()
      }
      Err(e) => return Err(e),
    };
    *file.section_mut(mode) = section.clone();

    let content = serde_json::to_string_pretty(&file).map_err(MappingError::Serialize)?;
    let write_err = |source| MappingError::Write {
      path: path.clone(),
      source,
    };
    let mut temp = NamedTempFile::new_in(&self.out_dir).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.persist(&path).map_err(|e| write_err(e.error))?;

    debug!(path = %path.display(), monikers = section.len(), "saved mapping");
    Ok(())
  }

  /// Like [`try_save`](Self::try_save) but only logs failures.
  pub fn save(&self, mode: MappingMode, section: &Section) -> bool {
    match self.try_save(mode, section) {
      Ok(()) => true,
      Err(e) => {
        warn!(error = %e, "failed to save mapping");
        false
      }
    }
  }

  fn exists(&self, relative: &str) -> bool {
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    !file_name.is_empty() && self.roots.iter().any(|root| root.join(file_name).is_file())
  }
}
