//! Test utilities for assetpack-lib.
//!
//! Filesystem fixtures shared by the unit tests of several modules.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

/// A temporary application layout with one static root and its `packed/` dir.
pub struct Fixture {
  pub temp: TempDir,
}

impl Fixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("public").join("packed")).unwrap();
    Self { temp }
  }

  /// The static root (`<temp>/public`).
  pub fn public(&self) -> PathBuf {
    self.temp.path().join("public")
  }

  /// The artifact directory (`<temp>/public/packed`).
  pub fn packed(&self) -> PathBuf {
    self.public().join("packed")
  }

  /// Write a file relative to the static root, creating parent directories.
  pub fn write(&self, relative: &str, content: &str) -> PathBuf {
    write_file(&self.public().join(relative), content)
  }
}

/// Write a file, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> PathBuf {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
  path.to_path_buf()
}

/// Push a file's modification time `secs` seconds into the past.
pub fn age_file(path: &Path, secs: u64) {
  let file = std::fs::File::options().write(true).open(path).unwrap();
  let mtime = SystemTime::now() - Duration::from_secs(secs);
  file.set_modified(mtime).unwrap();
}
