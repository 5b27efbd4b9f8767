use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::consts::PACKED_DIR;

/// Pick the artifact directory from the static roots.
///
/// Preference order:
/// 1. an existing, writable `<static>/packed`
/// 2. a writable static root, creating `packed/` inside it
/// 3. an existing, readable `<static>/packed` (prebuilt artifacts only)
pub fn detect_out_dir(static_paths: &[PathBuf]) -> Result<PathBuf, ConfigError> {
  for root in static_paths {
    let packed = root.join(PACKED_DIR);
    if packed.is_dir() && is_writable(&packed) {
      debug!(path = %packed.display(), "using writable packed directory");
      return Ok(canonical(packed));
    }
  }

  for root in static_paths {
    if root.is_dir() && is_writable(root) {
      let packed = root.join(PACKED_DIR);
      match fs::create_dir_all(&packed) {
        Ok(()) => {
          debug!(path = %packed.display(), "created packed directory");
          return Ok(canonical(packed));
        }
        Err(e) => warn!(path = %packed.display(), error = %e, "failed to create packed directory"),
      }
    }
  }

  for root in static_paths {
    let packed = root.join(PACKED_DIR);
    if fs::read_dir(&packed).is_ok() {
      warn!(path = %packed.display(), "packed directory is read-only, new artifacts cannot be written");
      return Ok(canonical(packed));
    }
  }

  Err(ConfigError::NoOutDir(static_paths.to_vec()))
}

/// Whether files can be created in `dir`.
pub fn is_writable(dir: &Path) -> bool {
  tempfile::tempfile_in(dir).is_ok()
}

fn canonical(path: PathBuf) -> PathBuf {
  dunce::canonicalize(&path).unwrap_or(path)
}
