//! Configuration for an [`AssetPack`](crate::pack::AssetPack).
//!
//! The configuration is a plain value handed to the controller at
//! construction time. Environment toggles are applied explicitly through
//! [`Config::with_env_overrides`]; nothing else in the crate reads the
//! environment.
//!
//! # Environment
//!
//! - `ASSETPACK_DEBUG` - verbose build logging
//! - `ASSETPACK_NO_CACHE` - rebuild on every access, ignoring existing artifacts
//! - `ASSETPACK_DIE_ON_PROCESS_ERROR` - make build failures fatal
//! - `ASSETPACK_MODE` - runtime mode (`development`, `production`, ...)

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DEVELOPMENT_MODE;

/// Errors detected while setting up an asset pack. These are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// A moniker without a usable `name.ext` shape.
  #[error("invalid moniker '{0}': expected <name>.<ext>")]
  InvalidMoniker(String),

  /// `base_url` must end in `/` so artifact names can be appended.
  #[error("base_url '{0}' must end with '/'")]
  InvalidBaseUrl(String),

  /// No static or source path to resolve sources against.
  #[error("no static_paths or source_paths configured")]
  NoSearchPaths,

  /// No directory is available for artifacts.
  #[error("could not find a writable or readable 'packed' directory under any of: {0:?}")]
  NoOutDir(Vec<PathBuf>),

  /// An explicit `out_dir` could not be created.
  #[error("failed to create out_dir '{path}': {source}")]
  CreateOutDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Asset pack configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Public URL prefix of served artifacts. Must end in `/`.
  pub base_url: String,
  /// Combine and minify each bundle into one artifact.
  pub minify: bool,
  /// Artifact directory. Detected from `static_paths` when absent.
  pub out_dir: Option<PathBuf>,
  /// Static roots served by the host; each may carry a `packed/` directory.
  pub static_paths: Vec<PathBuf>,
  /// Extra roots searched for raw sources before the static roots.
  pub source_paths: Vec<PathBuf>,
  /// Extra response headers for served artifacts.
  pub headers: BTreeMap<String, String>,
  /// Fall back to the newest matching artifact on disk when a build fails.
  pub fallback_to_latest: bool,
  /// Name under which templates reach the asset pack.
  pub helper: String,
  /// Runtime mode of the host application.
  pub mode: String,
  /// Build bundles on first access instead of at declaration.
  pub lazy: bool,
  /// Verbose build logging.
  pub debug: bool,
  /// Rebuild on every access.
  pub no_cache: bool,
  /// Abort on build failure. Defaults to `mode != "development"`.
  pub die_on_process_error: Option<bool>,
  /// Application URL used to fetch sources that exist nowhere on disk.
  pub app_url: Option<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      base_url: "/packed/".to_string(),
      minify: false,
      out_dir: None,
      static_paths: Vec::new(),
      source_paths: Vec::new(),
      headers: BTreeMap::new(),
      fallback_to_latest: false,
      helper: "asset".to_string(),
      mode: DEVELOPMENT_MODE.to_string(),
      lazy: false,
      debug: false,
      no_cache: false,
      die_on_process_error: None,
      app_url: None,
    }
  }
}

impl Config {
  /// Apply the `ASSETPACK_*` environment toggles on top of this value.
  pub fn with_env_overrides(mut self) -> Self {
    if let Some(debug) = env_flag("ASSETPACK_DEBUG") {
      self.debug = debug;
    }
    if let Some(no_cache) = env_flag("ASSETPACK_NO_CACHE") {
      self.no_cache = no_cache;
    }
    if let Some(die) = env_flag("ASSETPACK_DIE_ON_PROCESS_ERROR") {
      self.die_on_process_error = Some(die);
    }
    if let Ok(mode) = std::env::var("ASSETPACK_MODE")
      && !mode.is_empty()
    {
      self.mode = mode;
    }
    self
  }

  /// Check the values that make the asset pack unusable.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.base_url.ends_with('/') {
      return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
    }
    if self.static_paths.is_empty() && self.source_paths.is_empty() {
      return Err(ConfigError::NoSearchPaths);
    }
    Ok(())
  }

  pub fn is_development(&self) -> bool {
    self.mode == DEVELOPMENT_MODE
  }

  /// Whether a failed build aborts instead of falling back.
  pub fn die_on_process_error(&self) -> bool {
    self.die_on_process_error.unwrap_or(!self.is_development())
  }

  /// Raw-source search roots: `source_paths` first, then `static_paths`.
  pub fn search_paths(&self) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for path in self.source_paths.iter().chain(self.static_paths.iter()) {
      if !paths.contains(path) {
        paths.push(path.clone());
      }
    }
    paths
  }
}

fn env_flag(name: &str) -> Option<bool> {
  let value = std::env::var(name).ok()?;
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" | "" => Some(false),
    _ => None,
  }
}
