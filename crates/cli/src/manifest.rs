//! The `assets.json` manifest read by every command.
//!
//! ```json
//! {
//!   "config": { "static_paths": ["public"], "minify": true },
//!   "assets": { "app.css": ["css/reset.css", "sass/*.scss"] },
//!   "transforms": { "scss": { "program": "sass", "args": ["--stdin"] } }
//! }
//! ```
//!
//! Relative paths in `config` are taken relative to the manifest's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use assetpack_lib::{AssetPack, CommandSpec, CommandTransform, Config, TransformRegistry};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
  pub config: Config,
  /// Moniker to source references, in declaration order per bundle.
  pub assets: BTreeMap<String, Vec<String>>,
  /// Extension to external command.
  pub transforms: BTreeMap<String, CommandSpec>,
}

impl Manifest {
  pub fn load(path: &Path) -> Result<Self> {
    let content =
      std::fs::read_to_string(path).with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let mut manifest: Manifest =
      serde_json::from_str(&content).with_context(|| format!("Failed to parse manifest {}", path.display()))?;

    let base = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let base = dunce::canonicalize(base).with_context(|| format!("Failed to resolve {}", base.display()))?;
    manifest.anchor(&base);
    debug!(path = %path.display(), assets = manifest.assets.len(), "loaded manifest");
    Ok(manifest)
  }

  fn anchor(&mut self, base: &Path) {
    let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
    let config = &mut self.config;
    config.static_paths = config.static_paths.iter().map(join).collect();
    config.source_paths = config.source_paths.iter().map(join).collect();
    config.out_dir = config.out_dir.as_ref().map(join);
  }

  pub fn registry(&self) -> TransformRegistry {
    self
      .transforms
      .iter()
      .fold(TransformRegistry::with_defaults(), |registry, (ext, spec)| {
        registry.register(ext.clone(), Arc::new(CommandTransform::new(ext.clone(), spec.clone())))
      })
  }

  /// Set up an asset pack with the environment toggles applied.
  pub fn pack(&self, verbose: bool) -> Result<AssetPack> {
    let mut config = self.config.clone().with_env_overrides();
    config.debug |= verbose;
    AssetPack::new(config, self.registry()).context("Failed to set up asset pack")
  }
}
