//! Shared helpers for the asset pack tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use assetpack_lib::source::Source;
use assetpack_lib::transform::css::minify_css;
use assetpack_lib::transform::{TransformContext, TransformError};
use assetpack_lib::{AssetPack, Assets, Config, GetOptions, Transform, TransformRegistry};
use tempfile::TempDir;

/// Stand-in for a SASS compiler.
///
/// Drops `//` comment lines, rejects content containing `@error` and counts
/// its invocations.
#[derive(Default)]
pub struct FakeSass {
  runs: AtomicUsize,
}

impl FakeSass {
  pub fn runs(&self) -> usize {
    self.runs.load(Ordering::SeqCst)
  }
}

impl Transform for FakeSass {
  fn name(&self) -> &str {
    "fake-sass"
  }

  fn transform(&self, ctx: &TransformContext<'_>, source: &Source, content: String) -> Result<String, TransformError> {
    self.runs.fetch_add(1, Ordering::SeqCst);
    if let Some(line) = content.lines().find(|l| l.trim_start().starts_with("@error")) {
      return Err(TransformError::Syntax {
        path: source.path().to_path_buf(),
        message: line.trim().to_string(),
      });
    }
    let css: String = content
      .lines()
      .filter(|l| !l.trim_start().starts_with("//"))
      .map(|l| format!("{l}\n"))
      .collect();
    Ok(if ctx.minify { minify_css(&css) } else { css })
  }
}

/// Isolated application layout: `<temp>/public` with its `packed/` dir.
pub struct TestEnv {
  pub temp: TempDir,
  pub sass: Arc<FakeSass>,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("public").join("packed")).unwrap();
    Self {
      temp,
      sass: Arc::new(FakeSass::default()),
    }
  }

  pub fn public(&self) -> PathBuf {
    self.temp.path().join("public")
  }

  pub fn packed(&self) -> PathBuf {
    self.public().join("packed")
  }

  /// Write a file relative to the static root.
  pub fn write(&self, relative: &str, content: &str) -> PathBuf {
    let path = self.public().join(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Development-mode configuration serving from the static root.
  pub fn config(&self) -> Config {
    Config {
      static_paths: vec![self.public()],
      ..Config::default()
    }
  }

  pub fn registry(&self) -> TransformRegistry {
    TransformRegistry::with_defaults().register("scss", self.sass.clone())
  }

  pub fn pack(&self, config: Config) -> AssetPack {
    AssetPack::new(config, self.registry()).unwrap()
  }

  /// File names in the artifact directory, sorted.
  pub fn packed_files(&self) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(self.packed())
      .unwrap()
      .flatten()
      .filter(|e| e.path().is_file())
      .map(|e| e.file_name().to_string_lossy().to_string())
      .collect();
    names.sort();
    names
  }
}

pub fn urls(pack: &AssetPack, moniker: &str) -> Vec<String> {
  match pack.get(moniker, GetOptions::default()).unwrap() {
    Assets::Urls(urls) => urls,
    other => panic!("expected urls, got {other:?}"),
  }
}

pub fn inline(pack: &AssetPack, moniker: &str) -> String {
  let options = GetOptions {
    inline: true,
    ..GetOptions::default()
  };
  match pack.get(moniker, options).unwrap() {
    Assets::Inline(content) => content,
    other => panic!("expected inline content, got {other:?}"),
  }
}

/// Whether `name` looks like `<prefix>-<32 hex>.<suffix>`.
pub fn is_digest_name(name: &str, prefix: &str, suffix: &str) -> bool {
  let Some(rest) = name.strip_prefix(&format!("{prefix}-")) else {
    return false;
  };
  let Some(hash) = rest.strip_suffix(&format!(".{suffix}")) else {
    return false;
  };
  hash.len() == 32 && hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}
