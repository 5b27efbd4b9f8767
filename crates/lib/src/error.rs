//! Error types shared by the pipeline, fallback policy and controller.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::moniker::Moniker;
use crate::source::ResolveError;
use crate::store::StoreError;
use crate::transform::TransformError;

/// Why a build failed.
#[derive(Debug, Error)]
pub enum BuildErrorKind {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Transform(#[from] TransformError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// A failed build of one topic of a bundle.
///
/// The topic is the artifact name prefix: the moniker name for a combined
/// bundle, or the source stem for one file of a non-minified bundle.
#[derive(Debug, Error)]
#[error("{moniker}: {reference}: {kind}")]
pub struct BuildError {
  pub moniker: Moniker,
  pub topic: String,
  /// The source reference being processed when the build failed.
  pub reference: String,
  #[source]
  pub kind: BuildErrorKind,
}

impl BuildError {
  pub fn new(moniker: &Moniker, topic: &str, reference: &str, kind: impl Into<BuildErrorKind>) -> Self {
    Self {
      moniker: moniker.clone(),
      topic: topic.to_string(),
      reference: reference.to_string(),
      kind: kind.into(),
    }
  }

  /// Short label of the failure category, used in logs.
  pub fn category(&self) -> BuildErrorCategory {
    match &self.kind {
      BuildErrorKind::Resolve(_) => BuildErrorCategory::Resolution,
      BuildErrorKind::Transform(e) if e.is_resolution() => BuildErrorCategory::Resolution,
      BuildErrorKind::Transform(_) => BuildErrorCategory::Transform,
      BuildErrorKind::Store(_) => BuildErrorCategory::Store,
    }
  }

  /// Error text without the moniker prefix, for error banners.
  pub fn message(&self) -> String {
    format!("{}: {}", self.reference, self.kind)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildErrorCategory {
  Resolution,
  Transform,
  Store,
}

impl fmt::Display for BuildErrorCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      BuildErrorCategory::Resolution => "resolution",
      BuildErrorCategory::Transform => "transform",
      BuildErrorCategory::Store => "store",
    };
    f.write_str(label)
  }
}

/// Errors returned by [`AssetPack`](crate::pack::AssetPack).
#[derive(Debug, Error)]
pub enum AssetPackError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Store(#[from] StoreError),

  /// A build failed and the configuration does not allow falling back.
  #[error("asset processing failed: {0}")]
  Fatal(#[source] Box<BuildError>),

  /// An artifact requested inline could not be read.
  #[error("failed to read artifact '{path}': {source}")]
  ReadArtifact {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// `purge` was called before any bundle was processed.
  #[error("cannot purge assets before any bundle has been processed")]
  PurgeBeforeProcess,
}
