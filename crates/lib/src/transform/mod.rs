//! Content transforms.
//!
//! A [`Transform`] rewrites the content of one source (compiling, inlining
//! imports, minifying). Transforms are registered per input extension in a
//! [`TransformRegistry`] built once at startup and shared immutably.
//!
//! # Modules
//!
//! - [`css`] - `@import` inlining and CSS minification
//! - [`cmd`] - adapter running an external compiler or minifier

pub mod cmd;
pub mod css;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::moniker::Moniker;
use crate::source::{ResolveError, Source, SourceResolver};
use crate::util::hash::{Checksum, hash_bytes};

pub use cmd::{CommandSpec, CommandTransform};
pub use css::CssTransform;

/// Errors raised by a transform.
#[derive(Debug, Error)]
pub enum TransformError {
  /// The source (or one it depends on) could not be read.
  #[error(transparent)]
  Source(#[from] ResolveError),

  /// A nested reference such as an `@import` could not be resolved.
  #[error("{path}: cannot resolve '{reference}': {source}")]
  Import {
    path: PathBuf,
    reference: String,
    #[source]
    source: ResolveError,
  },

  /// The content was rejected.
  #[error("{path}: {message}")]
  Syntax { path: PathBuf, message: String },

  /// The external program could not be started.
  #[error("failed to run '{program}' for {path}: {source}")]
  Spawn {
    program: String,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The external program exited unsuccessfully.
  #[error("'{program}' failed for {path} (exit code {code:?}): {stderr}")]
  CommandFailed {
    program: String,
    path: PathBuf,
    code: Option<i32>,
    stderr: String,
  },
}

impl TransformError {
  /// Whether the failure is about locating a source rather than its content.
  pub fn is_resolution(&self) -> bool {
    matches!(self, TransformError::Source(_))
  }
}

/// What a transform gets to see besides the content itself.
pub struct TransformContext<'a> {
  /// Bundle being built.
  pub moniker: &'a Moniker,
  /// Whether output should be minified.
  pub minify: bool,
  /// Resolver for nested references.
  pub resolver: &'a SourceResolver,
  /// Registry for transforming and checksumming nested sources.
  pub registry: &'a TransformRegistry,
}

/// A content transform for one or more input extensions.
pub trait Transform: Send + Sync {
  fn name(&self) -> &str;

  /// Sources the output of `source` depends on besides its own bytes.
  ///
  /// Their checksums are folded into the checksum of `source`, so editing an
  /// imported file invalidates every bundle importing it.
  fn dependencies(
    &self,
    _ctx: &TransformContext<'_>,
    _source: &Source,
    _content: &str,
  ) -> Result<Vec<Arc<Source>>, TransformError> {
    Ok(Vec::new())
  }

  /// Rewrite `content` of `source`.
  fn transform(&self, ctx: &TransformContext<'_>, source: &Source, content: String) -> Result<String, TransformError>;
}

/// Identity transform used for extensions without a registered transform.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Transform for Passthrough {
  fn name(&self) -> &str {
    "passthrough"
  }

  fn transform(&self, _ctx: &TransformContext<'_>, _source: &Source, content: String) -> Result<String, TransformError> {
    Ok(content)
  }
}

/// Extension-keyed table of transforms.
///
/// Lookup is an exact, case-sensitive match on the source extension.
#[derive(Clone, Default)]
pub struct TransformRegistry {
  transforms: BTreeMap<String, Arc<dyn Transform>>,
}

impl fmt::Debug for TransformRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map()
      .entries(self.transforms.iter().map(|(ext, t)| (ext, t.name())))
      .finish()
  }
}

impl TransformRegistry {
  /// An empty registry: every extension passes through unchanged.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with the built-in transforms.
  pub fn with_defaults() -> Self {
    Self::new().register("css", Arc::new(CssTransform))
  }

  /// Register `transform` for `ext`, replacing any previous one.
  pub fn register(mut self, ext: impl Into<String>, transform: Arc<dyn Transform>) -> Self {
    self.transforms.insert(ext.into(), transform);
    self
  }

  pub fn get(&self, ext: &str) -> &dyn Transform {
    match self.transforms.get(ext) {
      Some(transform) => transform.as_ref(),
      None => &Passthrough,
    }
  }

  pub fn extensions(&self) -> impl Iterator<Item = &str> {
    self.transforms.keys().map(String::as_str)
  }

  /// Checksum of a source: its own bytes combined with the checksums of the
  /// dependencies its transform reports, recursively.
  pub fn checksum(&self, ctx: &TransformContext<'_>, source: &Source) -> Result<Checksum, TransformError> {
    let mut visiting = Vec::new();
    self.checksum_inner(ctx, source, &mut visiting)
  }

  fn checksum_inner(
    &self,
    ctx: &TransformContext<'_>,
    source: &Source,
    visiting: &mut Vec<PathBuf>,
  ) -> Result<Checksum, TransformError> {
    let content = source.read()?;
    let own = hash_bytes(content.as_bytes());

    if visiting.iter().any(|p| p == source.path()) {
      return Ok(own);
    }

    let dependencies = self.get(source.ext()).dependencies(ctx, source, &content)?;
    if dependencies.is_empty() {
      return Ok(own);
    }

    visiting.push(source.path().to_path_buf());
    let mut parts = vec![own];
    for dependency in &dependencies {
      parts.push(self.checksum_inner(ctx, dependency, visiting)?);
    }
    visiting.pop();

    trace!(path = %source.path().display(), dependencies = dependencies.len(), "combined dependency checksums");
    Ok(Checksum::combine(&parts))
  }

  /// Read `source` and run it through the transform for its extension.
  pub fn transform(&self, ctx: &TransformContext<'_>, source: &Source) -> Result<String, TransformError> {
    let content = source.read()?;
    let transform = self.get(source.ext());
    trace!(path = %source.path().display(), transform = transform.name(), "transforming");
    transform.transform(ctx, source, content)
  }
}
