//! Recovery from failed builds.
//!
//! When a topic fails to build, [`FallbackPolicy::recover`] tries, in order:
//!
//! 1. the artifacts the topic was last successfully built into (or loaded
//!    from the mapping)
//! 2. the most recently modified matching artifact on disk that no other
//!    bundle serves, when `fallback_to_latest` is enabled
//! 3. the bundle's synthesized `<name>-err.<ext>` artifact that surfaces the
//!    error in the browser
//!
//! With `die_on_error` set the outcome is discarded and the failure is
//! returned as [`AssetPackError::Fatal`].

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::consts::APP_NAME;
use crate::error::{AssetPackError, BuildError};
use crate::moniker::Moniker;
use crate::pipeline::{error_artifact_name, topic_pattern};
use crate::store::{Artifact, ContentStore};

/// What a failed topic is served as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
  /// Known-good artifacts from an earlier build.
  LastMapping(Vec<Artifact>),
  /// The newest artifact of the topic found on disk.
  LatestOnDisk(Artifact),
  /// A synthesized artifact displaying the error.
  ErrorArtifact(Artifact),
  /// Nothing could be served; the error artifact could not be written.
  Unrecovered,
}

impl Recovery {
  pub fn into_artifacts(self) -> Vec<Artifact> {
    match self {
      Recovery::LastMapping(artifacts) => artifacts,
      Recovery::LatestOnDisk(artifact) | Recovery::ErrorArtifact(artifact) => vec![artifact],
      Recovery::Unrecovered => Vec::new(),
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Recovery::LastMapping(_) => "last mapping",
      Recovery::LatestOnDisk(_) => "latest on disk",
      Recovery::ErrorArtifact(_) => "error artifact",
      Recovery::Unrecovered => "none",
    }
  }
}

/// Decides what to serve when a build fails.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
  pub fallback_to_latest: bool,
  pub die_on_error: bool,
  pub minify: bool,
  /// Logged with every failure.
  pub source_paths: Vec<PathBuf>,
  /// Logged with every failure.
  pub static_paths: Vec<PathBuf>,
}

impl FallbackPolicy {
  pub fn from_config(config: &Config) -> Self {
    Self {
      fallback_to_latest: config.fallback_to_latest,
      die_on_error: config.die_on_process_error(),
      minify: config.minify,
      source_paths: config.source_paths.clone(),
      static_paths: config.static_paths.clone(),
    }
  }

  /// Recover from `failure`.
  ///
  /// `last_good` holds what the failed topic was last built into. `claimed`
  /// are artifacts served by other bundles; topics of different bundles can
  /// share a file name prefix, so those are never taken from disk.
  pub fn recover(
    &self,
    failure: BuildError,
    last_good: &[Artifact],
    claimed: &BTreeSet<PathBuf>,
    store: &ContentStore,
  ) -> Result<Recovery, AssetPackError> {
    error!(
      moniker = %failure.moniker,
      topic = %failure.topic,
      reference = %failure.reference,
      category = %failure.category(),
      source_paths = ?self.source_paths,
      static_paths = ?self.static_paths,
      error = %failure.kind,
      "asset processing failed"
    );

    let recovery = self.choose(&failure, last_good, claimed, store);

    if self.die_on_error {
      error!(moniker = %failure.moniker, topic = %failure.topic, "aborting on processing error");
      return Err(AssetPackError::Fatal(Box::new(failure)));
    }

    info!(moniker = %failure.moniker, topic = %failure.topic, recovery = recovery.label(), "recovered from failed build");
    Ok(recovery)
  }

  fn choose(
    &self,
    failure: &BuildError,
    last_good: &[Artifact],
    claimed: &BTreeSet<PathBuf>,
    store: &ContentStore,
  ) -> Recovery {
    let moniker = &failure.moniker;
    if !last_good.is_empty() {
      return Recovery::LastMapping(last_good.to_vec());
    }

    let pattern = topic_pattern(&failure.topic, moniker.ext(), self.minify);
    if self.fallback_to_latest
      && let Some(artifact) = store
        .search_all(&pattern)
        .into_iter()
        .find(|a| !claimed.contains(&a.path))
    {
      warn!(%moniker, artifact = %artifact.path.display(), "serving latest artifact found on disk");
      return Recovery::LatestOnDisk(artifact);
    }

    let name = error_artifact_name(moniker);
    let content = error_content(moniker, &failure.message());
    match store.write(&name, [content]) {
      Ok(artifact) => Recovery::ErrorArtifact(artifact),
      Err(e) => {
        warn!(%moniker, file = %name, error = %e, "failed to write error artifact");
        Recovery::Unrecovered
      }
    }
  }
}

/// Content of an error artifact for `moniker`.
///
/// The message is sanitized so the result stays a single valid statement or
/// rule for the moniker's content type.
pub fn error_content(moniker: &Moniker, message: &str) -> String {
  let text = format!("{APP_NAME}({moniker}) failed: {message}");
  if moniker.is_js() {
    let text = escape_js(&text);
    format!("alert('{text}');console.log('{text}');\n")
  } else if moniker.is_css() {
    format!(
      "html:before{{position:fixed;top:0;left:0;right:0;z-index:99999;background:#a00;color:#fff;\
       font:14px monospace;padding:1em;white-space:pre-wrap;content:\"{}\";}}\n",
      escape_css(&text)
    )
  } else {
    format!("/* {} */\n", text.replace("*/", "* /"))
  }
}

fn escape_js(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '\'' => out.push_str("\\'"),
      '"' => out.push_str("\\\""),
      '\n' => out.push_str("\\n"),
      '\u{2028}' | '\u{2029}' => {}
      c if c.is_control() => {}
      c => out.push(c),
    }
  }
  out
}

fn escape_css(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '"' => out.push_str("\\\""),
      '\n' => out.push_str("\\A "),
      c if c.is_control() => {}
      c => out.push(c),
    }
  }
  out
}
