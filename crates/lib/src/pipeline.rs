//! Per-bundle build orchestration.
//!
//! For every topic of a bundle the pipeline:
//!
//! 1. resolves each source and computes its checksum
//! 2. combines the checksums into one digest (in declaration order)
//! 3. looks for an existing `<topic>-<digest>[.min].<ext>` artifact and
//!    returns it untouched on a hit
//! 4. otherwise transforms every source, concatenates the outputs and writes
//!    the artifact
//!
//! A minified bundle has a single topic named after the moniker. A
//! non-minified bundle has one topic per source, named after the source, so
//! one broken file does not take down the rest of the bundle.

use tracing::{debug, info};

use crate::error::{BuildError, BuildErrorKind};
use crate::moniker::Moniker;
use crate::source::{SourceResolver, reference_stem};
use crate::store::{Artifact, ArtifactPattern, ContentStore};
use crate::transform::{TransformContext, TransformRegistry};
use crate::util::hash::Checksum;

/// File name of a built artifact.
pub fn artifact_name(topic: &str, digest: &Checksum, minify: bool, ext: &str) -> String {
  if minify {
    format!("{topic}-{digest}.min.{ext}")
  } else {
    format!("{topic}-{digest}.{ext}")
  }
}

/// File name of the error artifact of a bundle. There is one per moniker,
/// whichever of its topics failed.
pub fn error_artifact_name(moniker: &Moniker) -> String {
  format!("{}-err.{}", moniker.name(), moniker.ext())
}

/// Pattern matching every build of a topic in the given mode.
pub fn topic_pattern(topic: &str, ext: &str, minify: bool) -> ArtifactPattern {
  ArtifactPattern::new(topic, ext, Some(minify))
}

/// One unit of work: the sources combined into a single artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
  /// Artifact name prefix.
  pub name: String,
  /// Identifies the topic across rebuilds of the bundle: the moniker name when
  /// combined, the source reference otherwise. Stems are not unique.
  pub key: String,
  pub references: Vec<String>,
}

/// The outcome of building one topic.
#[derive(Debug)]
pub struct TopicBuild {
  pub topic: Topic,
  pub result: Result<Artifact, BuildError>,
}

/// Split a bundle's references into topics.
pub fn topics(moniker: &Moniker, references: &[String], minify: bool) -> Vec<Topic> {
  if minify {
    vec![Topic {
      name: moniker.name().to_string(),
      key: moniker.name().to_string(),
      references: references.to_vec(),
    }]
  } else {
    references
      .iter()
      .map(|reference| Topic {
        name: reference_stem(reference),
        key: reference.clone(),
        references: vec![reference.clone()],
      })
      .collect()
  }
}

/// Builds bundles from their declared sources.
pub struct Pipeline<'a> {
  pub resolver: &'a SourceResolver,
  pub registry: &'a TransformRegistry,
  pub store: &'a ContentStore,
  pub minify: bool,
  /// Skip the existing-artifact lookup and always rebuild.
  pub no_cache: bool,
}

impl Pipeline<'_> {
  /// Build every topic of `moniker`.
  pub fn run(&self, moniker: &Moniker, references: &[String]) -> Vec<TopicBuild> {
    topics(moniker, references, self.minify)
      .into_iter()
      .map(|topic| {
        let result = self.build_topic(moniker, &topic);
        TopicBuild { topic, result }
      })
      .collect()
  }

  /// Build a single topic into one artifact.
  pub fn build_topic(&self, moniker: &Moniker, topic: &Topic) -> Result<Artifact, BuildError> {
    let ctx = TransformContext {
      moniker,
      minify: self.minify,
      resolver: self.resolver,
      registry: self.registry,
    };
    let fail = |reference: &str, kind: BuildErrorKind| BuildError::new(moniker, &topic.name, reference, kind);

    let mut sources = Vec::with_capacity(topic.references.len());
    let mut digests = Vec::with_capacity(topic.references.len());
    for reference in &topic.references {
      let source = self.resolver.resolve(reference).map_err(|e| fail(reference, e.into()))?;
      let digest = self
        .registry
        .checksum(&ctx, &source)
        .map_err(|e| fail(reference, e.into()))?;
      debug!(%moniker, reference = %reference, checksum = %digest, "checksummed source");
      sources.push(source);
      digests.push(digest);
    }

    let digest = Checksum::combine(&digests);
    let file_name = artifact_name(&topic.name, &digest, self.minify, moniker.ext());

    if !self.no_cache
      && let Some(artifact) = self.store.locate(&file_name)
    {
      debug!(%moniker, artifact = %artifact.path.display(), "using existing artifact");
      return Ok(artifact);
    }

    let mut chunks: Vec<String> = Vec::with_capacity(sources.len() * 2);
    for source in &sources {
      let output = self
        .registry
        .transform(&ctx, source)
        .map_err(|e| fail(source.reference(), e.into()))?;
      if chunks.last().is_some_and(|prev| !prev.ends_with('\n')) {
        chunks.push("\n".to_string());
      }
      chunks.push(output);
    }

    let artifact = self
      .store
      .write(&file_name, &chunks)
      .map_err(|e| fail(&topic.name, e.into()))?;

    info!(%moniker, artifact = %artifact.name, sources = sources.len(), "built artifact");
    Ok(artifact)
  }
}
