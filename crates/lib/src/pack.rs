//! The asset pack controller.
//!
//! [`AssetPack`] owns the configured components and the in-memory table of
//! declared bundles. Hosts declare bundles with [`AssetPack::add`], ask for
//! their artifacts with [`AssetPack::get`] and clean up old builds with
//! [`AssetPack::purge`].
//!
//! Every method takes `&self`: a pack can be shared between request threads.
//! Builds of one moniker are serialized by a per-bundle lock, so a lazily
//! built bundle is built at most once even under concurrent `get`s.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::consts::FETCH_CACHE_DIR;
use crate::error::AssetPackError;
use crate::fallback::{FallbackPolicy, Recovery};
use crate::mapping::{MappingMode, MappingStore, Section};
use crate::moniker::Moniker;
use crate::pipeline::{Pipeline, Topic, error_artifact_name, topic_pattern, topics};
use crate::source::SourceResolver;
use crate::store::paths::detect_out_dir;
use crate::store::{Artifact, ContentStore};
use crate::transform::TransformRegistry;

/// What [`AssetPack::get`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
  /// Return the artifacts themselves.
  pub assets: bool,
  /// Return the concatenated artifact content.
  pub inline: bool,
}

/// Result of [`AssetPack::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assets {
  Urls(Vec<String>),
  Inline(String),
  Artifacts(Vec<Artifact>),
}

impl Assets {
  pub fn is_empty(&self) -> bool {
    match self {
      Assets::Urls(urls) => urls.is_empty(),
      Assets::Inline(content) => content.is_empty(),
      Assets::Artifacts(artifacts) => artifacts.is_empty(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOptions {
  /// Purge even outside development mode. Defaults to `mode == development`.
  pub always: Option<bool>,
}

/// Files removed by [`AssetPack::purge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
  pub deleted: Vec<PathBuf>,
  pub bytes: u64,
}

/// A declared bundle.
#[derive(Debug)]
struct Bundle {
  moniker: Moniker,
  references: Vec<String>,
  state: Mutex<BundleState>,
}

#[derive(Debug, Default)]
struct BundleState {
  built: bool,
  /// Artifacts currently served for the bundle.
  served: Vec<Artifact>,
  /// Artifacts of the last successful build of each topic, keyed by
  /// [`Topic::key`] and in topic order. Reused when a topic fails.
  good: Vec<(String, Artifact)>,
}

impl BundleState {
  fn good_artifacts(&self) -> impl Iterator<Item = &Artifact> {
    self.good.iter().map(|(_, artifact)| artifact)
  }
}

/// Asset pipeline controller.
#[derive(Debug)]
pub struct AssetPack {
  config: Config,
  mode: MappingMode,
  store: ContentStore,
  resolver: SourceResolver,
  registry: TransformRegistry,
  policy: FallbackPolicy,
  mapping: MappingStore,
  bundles: Mutex<BTreeMap<String, Arc<Bundle>>>,
  /// Artifacts from the persisted mapping, keyed by moniker.
  loaded: Mutex<BTreeMap<String, Vec<Artifact>>>,
  /// Paths each built bundle serves or keeps as last good, keyed by moniker.
  claims: Mutex<BTreeMap<String, BTreeSet<PathBuf>>>,
  processed: AtomicBool,
}

impl AssetPack {
  /// Set up an asset pack. Configuration problems are fatal here.
  pub fn new(config: Config, registry: TransformRegistry) -> Result<Self, AssetPackError> {
    config.validate()?;

    let out_dir = match &config.out_dir {
      Some(dir) => {
        fs::create_dir_all(dir).map_err(|e| ConfigError::CreateOutDir {
          path: dir.clone(),
          source: e,
        })?;
        dir.clone()
      }
      None => detect_out_dir(&config.static_paths)?,
    };

    let resolver = SourceResolver::new(
      config.search_paths(),
      out_dir.join(FETCH_CACHE_DIR),
      config.app_url.clone(),
    )?;
    let store = ContentStore::new(out_dir.clone(), &config.static_paths);
    let mapping = MappingStore::new(out_dir.clone(), store.roots().to_vec());
    let policy = FallbackPolicy::from_config(&config);
    let mode = MappingMode::from_minify(config.minify);

    info!(
      out_dir = %out_dir.display(),
      mode = %config.mode,
      minify = config.minify,
      lazy = config.lazy,
      "asset pack ready"
    );
    if config.debug {
      debug!(transforms = ?registry, search_paths = ?resolver.search_paths(), "asset pack configuration");
    }

    Ok(Self {
      config,
      mode,
      store,
      resolver,
      registry,
      policy,
      mapping,
      bundles: Mutex::new(BTreeMap::new()),
      loaded: Mutex::new(BTreeMap::new()),
      claims: Mutex::new(BTreeMap::new()),
      processed: AtomicBool::new(false),
    })
  }

  /// Declare a bundle, replacing any earlier declaration of `moniker`.
  ///
  /// Globs are expanded now. Unless the pack is lazy the bundle is built
  /// immediately.
  pub fn add<S: AsRef<str>>(&self, moniker: &str, references: &[S]) -> Result<&Self, AssetPackError> {
    let moniker = Moniker::parse(moniker)?;
    let references: Vec<String> = references
      .iter()
      .flat_map(|r| self.resolver.expand(r.as_ref()))
      .collect();
    debug!(%moniker, sources = ?references, "declared bundle");

    let previous = lock(&self.bundles).get(&moniker.to_string()).cloned();
    let good = previous.map(|b| lock(&b.state).good.clone()).unwrap_or_default();
    let bundle = Arc::new(Bundle {
      moniker: moniker.clone(),
      references,
      state: Mutex::new(BundleState {
        good,
        ..BundleState::default()
      }),
    });
    lock(&self.bundles).insert(moniker.to_string(), Arc::clone(&bundle));

    if !self.config.lazy {
      let mut state = lock(&bundle.state);
      self.build(&bundle, &mut state)?;
    }
    Ok(self)
  }

  /// Same as [`add`](Self::add).
  pub fn process<S: AsRef<str>>(&self, moniker: &str, references: &[S]) -> Result<&Self, AssetPackError> {
    self.add(moniker, references)
  }

  /// Artifacts of a bundle as URLs, inline content or artifact handles.
  ///
  /// Lazy bundles are built on first access; with `no_cache` every access
  /// rebuilds. Unknown monikers yield an empty result.
  pub fn get(&self, moniker: &str, options: GetOptions) -> Result<Assets, AssetPackError> {
    let artifacts = self.artifacts(moniker)?;

    if options.assets {
      return Ok(Assets::Artifacts(artifacts));
    }
    if options.inline {
      let mut content = String::new();
      for artifact in &artifacts {
        let text = artifact.read().map_err(|e| AssetPackError::ReadArtifact {
          path: artifact.path.clone(),
          source: e,
        })?;
        content.push_str(&text);
      }
      return Ok(Assets::Inline(content));
    }
    Ok(Assets::Urls(
      artifacts.iter().map(|a| a.url(&self.config.base_url)).collect(),
    ))
  }

  fn artifacts(&self, moniker: &str) -> Result<Vec<Artifact>, AssetPackError> {
    let bundle = lock(&self.bundles).get(moniker).cloned();
    if let Some(bundle) = bundle {
      let mut state = lock(&bundle.state);
      if !state.built || self.config.no_cache {
        self.build(&bundle, &mut state)?;
      }
      return Ok(state.served.clone());
    }

    if let Some(artifacts) = lock(&self.loaded).get(moniker) {
      return Ok(artifacts.clone());
    }

    warn!(moniker, "unknown asset");
    Ok(Vec::new())
  }

  /// Download a remote resource into the fetch cache.
  pub fn fetch(&self, url: &str) -> Result<PathBuf, AssetPackError> {
    Ok(self.resolver.fetch(url)?)
  }

  /// Delete artifacts of declared bundles that nothing references anymore.
  ///
  /// Only the output directory is touched, and only files matching a declared
  /// topic in the current mode. Artifacts in the in-memory table are kept, as
  /// are loaded mapping entries of monikers not successfully rebuilt yet.
  pub fn purge(&self, options: PurgeOptions) -> Result<PurgeReport, AssetPackError> {
    if !self.processed.load(Ordering::SeqCst) {
      return Err(AssetPackError::PurgeBeforeProcess);
    }

    let mut report = PurgeReport::default();
    if !options.always.unwrap_or(self.config.is_development()) {
      debug!(mode = %self.config.mode, "skipping purge");
      return Ok(report);
    }

    let bundles: Vec<Arc<Bundle>> = lock(&self.bundles).values().cloned().collect();
    let mut referenced: BTreeSet<PathBuf> = BTreeSet::new();
    let mut superseded: BTreeSet<String> = BTreeSet::new();
    for bundle in &bundles {
      let state = lock(&bundle.state);
      referenced.extend(state.served.iter().chain(state.good_artifacts()).map(|a| a.path.clone()));
      if !state.good.is_empty() {
        superseded.insert(bundle.moniker.to_string());
      }
    }
    // Loaded entries stay protected until a build of the moniker succeeds.
    for (moniker, artifacts) in lock(&self.loaded).iter() {
      if !superseded.contains(moniker) {
        referenced.extend(artifacts.iter().map(|a| a.path.clone()));
      }
    }

    for bundle in &bundles {
      let ext = bundle.moniker.ext();
      for topic in topics(&bundle.moniker, &bundle.references, self.config.minify) {
        let pattern = topic_pattern(&topic.name, ext, self.config.minify);
        for artifact in self.store.list_out_dir(&pattern) {
          if referenced.contains(&artifact.path) {
            continue;
          }
          let size = artifact.size();
          match self.store.delete(&artifact.name) {
            Ok(true) => {
              info!(moniker = %bundle.moniker, artifact = %artifact.name, "purged stale artifact");
              report.bytes += size;
              report.deleted.push(artifact.path);
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to purge artifact"),
          }
        }
      }
    }

    Ok(report)
  }

  /// Write the current mode's moniker table to `map.json` in the output
  /// directory. Failures are logged and reported as `false`.
  pub fn save_mapping(&self) -> bool {
    let mut section = Section::new();
    for (moniker, artifacts) in lock(&self.loaded).iter() {
      section.insert(moniker.clone(), artifacts.iter().map(Artifact::relative).collect());
    }
    for (moniker, bundle) in lock(&self.bundles).iter() {
      let state = lock(&bundle.state);
      if !state.good.is_empty() {
        section.insert(moniker.clone(), state.good_artifacts().map(Artifact::relative).collect());
      }
    }
    self.mapping.save(self.mode, &section)
  }

  /// Load the persisted mapping of every artifact directory.
  ///
  /// Loaded entries serve monikers not declared in this process and are the
  /// first fallback for declared ones. Returns the number of monikers loaded.
  pub fn load_mapping(&self) -> usize {
    let file = self.mapping.load();
    let mut loaded = lock(&self.loaded);
    for (moniker, paths) in file.section(self.mode) {
      let artifacts: Option<Vec<Artifact>> = paths
        .iter()
        .map(|p| self.store.locate(p.rsplit('/').next().unwrap_or(p)))
        .collect();
      match artifacts {
        Some(artifacts) => {
          loaded.entry(moniker.clone()).or_insert(artifacts);
        }
        None => debug!(moniker = %moniker, "skipping mapping entry with missing artifacts"),
      }
    }
    debug!(monikers = loaded.len(), "loaded mapping");
    loaded.len()
  }

  fn build(&self, bundle: &Bundle, state: &mut BundleState) -> Result<(), AssetPackError> {
    let moniker = &bundle.moniker;
    let key = moniker.to_string();
    let topics = topics(moniker, &bundle.references, self.config.minify);
    let last_good = if state.good.is_empty() {
      self.seed_from_mapping(moniker, &topics)
    } else {
      state.good.clone()
    };

    let pipeline = Pipeline {
      resolver: &self.resolver,
      registry: &self.registry,
      store: &self.store,
      minify: self.config.minify,
      no_cache: self.config.no_cache,
    };

    let mut served: Vec<Artifact> = Vec::new();
    let mut good = Vec::new();
    let mut failed = false;
    for build in pipeline.run(moniker, &bundle.references) {
      let topic_key = build.topic.key;
      match build.result {
        Ok(artifact) => {
          good.push((topic_key, artifact.clone()));
          served.push(artifact);
        }
        Err(failure) => {
          failed = true;
          let previous: Vec<Artifact> = last_good
            .iter()
            .filter(|(k, _)| *k == topic_key)
            .map(|(_, a)| a.clone())
            .collect();
          let claimed = self.claimed_by_others(&key);
          match self.policy.recover(failure, &previous, &claimed, &self.store)? {
            Recovery::LastMapping(artifacts) => {
              good.extend(artifacts.iter().map(|a| (topic_key.clone(), a.clone())));
              served.extend(artifacts);
            }
            other => {
              for artifact in other.into_artifacts() {
                // Failed topics of one bundle share its error artifact.
                if !served.contains(&artifact) {
                  served.push(artifact);
                }
              }
            }
          }
        }
      }
    }

    if !failed {
      let error_name = error_artifact_name(moniker);
      if let Err(e) = self.store.delete(&error_name) {
        warn!(%moniker, file = %error_name, error = %e, "failed to remove stale error artifact");
      }
    }

    debug!(%moniker, artifacts = served.len(), failed, "processed bundle");
    state.built = true;
    state.served = served;
    if !good.is_empty() {
      state.good = good;
    }
    let paths = state.served.iter().chain(state.good_artifacts()).map(|a| a.path.clone()).collect();
    lock(&self.claims).insert(key, paths);
    self.processed.store(true, Ordering::SeqCst);
    Ok(())
  }

  /// Assign the loaded mapping entry of `moniker` to its topics.
  ///
  /// Combined bundles take the whole entry. Otherwise each topic takes the
  /// first unused artifact carrying its name, so same-named sources keep
  /// their declaration order.
  fn seed_from_mapping(&self, moniker: &Moniker, topics: &[Topic]) -> Vec<(String, Artifact)> {
    let Some(mut remaining) = lock(&self.loaded).get(&moniker.to_string()).cloned() else {
      return Vec::new();
    };

    if self.config.minify {
      let Some(topic) = topics.first() else {
        return Vec::new();
      };
      return remaining.into_iter().map(|a| (topic.key.clone(), a)).collect();
    }

    let mut seeded = Vec::new();
    for topic in topics {
      let pattern = topic_pattern(&topic.name, moniker.ext(), false);
      if let Some(pos) = remaining.iter().position(|a| pattern.matches(&a.name)) {
        seeded.push((topic.key.clone(), remaining.remove(pos)));
      }
    }
    seeded
  }

  /// Artifacts served or kept by every bundle other than `moniker`, plus the
  /// loaded mapping entries of other monikers.
  fn claimed_by_others(&self, moniker: &str) -> BTreeSet<PathBuf> {
    let mut claimed = BTreeSet::new();
    for (other, paths) in lock(&self.claims).iter() {
      if other != moniker {
        claimed.extend(paths.iter().cloned());
      }
    }
    for (other, artifacts) in lock(&self.loaded).iter() {
      if other != moniker {
        claimed.extend(artifacts.iter().map(|a| a.path.clone()));
      }
    }
    claimed
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn base_url(&self) -> &str {
    &self.config.base_url
  }

  pub fn helper(&self) -> &str {
    &self.config.helper
  }

  /// Extra response headers for served artifacts.
  pub fn headers(&self) -> &BTreeMap<String, String> {
    &self.config.headers
  }

  pub fn out_dir(&self) -> &Path {
    self.store.out_dir()
  }

  pub fn store(&self) -> &ContentStore {
    &self.store
  }

  pub fn registry(&self) -> &TransformRegistry {
    &self.registry
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|e| e.into_inner())
}
