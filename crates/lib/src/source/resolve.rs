//! Memoizing source resolver.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reqwest::blocking::Client;
use tracing::{debug, trace, warn};

use super::fetch::{self, Handler, url_scheme};
use super::glob;
use super::{ResolveError, Source};

/// Maps declared references to readable [`Source`]s.
///
/// Local references are searched under each search root in order (first
/// match wins). URLs go through their scheme [`Handler`]. Resolved sources
/// are memoized for the lifetime of the resolver.
pub struct SourceResolver {
  search_paths: Vec<PathBuf>,
  cache_dir: PathBuf,
  app_url: Option<String>,
  client: Client,
  resolved: Mutex<HashMap<String, Arc<Source>>>,
}

impl std::fmt::Debug for SourceResolver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SourceResolver")
      .field("search_paths", &self.search_paths)
      .field("cache_dir", &self.cache_dir)
      .field("app_url", &self.app_url)
      .finish_non_exhaustive()
  }
}

impl SourceResolver {
  /// Create a resolver.
  ///
  /// # Arguments
  ///
  /// * `search_paths` - Roots searched for local references, in order
  /// * `cache_dir` - Directory receiving downloaded remote sources
  /// * `app_url` - Base URL tried for references found nowhere else
  pub fn new(search_paths: Vec<PathBuf>, cache_dir: PathBuf, app_url: Option<String>) -> Result<Self, ResolveError> {
    Ok(Self {
      search_paths,
      cache_dir,
      app_url,
      client: fetch::http_client()?,
      resolved: Mutex::new(HashMap::new()),
    })
  }

  pub fn search_paths(&self) -> &[PathBuf] {
    &self.search_paths
  }

  /// Expand a declared reference into concrete references.
  ///
  /// Globs that do not exist literally are expanded against every search
  /// root. A glob without matches is kept as-is so the build reports it.
  pub fn expand(&self, reference: &str) -> Vec<String> {
    if url_scheme(reference).is_some() || !glob::is_glob(reference) || self.find_local(reference).is_some() {
      return vec![reference.to_string()];
    }

    let expanded = glob::expand(reference, &self.search_paths);
    if expanded.is_empty() {
      warn!(pattern = reference, "glob matched no files");
      return vec![reference.to_string()];
    }
    debug!(pattern = reference, count = expanded.len(), "expanded glob");
    expanded
  }

  /// Resolve a reference, returning the memoized source when available.
  pub fn resolve(&self, reference: &str) -> Result<Arc<Source>, ResolveError> {
    if let Some(source) = self.lock().get(reference) {
      trace!(reference, "source cache hit");
      return Ok(Arc::clone(source));
    }

    let source = Arc::new(self.resolve_uncached(reference)?);
    self
      .lock()
      .entry(reference.to_string())
      .or_insert_with(|| Arc::clone(&source));
    Ok(source)
  }

  /// Resolve a reference found inside another source, such as an `@import`.
  ///
  /// The importing file's directory is tried before the search roots.
  pub fn resolve_relative(&self, reference: &str, base_dir: &Path) -> Result<Arc<Source>, ResolveError> {
    if url_scheme(reference).is_none() {
      let candidate = base_dir.join(reference);
      if is_readable(&candidate) {
        let key = candidate.to_string_lossy().to_string();
        return self.resolve(&key);
      }
    }
    self.resolve(reference)
  }

  /// Download a remote resource into the cache and return its local path.
  pub fn fetch(&self, url: &str) -> Result<PathBuf, ResolveError> {
    Handler::for_url(url)?.fetch(&self.client, url, &self.cache_dir)
  }

  fn resolve_uncached(&self, reference: &str) -> Result<Source, ResolveError> {
    if url_scheme(reference).is_some() {
      let path = self.fetch(reference)?;
      return Ok(Source::remote(reference, path));
    }

    if let Some(path) = self.find_local(reference) {
      debug!(reference, path = %path.display(), "resolved local source");
      return Ok(Source::local(reference, path));
    }

    if let Some(app_url) = &self.app_url {
      let url = format!("{}/{}", app_url.trim_end_matches('/'), reference.trim_start_matches('/'));
      match self.fetch(&url) {
        Ok(path) => {
          debug!(reference, url = %url, "resolved source through application url");
          return Ok(Source::remote(reference, path));
        }
        Err(e) => debug!(reference, url = %url, error = %e, "application url fallback failed"),
      }
    }

    Err(ResolveError::NotFound {
      reference: reference.to_string(),
      searched: self.search_paths.clone(),
    })
  }

  fn find_local(&self, reference: &str) -> Option<PathBuf> {
    let path = Path::new(reference);
    if path.is_absolute() {
      return is_readable(path).then(|| dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
    }
    self
      .search_paths
      .iter()
      .map(|root| root.join(reference))
      .find(|candidate| is_readable(candidate))
      .map(|candidate| dunce::canonicalize(&candidate).unwrap_or(candidate))
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Source>>> {
    self.resolved.lock().unwrap_or_else(|e| e.into_inner())
  }
}

fn is_readable(path: &Path) -> bool {
  path.is_file() && fs::File::open(path).is_ok()
}
