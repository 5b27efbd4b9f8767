//! Remote source handlers.
//!
//! Each URL scheme maps to one [`Handler`] variant. HTTP(S) downloads are
//! written to `<out_dir>/cache/<sanitized url>` and reused on later lookups
//! without revalidation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::ResolveError;
use crate::consts::MAX_REDIRECTS;

/// Scheme handlers for remote references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
  Http,
  Https,
  File,
}

impl Handler {
  /// Select the handler for a URL's scheme.
  pub fn for_url(url: &str) -> Result<Self, ResolveError> {
    let scheme = url_scheme(url).unwrap_or("");
    match scheme.to_ascii_lowercase().as_str() {
      "http" => Ok(Handler::Http),
      "https" => Ok(Handler::Https),
      "file" => Ok(Handler::File),
      _ => Err(ResolveError::UnsupportedScheme {
        reference: url.to_string(),
        scheme: scheme.to_string(),
      }),
    }
  }

  /// Materialize `url` as a local file.
  pub fn fetch(self, client: &Client, url: &str, cache_dir: &Path) -> Result<PathBuf, ResolveError> {
    match self {
      Handler::Http | Handler::Https => fetch_http(client, url, cache_dir),
      Handler::File => fetch_file(url),
    }
  }
}

/// Build the HTTP client used for remote sources.
pub fn http_client() -> Result<Client, ResolveError> {
  Client::builder()
    .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
    .user_agent(concat!("assetpack/", env!("CARGO_PKG_VERSION")))
    .build()
    .map_err(|e| ResolveError::Fetch {
      url: String::new(),
      message: e.to_string(),
    })
}

/// The scheme of `reference` if it looks like `scheme://...`.
pub fn url_scheme(reference: &str) -> Option<&str> {
  let (scheme, _) = reference.split_once("://")?;
  let valid = !scheme.is_empty()
    && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
    && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
  valid.then_some(scheme)
}

fn fetch_http(client: &Client, url: &str, cache_dir: &Path) -> Result<PathBuf, ResolveError> {
  let dest = cache_dir.join(cache_file_name(url));
  if dest.is_file() {
    debug!(url, path = %dest.display(), "using cached download");
    return Ok(dest);
  }

  info!(url, "fetching remote source");

  let response = client.get(url).send().map_err(|e| ResolveError::Fetch {
    url: url.to_string(),
    message: e.to_string(),
  })?;

  if !response.status().is_success() {
    return Err(ResolveError::HttpStatus {
      url: url.to_string(),
      status: response.status().as_u16(),
    });
  }

  let bytes = response.bytes().map_err(|e| ResolveError::Fetch {
    url: url.to_string(),
    message: e.to_string(),
  })?;

  fs::create_dir_all(cache_dir).map_err(|e| ResolveError::CreateCacheDir(cache_dir.to_path_buf(), e))?;

  let write_err = |source| ResolveError::WriteCache {
    path: dest.clone(),
    source,
  };
  let mut temp = NamedTempFile::new_in(cache_dir).map_err(write_err)?;
  temp.write_all(&bytes).map_err(write_err)?;
  temp.flush().map_err(write_err)?;
  temp.persist(&dest).map_err(|e| write_err(e.error))?;

  info!(path = %dest.display(), size = bytes.len(), "download complete");
  Ok(dest)
}

fn fetch_file(url: &str) -> Result<PathBuf, ResolveError> {
  let path = PathBuf::from(url.split_once("://").map(|(_, rest)| rest).unwrap_or(url));
  if path.is_file() {
    Ok(path)
  } else {
    Err(ResolveError::NotFound {
      reference: url.to_string(),
      searched: vec![path],
    })
  }
}

/// Convert a URL to a deterministic cache file name.
///
/// The scheme is dropped and every character outside `[A-Za-z0-9._-]` becomes
/// `_`. A query string is folded into a short hash placed before the
/// extension so the extension still selects the right transform.
pub fn cache_file_name(url: &str) -> String {
  let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
  let without_fragment = without_scheme.split('#').next().unwrap_or(without_scheme);
  let (path, query) = match without_fragment.split_once('?') {
    Some((path, query)) => (path, Some(query)),
    None => (without_fragment, None),
  };

  let sanitized: String = path
    .trim_end_matches('/')
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
        c
      } else {
        '_'
      }
    })
    .collect();

  let sanitized = if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
    format!("download_{}", short_hash(url))
  } else {
    sanitized
  };

  match query {
    Some(_) => {
      let hash = short_hash(url);
      match sanitized.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains('_') => format!("{stem}-{hash}.{ext}"),
        _ => format!("{sanitized}-{hash}"),
      }
    }
    None => sanitized,
  }
}

fn short_hash(s: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(s.as_bytes());
  hex::encode(hasher.finalize())[..8].to_string()
}
