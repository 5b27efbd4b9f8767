//! Wildcard expansion of source references.
//!
//! Supported wildcards: `?` (one character), `*` (any run of characters
//! within one path segment) and `**` (any number of segments). Patterns are
//! matched against paths relative to each search root and the result is
//! sorted and de-duplicated by relative path.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::trace;
use walkdir::WalkDir;

/// Whether a reference contains wildcard characters.
pub fn is_glob(reference: &str) -> bool {
  reference.contains(['*', '?'])
}

/// Expand `pattern` against every root.
///
/// Relative patterns return root-relative references (so they resolve again
/// through the search path); absolute patterns return absolute paths.
pub fn expand(pattern: &str, roots: &[PathBuf]) -> Vec<String> {
  let normalized = pattern.replace('\\', "/");
  let (prefix, rest) = split_literal_prefix(&normalized);
  let recursive = rest.contains("**");
  let depth = rest.split('/').count();

  let bases: Vec<PathBuf> = if Path::new(&normalized).is_absolute() {
    vec![PathBuf::from(if prefix.is_empty() { "/" } else { prefix })]
  } else {
    roots
      .iter()
      .map(|root| if prefix.is_empty() { root.clone() } else { root.join(prefix) })
      .collect()
  };

  let mut matches = BTreeSet::new();
  for base in bases {
    if !base.is_dir() {
      continue;
    }

    let mut walker = WalkDir::new(&base).follow_links(true).min_depth(1);
    if !recursive {
      walker = walker.max_depth(depth);
    }

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
      if !entry.file_type().is_file() {
        continue;
      }
      let Ok(rel) = entry.path().strip_prefix(&base) else {
        continue;
      };
      let rel = rel.to_string_lossy().replace('\\', "/");
      if wildcard_match(rest, &rel) {
        let full = if prefix.is_empty() {
          rel
        } else {
          format!("{}/{}", prefix.trim_end_matches('/'), rel)
        };
        trace!(pattern, matched = %full, "glob match");
        matches.insert(full);
      }
    }
  }

  matches.into_iter().collect()
}

/// Split `a/b/*.css` into (`a/b`, `*.css`).
fn split_literal_prefix(pattern: &str) -> (&str, &str) {
  let wildcard = pattern.find(['*', '?']).unwrap_or(pattern.len());
  match pattern[..wildcard].rfind('/') {
    Some(0) => ("/", &pattern[1..]),
    Some(slash) => (&pattern[..slash], &pattern[slash + 1..]),
    None => ("", pattern),
  }
}

/// Match a `/`-separated path against a wildcard pattern.
pub fn wildcard_match(pattern: &str, path: &str) -> bool {
  let pattern: Vec<char> = pattern.chars().collect();
  let path: Vec<char> = path.chars().collect();
  match_from(&pattern, &path)
}

fn match_from(p: &[char], s: &[char]) -> bool {
  match p.first() {
    None => s.is_empty(),
    Some('*') if p.get(1) == Some(&'*') => {
      let rest = &p[2..];
      if let Some(after_slash) = rest.strip_prefix(&['/']) {
        // `**/` matches zero or more whole segments
        if match_from(after_slash, s) {
          return true;
        }
        (0..s.len()).any(|i| s[i] == '/' && match_from(after_slash, &s[i + 1..]))
      } else {
        (0..=s.len()).any(|i| match_from(rest, &s[i..]))
      }
    }
    Some('*') => {
      for i in 0..=s.len() {
        if match_from(&p[1..], &s[i..]) {
          return true;
        }
        if i < s.len() && s[i] == '/' {
          break;
        }
      }
      false
    }
    Some('?') => s.first().is_some_and(|c| *c != '/') && match_from(&p[1..], &s[1..]),
    Some(c) => s.first() == Some(c) && match_from(&p[1..], &s[1..]),
  }
}
