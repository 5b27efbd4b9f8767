//! Implementation of the `assetpack fetch` command.

use anyhow::{Context, Result};

use crate::manifest::Manifest;
use crate::output::{self, OutputFormat};

/// Download `url` into the fetch cache and print the local path.
pub fn cmd_fetch(manifest: &Manifest, url: &str, verbose: bool, format: OutputFormat) -> Result<()> {
  let pack = manifest.pack(verbose)?;
  let path = pack.fetch(url).with_context(|| format!("Failed to fetch {url}"))?;

  if format.is_json() {
    output::json(&serde_json::json!({ "url": url, "path": path }))?;
  } else {
    println!("{}", path.display());
  }
  Ok(())
}
