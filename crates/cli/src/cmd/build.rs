//! Implementation of the `assetpack build` command.
//!
//! Declares and builds every bundle of the manifest, then saves the mapping
//! so later `get` calls (and restarted hosts) can serve the artifacts.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use assetpack_lib::{AssetPack, Assets, GetOptions};

use crate::manifest::Manifest;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize)]
struct BuildSummary {
  out_dir: String,
  assets: BTreeMap<String, Vec<String>>,
  mapping_saved: bool,
}

/// Declare and build every manifest bundle. Returns moniker to URLs.
pub fn process_all(pack: &AssetPack, manifest: &Manifest) -> Result<BTreeMap<String, Vec<String>>> {
  let mut built = BTreeMap::new();
  for (moniker, references) in &manifest.assets {
    pack
      .process(moniker, references)
      .with_context(|| format!("Failed to process {moniker}"))?;
    let urls = match pack.get(moniker, GetOptions::default())? {
      Assets::Urls(urls) => urls,
      _ => Vec::new(),
    };
    built.insert(moniker.clone(), urls);
  }
  Ok(built)
}

pub fn cmd_build(manifest: &Manifest, verbose: bool, format: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let pack = manifest.pack(verbose)?;

  let assets = process_all(&pack, manifest)?;
  let mapping_saved = pack.save_mapping();

  if format.is_json() {
    return output::json(&BuildSummary {
      out_dir: pack.out_dir().display().to_string(),
      assets,
      mapping_saved,
    });
  }

  println!();
  output::success(&format!("Built {} bundle(s)", assets.len()));
  for (moniker, urls) in &assets {
    output::bundle(moniker, urls);
  }
  output::field("Output", &pack.out_dir().display().to_string());
  output::field("Duration", &output::format_elapsed(start.elapsed()));
  if !mapping_saved {
    output::warning("Could not save the asset mapping");
  }

  Ok(())
}
