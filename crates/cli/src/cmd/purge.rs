//! Implementation of the `assetpack purge` command.
//!
//! Builds the manifest first so the in-memory table knows which artifacts are
//! current, then removes the rest.

use anyhow::{Context, Result};

use assetpack_lib::PurgeOptions;

use crate::cmd::build::process_all;
use crate::manifest::Manifest;
use crate::output::{self, OutputFormat};

pub fn cmd_purge(manifest: &Manifest, always: bool, verbose: bool, format: OutputFormat) -> Result<()> {
  let pack = manifest.pack(verbose)?;
  pack.load_mapping();

  process_all(&pack, manifest)?;
  let options = PurgeOptions {
    always: always.then_some(true),
  };
  let report = pack.purge(options).context("Purge failed")?;
  pack.save_mapping();

  if format.is_json() {
    return output::json(&report);
  }

  println!();
  if report.deleted.is_empty() {
    output::note("Nothing to purge");
    if !always && !pack.config().is_development() {
      output::note("Purging is off outside development mode; pass --always to force it");
    }
    return Ok(());
  }

  output::success("Purge complete!");
  for path in &report.deleted {
    output::removed(path);
  }
  output::field("Artifacts removed", &report.deleted.len().to_string());
  output::field("Space freed", &output::format_bytes(report.bytes));
  Ok(())
}
