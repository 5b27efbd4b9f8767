//! Implementation of the `assetpack get` command.

use anyhow::{Result, bail};

use assetpack_lib::{Assets, GetOptions};

use crate::manifest::Manifest;
use crate::output::{self, OutputFormat};

/// Print the URLs (or inline content) recorded for `moniker`.
///
/// Nothing is built: the artifacts come from the saved mapping.
pub fn cmd_get(manifest: &Manifest, moniker: &str, inline: bool, verbose: bool, format: OutputFormat) -> Result<()> {
  let pack = manifest.pack(verbose)?;
  pack.load_mapping();

  let options = GetOptions {
    inline,
    ..GetOptions::default()
  };
  let assets = pack.get(moniker, options)?;
  if assets.is_empty() {
    bail!("No artifacts recorded for {moniker}; run 'assetpack build' first");
  }

  match assets {
    Assets::Inline(content) if format.is_json() => output::json(&serde_json::json!({ "content": content }))?,
    Assets::Inline(content) => print!("{content}"),
    Assets::Urls(urls) if format.is_json() => output::json(&urls)?,
    Assets::Urls(urls) => {
      for url in urls {
        println!("{url}");
      }
    }
    Assets::Artifacts(artifacts) => output::json(&artifacts)?,
  }
  Ok(())
}
