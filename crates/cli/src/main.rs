mod cmd;
mod manifest;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{cmd_build, cmd_fetch, cmd_get, cmd_purge};
use manifest::Manifest;
use output::OutputFormat;

/// assetpack - Build, serve and clean up content-addressed asset bundles
#[derive(Parser)]
#[command(name = "assetpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the asset manifest
  #[arg(short, long, global = true, default_value = "assets.json")]
  manifest: PathBuf,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every bundle of the manifest and save the mapping
  Build,

  /// Print the URLs of a built bundle
  Get {
    /// Bundle name, e.g. app.css
    moniker: String,

    /// Print the artifact content instead of URLs
    #[arg(long)]
    inline: bool,
  },

  /// Download a remote resource into the fetch cache
  Fetch {
    /// URL to download
    url: String,
  },

  /// Build, then remove artifacts no bundle references anymore
  Purge {
    /// Purge outside development mode too
    #[arg(long)]
    always: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  let manifest = Manifest::load(&cli.manifest)?;
  let verbose = cli.verbose || manifest.config.clone().with_env_overrides().debug;

  let default_level = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build => cmd_build(&manifest, verbose, cli.output),
    Commands::Get { moniker, inline } => cmd_get(&manifest, &moniker, inline, verbose, cli.output),
    Commands::Fetch { url } => cmd_fetch(&manifest, &url, verbose, cli.output),
    Commands::Purge { always } => cmd_purge(&manifest, always, verbose, cli.output),
  }
}
