//! Terminal and JSON output for the `assetpack` commands.
//!
//! Status lines start with a colored marker when the stream supports it.
//! Warnings go to stderr so `-o json` output on stdout stays parseable.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Leading marker of a status line.
#[derive(Debug, Clone, Copy)]
enum Marker {
  Done,
  Warn,
  Note,
  Removed,
}

impl Marker {
  fn symbol(self) -> &'static str {
    match self {
      Marker::Done => "✓",
      Marker::Warn => "⚠",
      Marker::Note => "•",
      Marker::Removed => "-",
    }
  }

  fn stream(self) -> Stream {
    match self {
      Marker::Warn => Stream::Stderr,
      _ => Stream::Stdout,
    }
  }

  fn render(self) -> String {
    let symbol = self.symbol();
    let stream = self.stream();
    match self {
      Marker::Done => symbol.if_supports_color(stream, |s| s.green()).to_string(),
      Marker::Warn => symbol.if_supports_color(stream, |s| s.yellow()).to_string(),
      Marker::Note => symbol.if_supports_color(stream, |s| s.blue()).to_string(),
      Marker::Removed => symbol.if_supports_color(stream, |s| s.red()).to_string(),
    }
  }
}

/// Human-readable size, binary units.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{bytes} B")
  } else {
    format!("{value:.1} {}", UNITS[unit])
  }
}

pub fn format_elapsed(elapsed: Duration) -> String {
  let millis = elapsed.as_millis();
  match millis {
    0..1_000 => format!("{millis}ms"),
    1_000..60_000 => format!("{:.2}s", elapsed.as_secs_f64()),
    _ => format!("{}m {}s", millis / 60_000, (millis % 60_000) / 1_000),
  }
}

pub fn success(message: &str) {
  println!("{} {message}", Marker::Done.render());
}

pub fn warning(message: &str) {
  eprintln!(
    "{} {}",
    Marker::Warn.render(),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn note(message: &str) {
  println!("{} {message}", Marker::Note.render());
}

/// An artifact deleted by a purge.
pub fn removed(path: &Path) {
  println!("  {} {}", Marker::Removed.render(), path.display());
}

/// A dimmed `label: value` detail line.
pub fn field(label: &str, value: &str) {
  println!("  {}: {value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

/// A bundle and the URLs it is served from, one per line.
pub fn bundle(moniker: &str, urls: &[String]) {
  println!("  {}", moniker.if_supports_color(Stream::Stdout, |s| s.bold()));
  if urls.is_empty() {
    println!("    {}", "(nothing served)".if_supports_color(Stream::Stdout, |s| s.dimmed()));
  }
  for url in urls {
    println!("    {url}");
  }
}

pub fn json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}
