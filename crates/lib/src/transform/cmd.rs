//! External command transform.
//!
//! Pipes source content through a program on stdin and uses its stdout as the
//! transformed content. This is how preprocessors (`sass`, `lessc`,
//! `coffee`) and minifiers plug into the pipeline.
//!
//! Arguments may contain `{path}` (the source file) and `{dir}` (its
//! directory) placeholders.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Transform, TransformContext, TransformError};
use crate::source::Source;

/// Declarative description of an external transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
  /// Program to run, looked up on `PATH`.
  pub program: String,
  /// Arguments for a normal build.
  #[serde(default)]
  pub args: Vec<String>,
  /// Arguments used instead of `args` when minifying.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub minify_args: Option<Vec<String>>,
}

/// A transform backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandTransform {
  name: String,
  spec: CommandSpec,
}

impl CommandTransform {
  pub fn new(name: impl Into<String>, spec: CommandSpec) -> Self {
    Self {
      name: name.into(),
      spec,
    }
  }

  fn args(&self, minify: bool, path: &Path) -> Vec<String> {
    let args = match (&self.spec.minify_args, minify) {
      (Some(minify_args), true) => minify_args,
      _ => &self.spec.args,
    };
    let dir = path.parent().unwrap_or(Path::new("."));
    args
      .iter()
      .map(|arg| {
        arg
          .replace("{path}", &path.to_string_lossy())
          .replace("{dir}", &dir.to_string_lossy())
      })
      .collect()
  }
}

impl Transform for CommandTransform {
  fn name(&self) -> &str {
    &self.name
  }

  fn transform(&self, ctx: &TransformContext<'_>, source: &Source, content: String) -> Result<String, TransformError> {
    let path = source.path();
    let args = self.args(ctx.minify, path);
    info!(program = %self.spec.program, path = %path.display(), "running transform command");

    let spawn_err = |e| TransformError::Spawn {
      program: self.spec.program.clone(),
      path: path.to_path_buf(),
      source: e,
    };

    let mut command = Command::new(&self.spec.program);
    command
      .args(&args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    if let Some(dir) = path.parent() {
      command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(spawn_err)?;

    // Feed stdin from a separate thread so a chatty child cannot block on a
    // full stdout pipe while we are still writing.
    let stdin = child.stdin.take();
    let writer = std::thread::spawn(move || -> std::io::Result<()> {
      if let Some(mut stdin) = stdin {
        stdin.write_all(content.as_bytes())?;
      }
      Ok(())
    });

    let output = child.wait_with_output().map_err(spawn_err)?;
    let write_result = writer.join().unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      let stdout = String::from_utf8_lossy(&output.stdout);
      if !stdout.is_empty() {
        debug!(stdout = %stdout, "command stdout");
      }
      return Err(TransformError::CommandFailed {
        program: self.spec.program.clone(),
        path: path.to_path_buf(),
        code: output.status.code(),
        stderr,
      });
    }

    // A program may legitimately exit before reading all of stdin.
    if let Err(e) = write_result {
      debug!(error = %e, "command did not consume all input");
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}
