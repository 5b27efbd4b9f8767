//! Stylesheet transform.
//!
//! Inlines local `@import` rules and minifies when requested. Remote imports
//! and imports carrying a media query are left in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::{Transform, TransformContext, TransformError};
use crate::source::Source;
use crate::source::fetch::url_scheme;

#[derive(Debug, Default, Clone, Copy)]
pub struct CssTransform;

/// An inlineable `@import` rule: byte range of the whole rule and its target.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Import {
  start: usize,
  end: usize,
  target: String,
}

impl Transform for CssTransform {
  fn name(&self) -> &str {
    "css"
  }

  fn dependencies(
    &self,
    ctx: &TransformContext<'_>,
    source: &Source,
    content: &str,
  ) -> Result<Vec<Arc<Source>>, TransformError> {
    find_imports(content)
      .map_err(|message| syntax(source, message))?
      .iter()
      .map(|import| resolve_import(ctx, source, &import.target))
      .collect()
  }

  fn transform(&self, ctx: &TransformContext<'_>, source: &Source, content: String) -> Result<String, TransformError> {
    let mut stack = vec![source.path().to_path_buf()];
    let inlined = inline(ctx, source, content, &mut stack)?;
    if ctx.minify {
      Ok(minify_css(&inlined))
    } else {
      Ok(inlined)
    }
  }
}

fn inline(
  ctx: &TransformContext<'_>,
  source: &Source,
  content: String,
  stack: &mut Vec<PathBuf>,
) -> Result<String, TransformError> {
  let imports = find_imports(&content).map_err(|message| syntax(source, message))?;
  if imports.is_empty() {
    return Ok(content);
  }

  let mut out = String::with_capacity(content.len());
  let mut last = 0;
  for import in &imports {
    let dependency = resolve_import(ctx, source, &import.target)?;
    if stack.iter().any(|p| p == dependency.path()) {
      return Err(syntax(source, format!("circular @import of '{}'", import.target)));
    }

    debug!(path = %source.path().display(), import = %import.target, "inlining import");
    let body = if dependency.ext() == "css" {
      stack.push(dependency.path().to_path_buf());
      let body = inline(ctx, &dependency, dependency.read()?, stack)?;
      stack.pop();
      body
    } else {
      ctx.registry.transform(ctx, &dependency)?
    };

    out.push_str(&content[last..import.start]);
    out.push_str(body.trim_end());
    last = import.end;
  }
  out.push_str(&content[last..]);
  Ok(out)
}

fn resolve_import(ctx: &TransformContext<'_>, source: &Source, target: &str) -> Result<Arc<Source>, TransformError> {
  let base = source.path().parent().unwrap_or(Path::new("."));
  ctx
    .resolver
    .resolve_relative(target, base)
    .map_err(|e| TransformError::Import {
      path: source.path().to_path_buf(),
      reference: target.to_string(),
      source: e,
    })
}

fn syntax(source: &Source, message: impl Into<String>) -> TransformError {
  TransformError::Syntax {
    path: source.path().to_path_buf(),
    message: message.into(),
  }
}

fn is_local(target: &str) -> bool {
  url_scheme(target).is_none() && !target.starts_with("//") && !target.starts_with("data:")
}

/// Scan a stylesheet for local `@import` rules, checking that comments,
/// strings and braces are balanced along the way.
fn find_imports(content: &str) -> Result<Vec<Import>, String> {
  let bytes = content.as_bytes();
  let mut imports = Vec::new();
  let mut depth = 0usize;
  let mut i = 0;

  while i < bytes.len() {
    match bytes[i] {
      b'/' if bytes.get(i + 1) == Some(&b'*') => {
        i = skip_comment(bytes, i).ok_or("unterminated comment")?;
      }
      b'"' | b'\'' => {
        i = skip_string(bytes, i).ok_or("unterminated string")?;
      }
      b'{' => {
        depth += 1;
        i += 1;
      }
      b'}' => {
        depth = depth.checked_sub(1).ok_or("unexpected '}'")?;
        i += 1;
      }
      b'@' if depth == 0 && content[i..].starts_with("@import") => {
        let (end, import) = parse_import(content, i)?;
        if let Some(import) = import {
          if is_local(&import.target) {
            imports.push(import);
          }
        }
        i = end;
      }
      _ => i += 1,
    }
  }

  if depth > 0 {
    return Err("unclosed '{'".to_string());
  }
  Ok(imports)
}

/// Parse the rule starting at `start` (which points at `@import`).
///
/// Returns the index to continue scanning at and the import if the rule has
/// the plain `@import <target>;` shape.
fn parse_import(content: &str, start: usize) -> Result<(usize, Option<Import>), String> {
  let bytes = content.as_bytes();
  let mut j = skip_ws(bytes, start + "@import".len());

  let target = if content[j..].starts_with("url(") {
    j = skip_ws(bytes, j + 4);
    let target = if matches!(bytes.get(j), Some(b'"' | b'\'')) {
      let end = skip_string(bytes, j).ok_or("unterminated string")?;
      let target = &content[j + 1..end - 1];
      j = skip_ws(bytes, end);
      target
    } else {
      let close = content[j..].find(')').ok_or("unterminated url(")?;
      let target = content[j..j + close].trim();
      j += close;
      target
    };
    if bytes.get(j) != Some(&b')') {
      return Err("expected ')' after @import url".to_string());
    }
    j += 1;
    target
  } else if matches!(bytes.get(j), Some(b'"' | b'\'')) {
    let end = skip_string(bytes, j).ok_or("unterminated string")?;
    let target = &content[j + 1..end - 1];
    j = end;
    target
  } else {
    return Ok((start + 1, None));
  };

  j = skip_ws(bytes, j);
  if bytes.get(j) == Some(&b';') {
    let import = Import {
      start,
      end: j + 1,
      target: target.to_string(),
    };
    Ok((j + 1, Some(import)))
  } else {
    // media query or other qualifier: keep the rule as written
    Ok((j, None))
  }
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
  while i < bytes.len() && bytes[i].is_ascii_whitespace() {
    i += 1;
  }
  i
}

/// Index just past the comment starting at `i`.
fn skip_comment(bytes: &[u8], i: usize) -> Option<usize> {
  let mut j = i + 2;
  while j + 1 < bytes.len() {
    if bytes[j] == b'*' && bytes[j + 1] == b'/' {
      return Some(j + 2);
    }
    j += 1;
  }
  None
}

/// Index just past the string literal starting at `i`.
fn skip_string(bytes: &[u8], i: usize) -> Option<usize> {
  let quote = bytes[i];
  let mut j = i + 1;
  while j < bytes.len() {
    match bytes[j] {
      b'\\' => j += 2,
      b'\n' => return None,
      c if c == quote => return Some(j + 1),
      _ => j += 1,
    }
  }
  None
}

/// Strip comments and redundant whitespace from a stylesheet.
pub fn minify_css(input: &str) -> String {
  const TIGHT: &[char] = &['{', '}', ';', ',', '>'];

  let chars: Vec<char> = input.chars().collect();
  let mut out = String::with_capacity(input.len());
  let mut pending_space = false;
  let mut depth = 0usize;
  let mut i = 0;

  let push_space = |out: &mut String, pending: bool| {
    if pending && !out.is_empty() && !out.ends_with(TIGHT) && !out.ends_with(':') {
      out.push(' ');
    }
  };

  while i < chars.len() {
    let c = chars[i];

    if c == '/' && chars.get(i + 1) == Some(&'*') {
      i += 2;
      while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
        i += 1;
      }
      i += 2;
      continue;
    }

    if c == '"' || c == '\'' {
      push_space(&mut out, pending_space);
      pending_space = false;
      out.push(c);
      i += 1;
      while i < chars.len() {
        let s = chars[i];
        out.push(s);
        i += 1;
        if s == '\\' {
          if let Some(next) = chars.get(i) {
            out.push(*next);
            i += 1;
          }
        } else if s == c {
          break;
        }
      }
      continue;
    }

    if c.is_whitespace() {
      pending_space = true;
      i += 1;
      continue;
    }

    if TIGHT.contains(&c) {
      if c == '}' && out.ends_with(';') {
        out.pop();
      }
      match c {
        '{' => depth += 1,
        '}' => depth = depth.saturating_sub(1),
        _ => {}
      }
      out.push(c);
    } else if c == ':' && depth > 0 && in_declaration(&chars, i + 1) {
      out.push(c);
    } else {
      push_space(&mut out, pending_space);
      out.push(c);
    }
    pending_space = false;
    i += 1;
  }

  out
}

/// Whether the text from `from` on ends a declaration (`;` or `}`) before
/// it opens a block, i.e. a `:` just before it separates property and value
/// rather than starting a pseudo-class of a nested selector.
fn in_declaration(chars: &[char], from: usize) -> bool {
  let mut quote = None;
  for &c in chars.iter().skip(from) {
    match quote {
      Some(q) if c == q => quote = None,
      Some(_) => {}
      None => match c {
        '"' | '\'' => quote = Some(c),
        '{' => return false,
        ';' | '}' => return true,
        _ => {}
      },
    }
  }
  true
}
