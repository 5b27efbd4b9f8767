//! Asset bundle names.
//!
//! A moniker such as `app.css` names a declared bundle. The part before the
//! last dot becomes the artifact name prefix and the extension selects the
//! output content type.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// A validated `name.ext` bundle identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Moniker {
  name: String,
  ext: String,
}

impl Moniker {
  pub fn parse(s: &str) -> Result<Self, ConfigError> {
    let invalid = || ConfigError::InvalidMoniker(s.to_string());

    let (name, ext) = s.rsplit_once('.').ok_or_else(invalid)?;
    if name.is_empty() || ext.is_empty() {
      return Err(invalid());
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
      return Err(invalid());
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
      return Err(invalid());
    }

    Ok(Self {
      name: name.to_string(),
      ext: ext.to_string(),
    })
  }

  /// The bundle name without extension (`app` for `app.css`).
  pub fn name(&self) -> &str {
    &self.name
  }

  /// The output extension (`css` for `app.css`).
  pub fn ext(&self) -> &str {
    &self.ext
  }

  /// Whether artifacts of this bundle are stylesheets.
  pub fn is_css(&self) -> bool {
    self.ext == "css"
  }

  /// Whether artifacts of this bundle are scripts.
  pub fn is_js(&self) -> bool {
    self.ext == "js"
  }
}

impl FromStr for Moniker {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for Moniker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.name, self.ext)
  }
}
