//! Normalized step input.
//!
//! Whatever the caller supplies, or whatever the previous step produced, is
//! turned into a [`StepInput`] before an executor sees it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single media location handed to a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRef {
    Path(PathBuf),
    Url(String),
}

impl MediaRef {
    /// Interpret `location` as a URL when it has an http(s) scheme, otherwise
    /// as a filesystem path.
    pub fn from_location(location: &str) -> Self {
        if is_url(location) {
            Self::Url(location.to_string())
        } else {
            Self::Path(PathBuf::from(location))
        }
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Path(path) => Some(path),
            Self::Url(_) => None,
        }
    }
}

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Data flowing into a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepInput {
    #[default]
    None,
    Text(String),
    Path(PathBuf),
    Url(String),
    /// A collection of independent items, processed by fan-out executors.
    Many(Vec<StepInput>),
}

impl StepInput {
    /// Path or URL input from a location string.
    pub fn location(location: &str) -> Self {
        match MediaRef::from_location(location) {
            MediaRef::Path(path) => Self::Path(path),
            MediaRef::Url(url) => Self::Url(url),
        }
    }

    /// Build an input from loosely-shaped caller data: a string, a mapping
    /// carrying `output_path`/`path`/`output_url`/`url`/`text`, or a list of
    /// either.
    ///
    /// Plain strings are treated as locations when they look like a URL or
    /// an existing file, and as text otherwise.
    pub fn from_value(value: &Value) -> sf_core::Result<Self> {
        match value {
            Value::Null => Ok(Self::None),
            Value::String(s) => Ok(Self::from_str_guess(s)),
            Value::Array(items) => items
                .iter()
                .map(Self::from_value)
                .collect::<sf_core::Result<Vec<_>>>()
                .map(Self::Many),
            Value::Object(map) => {
                for key in ["output_path", "path"] {
                    if let Some(path) = map.get(key).and_then(Value::as_str) {
                        return Ok(Self::Path(PathBuf::from(path)));
                    }
                }
                for key in ["output_url", "url"] {
                    if let Some(url) = map.get(key).and_then(Value::as_str) {
                        return Ok(Self::Url(url.to_string()));
                    }
                }
                if let Some(paths) = map.get("output_paths").and_then(Value::as_array) {
                    return Self::from_value(&Value::Array(paths.clone()));
                }
                if let Some(text) = map.get("text").and_then(Value::as_str) {
                    return Ok(Self::Text(text.to_string()));
                }
                Err(sf_core::Error::Validation(
                    "input mapping needs one of output_path, path, output_url, url, output_paths or text"
                        .into(),
                ))
            }
            other => Err(sf_core::Error::Validation(format!(
                "unsupported input value: {other}"
            ))),
        }
    }

    fn from_str_guess(s: &str) -> Self {
        if is_url(s) || std::path::Path::new(s).is_file() {
            Self::location(s)
        } else {
            Self::Text(s.to_string())
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Text content, if this input is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Every media location in this input, flattening collections in order.
    pub fn media(&self) -> Vec<MediaRef> {
        let mut out = Vec::new();
        self.collect_media(&mut out);
        out
    }

    fn collect_media(&self, out: &mut Vec<MediaRef>) {
        match self {
            Self::Path(path) => out.push(MediaRef::Path(path.clone())),
            Self::Url(url) => out.push(MediaRef::Url(url.clone())),
            Self::Many(items) => items.iter().for_each(|item| item.collect_media(out)),
            Self::None | Self::Text(_) => {}
        }
    }

    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            Self::None => "none".into(),
            Self::Text(text) => format!("text ({} chars)", text.chars().count()),
            Self::Path(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::Many(items) => format!("{} items", items.len()),
        }
    }
}

impl From<&str> for StepInput {
    fn from(s: &str) -> Self {
        Self::from_str_guess(s)
    }
}

impl From<PathBuf> for StepInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}
