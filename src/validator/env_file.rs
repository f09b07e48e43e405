//! Flat `KEY=VALUE` configuration file of the dependent service.
//!
//! Parsing is permissive: blank lines, `#` comments and lines without `=`
//! are carried through untouched, and so are entries nobody changed. A key
//! that appears more than once keeps its first position and its last value;
//! rendering writes it once.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum EnvFileError {
    #[error("config file {} not found", .0.display())]
    Missing(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry {
        key: String,
        value: String,
        /// Source text while the entry is unmodified
        raw: Option<String>,
    },
    /// Comment, blank or unparseable line, kept verbatim
    Verbatim(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyConfig {
    lines: Vec<Line>,
    duplicates: Vec<String>,
}

impl DependencyConfig {
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                config.lines.push(Line::Verbatim(raw.to_string()));
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                config.lines.push(Line::Verbatim(raw.to_string()));
                continue;
            };
            let key = key.trim().trim_start_matches("export ").trim();
            if key.is_empty() {
                config.lines.push(Line::Verbatim(raw.to_string()));
                continue;
            }
            let value = value.trim();
            if config.get(key).is_some() {
                if !config.duplicates.iter().any(|d| d == key) {
                    config.duplicates.push(key.to_string());
                }
                config.set(key, value);
            } else {
                config.lines.push(Line::Entry {
                    key: key.to_string(),
                    value: value.to_string(),
                    raw: Some(raw.to_string()),
                });
            }
        }
        config
    }

    pub fn load(path: &Path) -> Result<Self, EnvFileError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EnvFileError::Missing(path.to_path_buf()))
            }
            Err(source) => Err(EnvFileError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Full-file rewrite.
    pub fn save(&self, path: &Path) -> Result<(), EnvFileError> {
        std::fs::write(path, self.render()).map_err(|source| EnvFileError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Entry {
                    raw: Some(text), ..
                } => out.push_str(text),
                Line::Entry { key, value, .. } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                }
                Line::Verbatim(text) => out.push_str(text),
            }
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace the value in place, or append a new entry.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        for line in &mut self.lines {
            if let Line::Entry { key: k, value: v, raw } = line {
                if k == key {
                    *v = value;
                    *raw = None;
                    return;
                }
            }
        }
        self.lines.push(Line::Entry {
            key: key.to_string(),
            value,
            raw: None,
        });
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry { key, .. } => Some(key.as_str()),
            Line::Verbatim(_) => None,
        })
    }

    /// Keys that appeared more than once in the parsed text.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Comma-separated list under `key`, surrounding quotes stripped.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                unquote(value)
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_list(&mut self, key: &str, items: &[String]) {
        self.set(key, items.join(","));
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
