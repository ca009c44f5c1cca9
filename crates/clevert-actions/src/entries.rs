//! Entry enumeration
//!
//! A run-action request carries an entries spec tagged by `kind`:
//!
//! - `common-files`: every file under `inputDir`, mirrored onto `outputDir`,
//!   optionally with its extension replaced by `outputExtension`; or an
//!   explicit `entries: [{inputFile, outputFile}]` list
//! - `plain`: the `entries` array as-is
//! - `number-sequence`: one numeric entry per value of `begin..end`, at most
//!   [`MAX_SEQUENCE_LEN`] of them

use std::path::{Path, PathBuf};

use clevert_core::types::Entry;
use clevert_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

/// Parsed entries spec
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EntriesSpec {
    CommonFiles(CommonFiles),
    Plain {
        #[serde(default)]
        entries: Vec<Value>,
    },
    NumberSequence {
        begin: i64,
        end: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonFiles {
    #[serde(default)]
    pub entries: Option<Vec<FilePair>>,
    /// Required unless `entries` is given
    #[serde(default)]
    pub input_dir: Option<String>,
    /// Required unless `entries` is given
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub output_extension: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePair {
    pub input_file: String,
    pub output_file: String,
}

const KINDS: [&str; 3] = ["common-files", "plain", "number-sequence"];

/// Longest `number-sequence` accepted
pub const MAX_SEQUENCE_LEN: u64 = 1_000_000;

impl EntriesSpec {
    /// Parse a raw spec, reporting unknown kinds as `UnsupportedEntryKind`
    pub fn parse(spec: &Value) -> Result<Self> {
        let kind = spec.get("kind").and_then(Value::as_str).unwrap_or_default();
        if !KINDS.contains(&kind) {
            return Err(Error::UnsupportedEntryKind {
                kind: kind.to_string(),
            });
        }
        Ok(Self::deserialize(spec)?)
    }

    /// Produce the entries
    pub fn enumerate(&self) -> Result<Vec<Entry>> {
        match self {
            Self::CommonFiles(spec) => common_files(spec),
            Self::Plain { entries } => Ok(entries.iter().cloned().map(Entry::Plain).collect()),
            Self::NumberSequence { begin, end } => number_sequence(*begin, *end),
        }
    }
}

/// Parse and enumerate in one step
pub fn enumerate(spec: &Value) -> Result<Vec<Entry>> {
    let entries = EntriesSpec::parse(spec)?.enumerate()?;
    debug!("Enumerated {} entries", entries.len());
    Ok(entries)
}

fn common_files(spec: &CommonFiles) -> Result<Vec<Entry>> {
    if let Some(pairs) = &spec.entries {
        return pairs
            .iter()
            .map(|pair| {
                Ok(Entry::files(
                    resolve_path(&pair.input_file)?,
                    resolve_path(&pair.output_file)?,
                ))
            })
            .collect();
    }

    let input_dir = resolve_path(required(&spec.input_dir, "inputDir")?)?;
    let output_dir = resolve_path(required(&spec.output_dir, "outputDir")?)?;

    let mut entries = Vec::new();
    for item in WalkDir::new(&input_dir).sort_by_file_name() {
        let item = item.map_err(|e| Error::Io(e.into()))?;
        if !item.file_type().is_file() {
            continue;
        }
        let relative = item
            .path()
            .strip_prefix(&input_dir)
            .map_err(|e| Error::execution(e.to_string()))?;
        let mut output = output_dir.join(relative);
        if !spec.output_extension.is_empty() {
            output.set_extension(&spec.output_extension);
        }
        entries.push(Entry::files(item.path(), output));
    }
    Ok(entries)
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::invalid_entries(format!(
            "common-files needs {} or entries",
            field
        ))),
    }
}

fn number_sequence(begin: i64, end: i64) -> Result<Vec<Entry>> {
    if end < begin {
        return Err(Error::invalid_entries(format!(
            "sequence end {} is before begin {}",
            end, begin
        )));
    }
    let len = end.abs_diff(begin);
    if len > MAX_SEQUENCE_LEN {
        return Err(Error::invalid_entries(format!(
            "sequence {}..{} has {} entries, limit is {}",
            begin, end, len, MAX_SEQUENCE_LEN
        )));
    }
    Ok((begin..end).map(|n| Entry::Plain(Value::from(n))).collect())
}

/// Expand a leading `~` and make the path absolute against the working directory
pub fn resolve_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::tilde(raw);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
