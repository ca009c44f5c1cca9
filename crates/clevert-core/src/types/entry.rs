//! Work items handed to an action's execute

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Group name used by the common-files strategy
pub const MAIN_GROUP: &str = "main";

/// One unit of work for an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    /// Named groups of input and output files
    Files {
        input: BTreeMap<String, Vec<PathBuf>>,
        output: BTreeMap<String, Vec<PathBuf>>,
    },

    /// Any JSON value, passed through untouched
    Plain(Value),
}

impl Entry {
    /// Single input/output pair in the `main` group
    pub fn files(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self::Files {
            input: BTreeMap::from([(MAIN_GROUP.to_string(), vec![input.into()])]),
            output: BTreeMap::from([(MAIN_GROUP.to_string(), vec![output.into()])]),
        }
    }

    /// First input of the `main` group
    pub fn main_input(&self) -> Option<&Path> {
        match self {
            Self::Files { input, .. } => input.get(MAIN_GROUP)?.first().map(PathBuf::as_path),
            Self::Plain(_) => None,
        }
    }

    /// First output of the `main` group
    pub fn main_output(&self) -> Option<&Path> {
        match self {
            Self::Files { output, .. } => output.get(MAIN_GROUP)?.first().map(PathBuf::as_path),
            Self::Plain(_) => None,
        }
    }
}
