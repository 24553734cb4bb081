//! The JSON report emitted by `drupal-check --format=json`.
//!
//! ```json
//! {
//!   "totals": { "errors": 0, "file_errors": 1 },
//!   "files": {
//!     "/app/web/modules/custom/foo/foo.module": {
//!       "errors": 1,
//!       "messages": [{ "message": "Undefined variable", "line": 3, "ignorable": true }]
//!     }
//!   },
//!   "errors": []
//! }
//! ```
//!
//! An empty `files` map is encoded by PHP as `[]`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::CheckerError;

/// A single message reported for a file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawMessage {
    /// 1-based line number. Some analyzer messages carry no line.
    #[serde(default)]
    pub line: Option<u32>,

    pub message: String,

    /// Optional severity tag; resolved through a `SeverityMap`.
    #[serde(default)]
    pub severity: Option<String>,

    #[serde(default)]
    pub ignorable: Option<bool>,

    #[serde(default)]
    pub tip: Option<String>,
}

/// Messages reported for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileReport {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// The parsed analyzer report, keyed by canonical absolute file path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalysisReport {
    #[serde(deserialize_with = "deserialize_files")]
    pub files: BTreeMap<String, FileReport>,

    /// General errors not attached to a file.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AnalysisReport {
    /// Parses analyzer stdout. Any malformed payload is an error.
    pub fn parse(stdout: &str) -> Result<Self, CheckerError> {
        serde_json::from_str(stdout.trim())
            .map_err(|e| CheckerError::invalid_output(e.to_string()))
    }

    /// Returns the messages recorded under exactly `canonical`.
    pub fn messages_for(&self, canonical: &Path) -> Option<&[RawMessage]> {
        let key = canonical.to_string_lossy();
        self.files.get(key.as_ref()).map(|f| f.messages.as_slice())
    }
}

fn deserialize_files<'de, D>(deserializer: D) -> Result<BTreeMap<String, FileReport>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Files {
        Map(BTreeMap<String, FileReport>),
        Empty(Vec<serde_json::Value>),
    }

    match Files::deserialize(deserializer)? {
        Files::Map(map) => Ok(map),
        Files::Empty(items) if items.is_empty() => Ok(BTreeMap::new()),
        Files::Empty(_) => Err(serde::de::Error::custom(
            "`files` must be an object keyed by file path",
        )),
    }
}
