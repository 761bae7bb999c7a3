//! The persisted state document
//!
//! ```json
//! {
//!   "version": 1,
//!   "processed": { "B000000001": { "title": "...", "status": "complete", ... } },
//!   "failed": { "path:/incoming/x": { "identity": null, "error": "...", ... } }
//! }
//! ```

use audioshelf_core::{Identity, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Current document schema version
pub const STATE_VERSION: u32 = 1;

/// Resumable stages of the multi-stage workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Staged,
    MetadataFetched,
    TorrentBuilt,
    Uploaded,
}

impl Stage {
    pub fn all() -> [Stage; 4] {
        [
            Self::Staged,
            Self::MetadataFetched,
            Self::TorrentBuilt,
            Self::Uploaded,
        ]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staged => write!(f, "staged"),
            Self::MetadataFetched => write!(f, "metadata_fetched"),
            Self::TorrentBuilt => write!(f, "torrent_built"),
            Self::Uploaded => write!(f, "uploaded"),
        }
    }
}

/// Per-stage completion timestamps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_fetched: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_built: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<Timestamp>,
}

impl Checkpoints {
    pub fn get(&self, stage: Stage) -> Option<Timestamp> {
        match stage {
            Stage::Staged => self.staged,
            Stage::MetadataFetched => self.metadata_fetched,
            Stage::TorrentBuilt => self.torrent_built,
            Stage::Uploaded => self.uploaded,
        }
    }

    pub fn set(&mut self, stage: Stage, at: Timestamp) {
        let slot = match stage {
            Stage::Staged => &mut self.staged,
            Stage::MetadataFetched => &mut self.metadata_fetched,
            Stage::TorrentBuilt => &mut self.torrent_built,
            Stage::Uploaded => &mut self.uploaded,
        };
        *slot = Some(at);
    }

    /// Fills stages missing here from `other`; recorded stages are kept
    pub fn merge(&mut self, other: &Checkpoints) {
        for stage in Stage::all() {
            if self.get(stage).is_none() {
                if let Some(at) = other.get(stage) {
                    self.set(stage, at);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        Stage::all().iter().all(|stage| self.get(*stage).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Some stages checkpointed, workflow not finished
    InProgress,
    Complete,
}

/// A fully or partially processed identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    pub processed_at: Timestamp,
    #[serde(default)]
    pub staging_path: Option<PathBuf>,
    #[serde(default)]
    pub torrent_path: Option<PathBuf>,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Checkpoints::is_empty")]
    pub checkpoints: Checkpoints,
}

impl ProcessedRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: None,
            series: None,
            processed_at: Timestamp::now(),
            staging_path: None,
            torrent_path: None,
            status: RecordStatus::Complete,
            checkpoints: Checkpoints::default(),
        }
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn with_series(mut self, series: Option<String>) -> Self {
        self.series = series;
        self
    }

    pub fn with_staging_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_path = Some(path.into());
        self
    }

    pub fn with_torrent_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.torrent_path = Some(path.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == RecordStatus::Complete
    }
}

/// A failure, keyed by identity when known and by path otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub identity: Option<Identity>,
    pub title: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub error: String,
    pub failed_at: Timestamp,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Checkpoints::is_empty")]
    pub checkpoints: Checkpoints,
}

/// Map key for a failure record
pub fn failed_key(identity: Option<&Identity>, path: Option<&Path>) -> String {
    match (identity, path) {
        (Some(identity), _) => identity.to_string(),
        (None, Some(path)) => format!("path:{}", path.display()),
        (None, None) => "path:".to_string(),
    }
}

/// The whole state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub version: u32,
    pub processed: BTreeMap<Identity, ProcessedRecord>,
    pub failed: BTreeMap<String, FailedRecord>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            processed: BTreeMap::new(),
            failed: BTreeMap::new(),
        }
    }
}

impl StateDocument {
    /// Checks the raw JSON shape, then the typed schema
    ///
    /// Unknown keys are ignored. A document written by a newer version is
    /// accepted as long as the known fields still parse.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "top level is not a JSON object".to_string())?;

        match object.get("version") {
            Some(Value::Number(n)) if n.as_u64().is_some() => {}
            Some(_) => return Err("`version` is not a non-negative integer".to_string()),
            None => return Err("missing `version`".to_string()),
        }
        for key in ["processed", "failed"] {
            match object.get(key) {
                Some(Value::Object(_)) => {}
                Some(_) => return Err(format!("`{}` is not an object", key)),
                None => return Err(format!("missing `{}`", key)),
            }
        }

        let document: StateDocument =
            serde_json::from_value(value).map_err(|e| e.to_string())?;

        if document.version > STATE_VERSION {
            log::warn!(
                "State written by schema version {} (this build understands {}); unknown fields are ignored",
                document.version,
                STATE_VERSION
            );
        }

        if let Some(identity) = document
            .processed
            .keys()
            .find(|identity| document.failed.contains_key(identity.as_str()))
        {
            return Err(format!(
                "identity {} is in both `processed` and `failed`",
                identity
            ));
        }

        Ok(document)
    }

    pub fn is_processed(&self, identity: &Identity) -> bool {
        self.processed
            .get(identity)
            .is_some_and(ProcessedRecord::is_complete)
    }

    /// Checkpoint recorded for a stage, in whichever map holds the identity
    pub fn checkpoint(&self, identity: &Identity, stage: Stage) -> Option<Timestamp> {
        self.processed
            .get(identity)
            .and_then(|record| record.checkpoints.get(stage))
            .or_else(|| {
                self.failed
                    .get(identity.as_str())
                    .and_then(|record| record.checkpoints.get(stage))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> Identity {
        raw.parse().expect("valid identity")
    }

    #[test]
    fn test_default_document_shape() {
        let value = serde_json::to_value(StateDocument::default()).expect("serialize");
        assert_eq!(value, json!({ "version": 1, "processed": {}, "failed": {} }));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let value = json!({
            "version": 1,
            "processed": {
                "B000000001": {
                    "title": "Dune",
                    "processed_at": "2024-01-31T10:15:00.000Z",
                    "status": "complete",
                    "future_field": [1, 2, 3]
                }
            },
            "failed": {},
            "extra": true
        });
        let doc = StateDocument::from_value(value).expect("valid");
        assert!(doc.is_processed(&id("B000000001")));
    }

    #[test]
    fn test_structural_errors() {
        assert!(StateDocument::from_value(json!([])).is_err());
        assert!(StateDocument::from_value(json!({ "processed": {}, "failed": {} })).is_err());
        assert!(StateDocument::from_value(json!({ "version": 1, "processed": [], "failed": {} }))
            .is_err());
        assert!(StateDocument::from_value(json!({ "version": "1", "processed": {}, "failed": {} }))
            .is_err());
    }

    #[test]
    fn test_bad_identity_key_rejected() {
        let value = json!({
            "version": 1,
            "processed": {
                "short": {
                    "title": "x",
                    "processed_at": "2024-01-31T10:15:00.000Z",
                    "status": "complete"
                }
            },
            "failed": {}
        });
        assert!(StateDocument::from_value(value).is_err());
    }

    #[test]
    fn test_overlap_rejected() {
        let value = json!({
            "version": 1,
            "processed": {
                "B000000001": {
                    "title": "x",
                    "processed_at": "2024-01-31T10:15:00.000Z",
                    "status": "complete"
                }
            },
            "failed": {
                "B000000001": {
                    "identity": "B000000001",
                    "title": "x",
                    "error": "boom",
                    "failed_at": "2024-01-31T10:15:00.000Z"
                }
            }
        });
        let err = StateDocument::from_value(value).expect_err("overlap");
        assert!(err.contains("both"));
    }

    #[test]
    fn test_in_progress_is_not_processed() {
        let mut doc = StateDocument::default();
        let mut record = ProcessedRecord::new("Dune");
        record.status = RecordStatus::InProgress;
        doc.processed.insert(id("B000000001"), record);
        assert!(!doc.is_processed(&id("B000000001")));
    }

    #[test]
    fn test_checkpoint_merge_keeps_existing() {
        let early = Timestamp::parse("2024-01-01T00:00:00Z").expect("ts");
        let late = Timestamp::parse("2024-02-01T00:00:00Z").expect("ts");

        let mut mine = Checkpoints::default();
        mine.set(Stage::Staged, early);
        let mut theirs = Checkpoints::default();
        theirs.set(Stage::Staged, late);
        theirs.set(Stage::Uploaded, late);

        mine.merge(&theirs);
        assert_eq!(mine.get(Stage::Staged), Some(early));
        assert_eq!(mine.get(Stage::Uploaded), Some(late));
    }

    #[test]
    fn test_failed_key() {
        assert_eq!(failed_key(Some(&id("B000000001")), None), "B000000001");
        assert_eq!(
            failed_key(None, Some(Path::new("/incoming/Book"))),
            "path:/incoming/Book"
        );
    }
}
