use std::path::Path;

use serde::Serialize;

/// One `DOC` block extracted from a corpus file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRecord {
    /// Contents of the `DOCNO` element, surrounding whitespace removed.
    pub id: String,
    /// Contents of the `TEXT` element, verbatim.
    pub text: String,
}

/// The complete field set written to the index for one record.
///
/// Built in full before any sink call, so a record is either indexed with
/// every field or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    pub id: String,
    pub path: String,
    pub modified: i64,
    pub contents: String,
}

impl IndexedDocument {
    pub fn from_record(
        record: CorpusRecord,
        source_path: &Path,
        modified: i64,
    ) -> Self {
        Self {
            id: record.id,
            path: source_path.to_string_lossy().into_owned(),
            modified,
            contents: record.text,
        }
    }
}

/// How the target index is opened for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Start from an empty index; every record is inserted.
    FreshBuild,
    /// Keep existing documents; every record replaces by key.
    IncrementalUpdate,
}

/// Which stored field identifies the previous version of a document
/// during an incremental update.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceKey {
    /// The source file path. Every `DOC` in a file shares this key, so on
    /// update only the file's last record survives.
    #[default]
    Path,
    /// The `DOCNO` of the record.
    Id,
}

impl ReplaceKey {
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Path => crate::tantivy_index::fields::PATH,
            Self::Id => crate::tantivy_index::fields::ID,
        }
    }

    pub fn value(self, doc: &IndexedDocument) -> &str {
        match self {
            Self::Path => &doc.path,
            Self::Id => &doc.id,
        }
    }
}

/// What to do with a corpus file that fails to parse.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Log the file and continue with the next one.
    #[default]
    Skip,
    /// Stop the run without committing.
    Abort,
}
