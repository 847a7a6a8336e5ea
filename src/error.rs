use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal, run-level failures. Any of these stops ingestion before commit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed XML: {0}")]
    MalformedXml(String),

    #[error(
        "document directory '{}' does not exist or is not readable",
        .0.display()
    )]
    UnreadableInput(PathBuf),

    #[error("aborting run on {}", .0.path().display())]
    Aborted(#[from] FileFault),
}

/// Recoverable, per-file failures. Reported and skipped unless the run
/// is configured to abort on malformed input.
#[derive(Debug, thiserror::Error)]
pub enum FileFault {
    #[error("could not visit {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("could not read file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed corpus file {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: MalformedCorpusError,
    },
}

impl FileFault {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Walk { path, .. }
            | Self::Unreadable { path, .. }
            | Self::Malformed { path, .. } => path,
        }
    }
}

/// A corpus file whose wrapped bytes are not well-formed markup, or whose
/// `DOC` records lack a required child.
#[derive(Debug, thiserror::Error)]
pub enum MalformedCorpusError {
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    #[error("{0}")]
    Structure(&'static str),

    #[error("DOC #{record} has no {field} element")]
    MissingField { field: &'static str, record: usize },
}
