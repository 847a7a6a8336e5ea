//! clefindex - a full-text indexer for CLEF-style question/answer corpora.
//!
//! Corpus files are bare runs of `<DOC>` blocks, each carrying a `DOCNO`
//! and a `TEXT`. clefindex walks a corpus tree, extracts every record, and
//! writes it into a [Tantivy](https://github.com/quickwit-oss/tantivy) index
//! analyzed for Portuguese, either rebuilding the index or updating it in
//! place.
//!
//! # Quick start
//!
//! ```no_run
//! use clefindex::{IngestOptions, Indexer, OpenMode, SearchIndex};
//!
//! let index = SearchIndex::open(std::path::Path::new("index")).unwrap();
//! let session = index.session(OpenMode::FreshBuild, 64_000_000).unwrap();
//!
//! let mut indexer =
//!     Indexer::new(session, IngestOptions::new(OpenMode::FreshBuild));
//! indexer.index_tree(std::path::Path::new("corpus")).unwrap();
//! let report = indexer.finish().unwrap();
//! println!("{} records", report.records_indexed());
//! ```

pub mod cli;
pub mod corpus;
pub mod document;
pub mod error;
pub mod ingestion;
pub mod qa;
pub mod sink;
pub mod tantivy_index;
pub mod walker;

pub use document::{
    CorpusRecord,
    IndexedDocument,
    MalformedPolicy,
    OpenMode,
    ReplaceKey,
};
pub use error::{Error, FileFault, MalformedCorpusError, Result};
pub use ingestion::{IngestOptions, IngestReport, Indexer};
pub use sink::IndexSink;
pub use tantivy_index::SearchIndex;
pub use walker::SourceFile;
