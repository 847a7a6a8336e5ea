use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    corpus,
    document::{
        CorpusRecord,
        IndexedDocument,
        MalformedPolicy,
        OpenMode,
        ReplaceKey,
    },
    error::{Error, FileFault, Result},
    sink::IndexSink,
    walker::{self, SourceFile},
};

/// Run-wide ingestion settings, fixed before the first file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestOptions {
    pub mode: OpenMode,
    pub replace_key: ReplaceKey,
    pub on_malformed: MalformedPolicy,
}

impl IngestOptions {
    pub fn new(mode: OpenMode) -> Self {
        Self {
            mode,
            replace_key: ReplaceKey::default(),
            on_malformed: MalformedPolicy::default(),
        }
    }
}

/// A file left out of the index, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub records_inserted: usize,
    pub records_replaced: usize,
    pub skipped: Vec<SkippedFile>,
}

impl IngestReport {
    pub fn files_skipped(&self) -> usize {
        self.skipped.len()
    }

    pub fn records_indexed(&self) -> usize {
        self.records_inserted + self.records_replaced
    }
}

/// Feeds corpus records into an [`IndexSink`], deciding per record whether
/// to insert or replace.
pub struct Indexer<S> {
    sink: S,
    options: IngestOptions,
    report: IngestReport,
}

impl<S: IndexSink> Indexer<S> {
    pub fn new(sink: S, options: IngestOptions) -> Self {
        Self {
            sink,
            options,
            report: IngestReport::default(),
        }
    }

    pub fn options(&self) -> IngestOptions {
        self.options
    }

    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Write one record to the sink.
    pub fn ingest(
        &mut self,
        record: CorpusRecord,
        source_path: &Path,
        modified_at: i64,
    ) -> Result<()> {
        let doc =
            IndexedDocument::from_record(record, source_path, modified_at);

        match self.options.mode {
            OpenMode::FreshBuild => {
                tracing::trace!(id = %doc.id, "adding");
                self.sink.insert(&doc)?;
                self.report.records_inserted += 1;
            }
            OpenMode::IncrementalUpdate => {
                let key = self.options.replace_key;
                tracing::trace!(
                    id = %doc.id,
                    key = key.value(&doc),
                    "updating"
                );
                self.sink.replace(key, &doc)?;
                self.report.records_replaced += 1;
            }
        }
        Ok(())
    }

    /// Index every record of one file.
    ///
    /// Unreadable and malformed files are handled according to
    /// [`IngestOptions::on_malformed`]; only sink failures and an `Abort`
    /// policy end the run.
    pub fn index_file(&mut self, file: &SourceFile) -> Result<()> {
        self.report.files_seen += 1;
        tracing::info!("Indexing {}", file.path.display());

        let records = match read_records(&file.path) {
            Ok(records) => records,
            Err(fault) => return self.handle_fault(fault),
        };

        if self.options.mode == OpenMode::IncrementalUpdate
            && self.options.replace_key == ReplaceKey::Path
            && records.len() > 1
        {
            tracing::debug!(
                file = %file.path.display(),
                records = records.len(),
                "records share one path key; only the last is kept"
            );
        }

        for record in records {
            self.ingest(record, &file.path, file.modified_at)?;
        }
        self.report.files_indexed += 1;
        Ok(())
    }

    /// Walk `root` and index every file found.
    pub fn index_tree(&mut self, root: &Path) -> Result<()> {
        for item in walker::walk(root) {
            match item {
                Ok(file) => self.index_file(&file)?,
                Err(fault) => self.skip(fault),
            }
        }
        Ok(())
    }

    /// Commit everything written so far and return the run summary.
    pub fn finish(mut self) -> Result<IngestReport> {
        self.sink.commit()?;
        Ok(self.report)
    }

    fn handle_fault(&mut self, fault: FileFault) -> Result<()> {
        if matches!(fault, FileFault::Malformed { .. })
            && self.options.on_malformed == MalformedPolicy::Abort
        {
            return Err(Error::Aborted(fault));
        }
        self.skip(fault);
        Ok(())
    }

    fn skip(&mut self, fault: FileFault) {
        tracing::warn!("{fault}");
        self.report.skipped.push(SkippedFile {
            path: fault.path().to_path_buf(),
            reason: fault.to_string(),
        });
    }
}

/// Read and parse one corpus file. The bytes are released before the
/// records are returned.
fn read_records(
    path: &Path,
) -> std::result::Result<Vec<CorpusRecord>, FileFault> {
    let bytes = std::fs::read(path).map_err(|source| FileFault::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    corpus::parse_bytes(&bytes).map_err(|source| FileFault::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tantivy_index::SearchIndex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Insert(IndexedDocument),
        Replace(ReplaceKey, IndexedDocument),
        Commit,
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        calls: Vec<Call>,
        fail_after: Option<usize>,
    }

    impl RecordingSink {
        fn check(&self) -> Result<()> {
            match self.fail_after {
                Some(n) if self.calls.len() >= n => Err(Error::Io(
                    std::io::Error::other("disk full"),
                )),
                _ => Ok(()),
            }
        }
    }

    impl IndexSink for RecordingSink {
        fn insert(&mut self, doc: &IndexedDocument) -> Result<()> {
            self.check()?;
            self.calls.push(Call::Insert(doc.clone()));
            Ok(())
        }

        fn replace(
            &mut self,
            key: ReplaceKey,
            doc: &IndexedDocument,
        ) -> Result<()> {
            self.check()?;
            self.calls.push(Call::Replace(key, doc.clone()));
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            self.calls.push(Call::Commit);
            Ok(())
        }
    }

    const TWO_DOCS: &str = "\
        <DOC><DOCNO>Q1</DOCNO><TEXT>hello world</TEXT></DOC>\n\
        <DOC><DOCNO>Q2</DOCNO><TEXT>bye</TEXT></DOC>\n";

    fn doc_file(id: &str, text: &str) -> String {
        format!("<DOC>\n<DOCNO>{id}</DOCNO>\n<TEXT>{text}</TEXT>\n</DOC>\n")
    }

    fn record(id: &str) -> CorpusRecord {
        CorpusRecord {
            id: id.to_string(),
            text: "texto".to_string(),
        }
    }

    #[test]
    fn fresh_build_inserts() {
        let mut indexer = Indexer::new(
            RecordingSink::default(),
            IngestOptions::new(OpenMode::FreshBuild),
        );
        indexer.ingest(record("Q1"), Path::new("/c/a"), 7).unwrap();

        assert_eq!(
            indexer.sink().calls,
            vec![Call::Insert(IndexedDocument {
                id: "Q1".to_string(),
                path: "/c/a".to_string(),
                modified: 7,
                contents: "texto".to_string(),
            })]
        );
    }

    #[test]
    fn update_replaces_with_configured_key() {
        let options = IngestOptions {
            replace_key: ReplaceKey::Id,
            ..IngestOptions::new(OpenMode::IncrementalUpdate)
        };
        let mut indexer = Indexer::new(RecordingSink::default(), options);
        indexer.ingest(record("Q1"), Path::new("/c/a"), 7).unwrap();

        assert!(matches!(
            indexer.sink().calls.as_slice(),
            [Call::Replace(ReplaceKey::Id, doc)] if doc.id == "Q1"
        ));
        assert_eq!(indexer.report().records_replaced, 1);
    }

    #[test]
    fn finish_commits_once() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.sgml"), TWO_DOCS).unwrap();
        std::fs::write(tmp.path().join("b.sgml"), doc_file("Q3", "x")).unwrap();

        let mut indexer = Indexer::new(
            RecordingSink::default(),
            IngestOptions::new(OpenMode::FreshBuild),
        );
        indexer.index_tree(tmp.path()).unwrap();
        let calls = indexer.sink().calls.clone();
        let report = indexer.finish().unwrap();

        assert_eq!(calls.len(), 3);
        assert!(!calls.contains(&Call::Commit));
        assert_eq!(report.files_seen, 2);
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.records_inserted, 3);
        assert_eq!(report.files_skipped(), 0);
    }

    #[test]
    fn malformed_file_is_skipped_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.sgml"), doc_file("Q1", "x")).unwrap();
        std::fs::write(tmp.path().join("b.sgml"), "<DOC><DOCNO>Q2</DOCNO>")
            .unwrap();
        std::fs::write(tmp.path().join("c.sgml"), doc_file("Q3", "y")).unwrap();

        let mut indexer = Indexer::new(
            RecordingSink::default(),
            IngestOptions::new(OpenMode::FreshBuild),
        );
        indexer.index_tree(tmp.path()).unwrap();

        let report = indexer.report();
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.records_inserted, 2);
        assert_eq!(report.files_skipped(), 1);
        assert!(report.skipped[0].path.ends_with("b.sgml"));
    }

    #[test]
    fn missing_field_skips_whole_file() {
        let tmp = tempfile::tempdir().unwrap();
        let body =
            format!("{}<DOC><DOCNO>Q2</DOCNO></DOC>", doc_file("Q1", "x"));
        std::fs::write(tmp.path().join("a.sgml"), body).unwrap();

        let mut indexer = Indexer::new(
            RecordingSink::default(),
            IngestOptions::new(OpenMode::FreshBuild),
        );
        indexer.index_tree(tmp.path()).unwrap();

        assert!(indexer.sink().calls.is_empty());
        assert!(indexer.report().skipped[0].reason.contains("TEXT"));
    }

    #[test]
    fn abort_policy_stops_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.sgml"), "<DOC>").unwrap();
        std::fs::write(tmp.path().join("b.sgml"), doc_file("Q1", "x")).unwrap();

        let options = IngestOptions {
            on_malformed: MalformedPolicy::Abort,
            ..IngestOptions::new(OpenMode::FreshBuild)
        };
        let mut indexer = Indexer::new(RecordingSink::default(), options);
        let err = indexer.index_tree(tmp.path()).unwrap_err();

        assert!(matches!(err, Error::Aborted(FileFault::Malformed { .. })));
        assert!(indexer.sink().calls.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn walk_faults_never_abort() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.sgml"), doc_file("Q1", "x")).unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("gone"),
            tmp.path().join("b.sgml"),
        )
        .unwrap();

        let options = IngestOptions {
            on_malformed: MalformedPolicy::Abort,
            ..IngestOptions::new(OpenMode::FreshBuild)
        };
        let mut indexer = Indexer::new(RecordingSink::default(), options);
        indexer.index_tree(tmp.path()).unwrap();

        assert_eq!(indexer.report().files_indexed, 1);
        assert_eq!(indexer.report().files_skipped(), 1);
    }

    #[test]
    fn unreadable_file_is_skipped_even_under_abort() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = SourceFile {
            path: tmp.path().join("gone.sgml"),
            modified_at: 0,
        };

        let options = IngestOptions {
            on_malformed: MalformedPolicy::Abort,
            ..IngestOptions::new(OpenMode::FreshBuild)
        };
        let mut indexer = Indexer::new(RecordingSink::default(), options);
        indexer.index_file(&gone).unwrap();

        let report = indexer.report();
        assert_eq!(report.files_seen, 1);
        assert_eq!(report.files_indexed, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, gone.path);
        assert!(report.skipped[0].reason.starts_with("could not read file"));
        assert!(indexer.sink().calls.is_empty());
    }

    #[test]
    fn sink_error_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.sgml"), TWO_DOCS).unwrap();

        let sink = RecordingSink {
            fail_after: Some(1),
            ..RecordingSink::default()
        };
        let mut indexer =
            Indexer::new(sink, IngestOptions::new(OpenMode::FreshBuild));

        assert!(matches!(indexer.index_tree(tmp.path()), Err(Error::Io(_))));
        assert_eq!(indexer.sink().calls.len(), 1);
        assert_eq!(indexer.report().files_indexed, 0);
    }

    #[test]
    fn roundtrip_through_index() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.sgml");
        std::fs::write(&file, doc_file("Q1", "Onde fica Lisboa?")).unwrap();

        let index = SearchIndex::open_in_ram().unwrap();
        let session = index.session(OpenMode::FreshBuild, 15_000_000).unwrap();
        let mut indexer =
            Indexer::new(session, IngestOptions::new(OpenMode::FreshBuild));
        let source = walker::walk(&file).next().unwrap().unwrap();
        indexer.index_file(&source).unwrap();
        indexer.finish().unwrap();

        let stored =
            index.find_by_path(&source.path.to_string_lossy()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            IndexedDocument::from(stored[0].clone()),
            IndexedDocument {
                id: "Q1".to_string(),
                path: source.path.to_string_lossy().into_owned(),
                modified: source.modified_at,
                contents: "Onde fica Lisboa?".to_string(),
            }
        );
    }

    #[test]
    fn update_twice_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.sgml");
        std::fs::write(&file, doc_file("Q1", "primeira")).unwrap();
        let index = SearchIndex::open_in_ram().unwrap();

        for _ in 0..2 {
            let session =
                index.session(OpenMode::IncrementalUpdate, 15_000_000).unwrap();
            let mut indexer = Indexer::new(
                session,
                IngestOptions::new(OpenMode::IncrementalUpdate),
            );
            indexer.index_tree(tmp.path()).unwrap();
            indexer.finish().unwrap();
        }

        let key = file.to_string_lossy();
        let stored = index.find_by_path(&key).unwrap();
        assert_eq!(index.num_docs().unwrap(), 1);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].contents, "primeira");
    }

    #[test]
    fn duplicate_docno_across_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.sgml"), doc_file("SAME", "um"))
            .unwrap();
        std::fs::write(tmp.path().join("b.sgml"), doc_file("SAME", "dois"))
            .unwrap();
        let index = SearchIndex::open_in_ram().unwrap();

        let run = |mode: OpenMode, replace_key: ReplaceKey| {
            let session = index.session(mode, 15_000_000).unwrap();
            let options = IngestOptions {
                replace_key,
                ..IngestOptions::new(mode)
            };
            let mut indexer = Indexer::new(session, options);
            indexer.index_tree(tmp.path()).unwrap();
            indexer.finish().unwrap();
        };

        run(OpenMode::FreshBuild, ReplaceKey::Path);
        assert_eq!(index.find_by_id("SAME").unwrap().len(), 2);

        // Keyed on path, each file keeps its own copy.
        run(OpenMode::IncrementalUpdate, ReplaceKey::Path);
        assert_eq!(index.find_by_id("SAME").unwrap().len(), 2);

        // Keyed on id, the later file wins.
        run(OpenMode::IncrementalUpdate, ReplaceKey::Id);
        let same = index.find_by_id("SAME").unwrap();
        assert_eq!(same.len(), 1);
        assert_eq!(same[0].contents, "dois");
    }

    #[test]
    fn path_key_collapses_records_of_one_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.sgml"), TWO_DOCS).unwrap();
        let index = SearchIndex::open_in_ram().unwrap();

        let session =
            index.session(OpenMode::IncrementalUpdate, 15_000_000).unwrap();
        let mut indexer = Indexer::new(
            session,
            IngestOptions::new(OpenMode::IncrementalUpdate),
        );
        indexer.index_tree(tmp.path()).unwrap();
        let report = indexer.finish().unwrap();

        assert_eq!(report.records_replaced, 2);
        assert_eq!(index.num_docs().unwrap(), 1);
        assert!(index.find_by_id("Q1").unwrap().is_empty());
        assert_eq!(index.find_by_id("Q2").unwrap().len(), 1);
    }
}
