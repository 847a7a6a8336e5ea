use std::path::Path;

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    collector::DocSetCollector,
    doc,
    query::TermQuery,
    schema::*,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::{
    document::{IndexedDocument, OpenMode, ReplaceKey},
    error::Result,
    sink::IndexSink,
};

/// Field names used in the schema.
pub mod fields {
    pub const ID: &str = "id";
    pub const PATH: &str = "path";
    pub const MODIFIED: &str = "modified";
    pub const CONTENTS: &str = "contents";
}

/// Name under which the Portuguese analyzer is registered.
pub const PT_STEM: &str = "pt_stem";

/// Smallest writer budget tantivy accepts for a single indexing thread.
pub const MIN_MEMORY_BUDGET: usize = 15_000_000;

/// A Tantivy full-text index over corpus records.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub id: Field,
    pub path: Field,
    pub modified: Field,
    pub contents: Field,
}

impl SchemaFields {
    fn resolve(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: schema.get_field(fields::ID)?,
            path: schema.get_field(fields::PATH)?,
            modified: schema.get_field(fields::MODIFIED)?,
            contents: schema.get_field(fields::CONTENTS)?,
        })
    }

    fn key(&self, key: ReplaceKey) -> Field {
        match key {
            ReplaceKey::Path => self.path,
            ReplaceKey::Id => self.id,
        }
    }
}

/// A document as read back from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
    pub path: String,
    pub modified: i64,
    pub contents: String,
}

impl From<StoredDocument> for IndexedDocument {
    fn from(doc: StoredDocument) -> Self {
        Self {
            id: doc.id,
            path: doc.path,
            modified: doc.modified,
            contents: doc.contents,
        }
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::ID, STRING | STORED);
    builder.add_text_field(fields::PATH, STRING | STORED);
    builder.add_i64_field(fields::MODIFIED, INDEXED | STORED | FAST);

    let contents_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(PT_STEM)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    builder.add_text_field(fields::CONTENTS, contents_opts);

    builder.build()
}

fn register_tokenizers(index: &Index) {
    let pt_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::Portuguese))
        .build();
    index.tokenizers().register(PT_STEM, pt_stem);
}

impl SearchIndex {
    /// Open or create an index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )?
        };

        Self::from_index(index)
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        let fields = SchemaFields::resolve(&index.schema())?;
        register_tokenizers(&index);
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Start the single writing session of a run.
    ///
    /// A fresh build schedules the deletion of every existing document, so
    /// the old contents disappear in the same commit that publishes the new
    /// ones.
    pub fn session(
        &self,
        mode: OpenMode,
        memory_budget: usize,
    ) -> Result<IndexSession<'_>> {
        let writer = self
            .index
            .writer_with_num_threads(1, memory_budget.max(MIN_MEMORY_BUDGET))?;
        if mode == OpenMode::FreshBuild {
            writer.delete_all_documents()?;
        }
        tracing::debug!(?mode, memory_budget, "opened index writer");
        Ok(IndexSession {
            index: self,
            writer,
        })
    }

    /// Number of live documents as of the last commit.
    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// All documents whose `path` field equals `path` exactly.
    pub fn find_by_path(&self, path: &str) -> Result<Vec<StoredDocument>> {
        self.find_exact(self.fields.path, path)
    }

    /// All documents whose `id` field equals `id` exactly.
    pub fn find_by_id(&self, id: &str) -> Result<Vec<StoredDocument>> {
        self.find_exact(self.fields.id, id)
    }

    fn find_exact(
        &self,
        field: Field,
        value: &str,
    ) -> Result<Vec<StoredDocument>> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let query = TermQuery::new(
            Term::from_field_text(field, value),
            IndexRecordOption::Basic,
        );
        let mut addresses: Vec<_> =
            searcher.search(&query, &DocSetCollector)?.into_iter().collect();
        addresses.sort();

        let f = self.fields;
        let mut results = Vec::with_capacity(addresses.len());
        for doc_address in addresses {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            results.push(StoredDocument {
                id: extract_text(&doc, f.id),
                path: extract_text(&doc, f.path),
                modified: extract_i64(&doc, f.modified),
                contents: extract_text(&doc, f.contents),
            });
        }
        Ok(results)
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

/// The writer held open for one ingestion run.
///
/// Dropping a session without calling [`IndexSink::commit`] discards every
/// pending change.
pub struct IndexSession<'a> {
    index: &'a SearchIndex,
    writer: IndexWriter,
}

impl IndexSession<'_> {
    fn to_tantivy(&self, doc: &IndexedDocument) -> TantivyDocument {
        let f = self.index.fields;
        doc!(
            f.id => doc.id.as_str(),
            f.path => doc.path.as_str(),
            f.modified => doc.modified,
            f.contents => doc.contents.as_str(),
        )
    }
}

impl IndexSink for IndexSession<'_> {
    fn insert(&mut self, doc: &IndexedDocument) -> Result<()> {
        self.writer.add_document(self.to_tantivy(doc))?;
        Ok(())
    }

    fn replace(
        &mut self,
        key: ReplaceKey,
        doc: &IndexedDocument,
    ) -> Result<()> {
        let field = self.index.fields.key(key);
        let term = Term::from_field_text(field, key.value(doc));
        self.writer.delete_term(term);
        self.writer.add_document(self.to_tantivy(doc))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let opstamp = self.writer.commit()?;
        tracing::debug!(opstamp, "committed index");
        Ok(())
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_i64(doc: &TantivyDocument, field: Field) -> i64 {
    doc.get_first(field).and_then(|v| v.as_i64()).unwrap_or(0)
}
