use crate::{
    document::{IndexedDocument, ReplaceKey},
    error::Result,
};

/// Destination for indexed documents.
///
/// Calls are made one at a time from a single writer. Nothing is visible to
/// readers until [`IndexSink::commit`] succeeds.
pub trait IndexSink {
    /// Add `doc` without looking for earlier versions.
    fn insert(&mut self, doc: &IndexedDocument) -> Result<()>;

    /// Remove every document whose `key` field equals `key.value(doc)`,
    /// then add `doc`.
    fn replace(&mut self, key: ReplaceKey, doc: &IndexedDocument)
    -> Result<()>;

    /// Publish all pending changes.
    fn commit(&mut self) -> Result<()>;
}
