//! The `pool` port defines [`SourcePool`], the read/limited-write view over the source document
//! pool (SP), and an in-memory fake adapter.
use crate::domain::SourceDocument;
use crate::error::{MatchError, MatchResult};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Access to the source-document pool. Source documents are read-only to the pipeline except
/// for L0, which may update `standardized_address`.
pub trait SourcePool: Send + Sync {
    /// All documents currently in the pool.
    fn all(&self) -> Vec<SourceDocument>;

    /// A single document by id.
    fn get(&self, id: Uuid) -> Option<SourceDocument>;

    /// L0's write: sets the standardized (cleansed) address text for a document.
    fn set_standardized_address(&self, id: Uuid, standardized: String) -> MatchResult<()>;

    /// Documents sharing the given planning-application base, for the L3a/L4 group layers.
    fn documents_in_group(&self, base: &str) -> Vec<SourceDocument>;

    /// The distinct planning-application bases present in the pool.
    fn planning_bases(&self) -> Vec<String>;
}

/// An in-memory [`SourcePool`] fake backed by a mutex-guarded map, used by tests and the CLI's
/// in-memory mode. Interior mutability lets concurrent `rayon` workers call
/// [`SourcePool::set_standardized_address`] without requiring `&mut self` on the trait, matching
/// the "fact rows are keyed by document_id; concurrent writes to the same row are impossible"
/// guarantee a real relational store provides natively.
#[derive(Debug, Default)]
pub struct InMemorySourcePool {
    documents: Mutex<HashMap<Uuid, SourceDocument>>,
}

impl InMemorySourcePool {
    /// Constructs a pool seeded with `documents`.
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        let map = documents.into_iter().map(|d| (d.id, d)).collect();
        Self {
            documents: Mutex::new(map),
        }
    }
}

impl SourcePool for InMemorySourcePool {
    fn all(&self) -> Vec<SourceDocument> {
        let guard = self.documents.lock().expect("source pool lock poisoned");
        let mut docs: Vec<SourceDocument> = guard.values().cloned().collect();
        docs.sort_by_key(|d| d.id);
        docs
    }

    fn get(&self, id: Uuid) -> Option<SourceDocument> {
        self.documents
            .lock()
            .expect("source pool lock poisoned")
            .get(&id)
            .cloned()
    }

    fn set_standardized_address(&self, id: Uuid, standardized: String) -> MatchResult<()> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|_| MatchError::SessionLost("source pool lock poisoned".to_string()))?;
        if let Some(doc) = guard.get_mut(&id) {
            doc.standardized_address = Some(standardized);
        }
        Ok(())
    }

    fn documents_in_group(&self, base: &str) -> Vec<SourceDocument> {
        self.all()
            .into_iter()
            .filter(|d| d.planning_app_base == base)
            .collect()
    }

    fn planning_bases(&self) -> Vec<String> {
        let mut bases: Vec<String> = self
            .all()
            .into_iter()
            .map(|d| d.planning_app_base)
            .collect();
        bases.sort();
        bases.dedup();
        bases
    }
}
