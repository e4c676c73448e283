//! Quad store contract
//!
//! [`QuadStore`] is the surface shared by the wrapped store and the enforcing
//! decorator, so a secured store can be handed to any caller of a plain one.
//! Implementations are expected to be transactional: readers see a consistent
//! snapshot and at most one write transaction is active at a time.

mod memory;

pub use memory::MemoryStore;

use crate::core::error::Result;
use crate::core::model::{Graph, GraphName, Quad, QuadPattern, Term};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Single-pass cursor over quads; dropping it releases the underlying cursor
pub type QuadIter<'a> = Box<dyn Iterator<Item = Result<Quad>> + Send + 'a>;

/// Single-pass cursor over graph names
pub type GraphNameIter<'a> = Box<dyn Iterator<Item = Result<GraphName>> + Send + 'a>;

/// Multiple-reader/single-writer critical section lock exposed by a store
pub type StoreLock = RwLock<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    Read,
    Write,
}

/// How a read transaction is promoted to a write transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promote {
    /// Fails if another writer committed since the transaction began
    Isolated,
    /// Always succeeds and picks up the latest committed state
    ReadCommitted,
}

/// Free-form store settings shared between a store and its wrappers
#[derive(Debug, Default)]
pub struct Context {
    symbols: RwLock<HashMap<String, String>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.symbols.write().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.symbols.read().get(key).cloned()
    }

    pub fn is_true(&self, key: &str) -> bool {
        self.symbols
            .read()
            .get(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

pub trait QuadStore: Send + Sync {
    fn default_graph(&self) -> Result<Graph>;

    fn graph(&self, name: &GraphName) -> Result<Graph>;

    /// Every named graph merged into one view
    fn union_graph(&self) -> Result<Graph>;

    fn contains_graph(&self, name: &GraphName) -> Result<bool>;

    /// Replace the contents of `name` with `data`
    fn add_graph(&self, name: &GraphName, data: &Graph) -> Result<()>;

    fn remove_graph(&self, name: &GraphName) -> Result<()>;

    /// Names of the named graphs currently holding data
    fn graph_names(&self) -> Result<GraphNameIter<'_>>;

    fn add(&self, quad: &Quad) -> Result<()>;

    fn delete(&self, quad: &Quad) -> Result<()>;

    fn add_terms(&self, graph: GraphName, subject: Term, predicate: Term, object: Term) -> Result<()> {
        self.add(&Quad::new(graph, subject, predicate, object))
    }

    fn delete_terms(
        &self,
        graph: GraphName,
        subject: Term,
        predicate: Term,
        object: Term,
    ) -> Result<()> {
        self.delete(&Quad::new(graph, subject, predicate, object))
    }

    /// Delete every quad matching `pattern`
    fn delete_any(&self, pattern: &QuadPattern) -> Result<()>;

    fn find(&self, pattern: &QuadPattern) -> Result<QuadIter<'_>>;

    /// Like [`QuadStore::find`] but never yields quads from the default graph
    fn find_named(&self, pattern: &QuadPattern) -> Result<QuadIter<'_>>;

    fn contains(&self, pattern: &QuadPattern) -> Result<bool> {
        let mut quads = self.find(pattern)?;
        Ok(quads.next().transpose()?.is_some())
    }

    fn contains_quad(&self, quad: &Quad) -> Result<bool> {
        self.contains(&QuadPattern::from(quad))
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(!self.contains(&QuadPattern::any())?)
    }

    /// Number of named graphs, `None` when the store cannot say
    fn size(&self) -> Result<Option<usize>>;

    fn clear(&self) -> Result<()>;

    fn begin(&self, mode: TxnMode) -> Result<()>;

    fn promote(&self, mode: Promote) -> Result<bool>;

    fn commit(&self) -> Result<()>;

    fn abort(&self) -> Result<()>;

    /// Finish the calling thread's transaction; an uncommitted write is aborted
    fn end(&self);

    fn transaction_mode(&self) -> Option<TxnMode>;

    fn is_in_transaction(&self) -> bool {
        self.transaction_mode().is_some()
    }

    fn supports_transactions(&self) -> bool;

    fn lock(&self) -> &StoreLock;

    fn context(&self) -> &Context;

    fn close(&self) -> Result<()>;
}
