//! In-memory transactional quad store
//!
//! Transactions are bound to the thread that begins them:
//! - A read transaction pins the committed snapshot current at `begin`
//! - A write transaction works on a private copy that is published on commit
//! - Only one write transaction exists at a time; other writers wait
//!
//! Calls made outside a transaction read the latest committed snapshot and
//! apply writes as their own single-operation transaction.

use super::{Context, GraphNameIter, Promote, QuadIter, QuadStore, StoreLock, TxnMode};
use crate::core::error::{GuardError, Result};
use crate::core::model::{Graph, GraphName, GraphSelector, Quad, QuadPattern, Triple};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// Committed (or working) state of the dataset
#[derive(Debug, Clone, Default)]
struct Snapshot {
    version: u64,
    graphs: BTreeMap<GraphName, BTreeSet<Triple>>,
}

impl Snapshot {
    fn matching<'a>(
        &'a self,
        pattern: &'a QuadPattern,
        named_only: bool,
    ) -> impl Iterator<Item = Quad> + 'a {
        self.graphs
            .iter()
            .filter(move |(name, _)| !(named_only && name.is_default()))
            .filter(move |(name, _)| pattern.graph.matches(name))
            .flat_map(move |(name, triples)| {
                triples
                    .iter()
                    .filter(move |t| pattern.matches_triple(t))
                    .map(move |t| Quad::from_triple(name.clone(), t.clone()))
            })
    }

    fn insert(&mut self, quad: &Quad) {
        self.graphs
            .entry(quad.graph.clone())
            .or_default()
            .insert(quad.triple());
    }

    fn remove(&mut self, quad: &Quad) {
        if let Some(triples) = self.graphs.get_mut(&quad.graph) {
            triples.remove(&quad.triple());
            if triples.is_empty() {
                self.graphs.remove(&quad.graph);
            }
        }
    }

    fn remove_matching(&mut self, pattern: &QuadPattern) {
        let doomed: Vec<Quad> = self.matching(pattern, false).collect();
        for quad in &doomed {
            self.remove(quad);
        }
    }
}

enum Txn {
    Read(Arc<Snapshot>),
    Write { working: Snapshot },
}

impl Txn {
    fn mode(&self) -> TxnMode {
        match self {
            Txn::Read(_) => TxnMode::Read,
            Txn::Write { .. } => TxnMode::Write,
        }
    }
}

/// In-memory quad store with per-thread transactions
pub struct MemoryStore {
    committed: RwLock<Arc<Snapshot>>,
    txns: Mutex<HashMap<ThreadId, Txn>>,
    writer: Mutex<Option<ThreadId>>,
    writer_released: Condvar,
    lock: StoreLock,
    context: Context,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            committed: RwLock::new(Arc::new(Snapshot::default())),
            txns: Mutex::new(HashMap::new()),
            writer: Mutex::new(None),
            writer_released: Condvar::new(),
            lock: StoreLock::new(()),
            context: Context::new(),
        }
    }

    /// Create a store already holding `quads`
    pub fn with_quads(quads: impl IntoIterator<Item = Quad>) -> Self {
        let mut snapshot = Snapshot::default();
        for quad in quads {
            snapshot.insert(&quad);
        }
        let store = Self::new();
        *store.committed.write() = Arc::new(snapshot);
        store
    }

    /// Version of the committed state; bumped by every commit
    pub fn version(&self) -> u64 {
        self.committed.read().version
    }

    fn acquire_writer(&self) {
        let me = thread::current().id();
        let mut writer = self.writer.lock();
        while writer.is_some_and(|owner| owner != me) {
            self.writer_released.wait(&mut writer);
        }
        *writer = Some(me);
    }

    fn release_writer(&self) {
        *self.writer.lock() = None;
        self.writer_released.notify_one();
    }

    fn publish(&self, mut snapshot: Snapshot) {
        let mut committed = self.committed.write();
        snapshot.version = committed.version + 1;
        *committed = Arc::new(snapshot);
    }

    /// Run `f` against the calling thread's view of the dataset
    fn with_view<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        let txns = self.txns.lock();
        if let Some(txn) = txns.get(&thread::current().id()) {
            return match txn {
                Txn::Read(snapshot) => f(snapshot),
                Txn::Write { working } => f(working),
            };
        }
        drop(txns);

        let snapshot = self.committed.read().clone();
        f(&snapshot)
    }

    /// Apply `f` inside the calling thread's write transaction, or as a
    /// single-operation transaction when none is open
    fn with_write<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> Result<R> {
        {
            let mut txns = self.txns.lock();
            match txns.get_mut(&thread::current().id()) {
                Some(Txn::Write { working }) => return Ok(f(working)),
                Some(Txn::Read(_)) => {
                    return Err(GuardError::Transaction(
                        "write attempted inside a read transaction".to_string(),
                    ))
                }
                None => {}
            }
        }

        self.acquire_writer();
        let mut working = Snapshot::clone(&self.committed.read());
        let result = f(&mut working);
        self.publish(working);
        self.release_writer();
        Ok(result)
    }

    fn collect(&self, pattern: &QuadPattern, named_only: bool) -> Vec<Quad> {
        self.with_view(|snapshot| snapshot.matching(pattern, named_only).collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadStore for MemoryStore {
    fn default_graph(&self) -> Result<Graph> {
        self.graph(&GraphName::Default)
    }

    fn graph(&self, name: &GraphName) -> Result<Graph> {
        Ok(self.with_view(|snapshot| {
            snapshot
                .graphs
                .get(name)
                .map(|triples| triples.iter().cloned().collect())
                .unwrap_or_default()
        }))
    }

    fn union_graph(&self) -> Result<Graph> {
        Ok(self.with_view(|snapshot| {
            snapshot
                .graphs
                .iter()
                .filter(|(name, _)| !name.is_default())
                .flat_map(|(_, triples)| triples.iter().cloned())
                .collect()
        }))
    }

    fn contains_graph(&self, name: &GraphName) -> Result<bool> {
        if name.is_default() {
            return Ok(true);
        }
        Ok(self.with_view(|snapshot| snapshot.graphs.contains_key(name)))
    }

    fn add_graph(&self, name: &GraphName, data: &Graph) -> Result<()> {
        self.with_write(|snapshot| {
            snapshot.graphs.remove(name);
            if !data.is_empty() {
                snapshot
                    .graphs
                    .insert(name.clone(), data.iter().cloned().collect());
            }
        })
    }

    fn remove_graph(&self, name: &GraphName) -> Result<()> {
        self.with_write(|snapshot| {
            snapshot.graphs.remove(name);
        })
    }

    fn graph_names(&self) -> Result<GraphNameIter<'_>> {
        let names: Vec<GraphName> = self.with_view(|snapshot| {
            snapshot
                .graphs
                .keys()
                .filter(|name| !name.is_default())
                .cloned()
                .collect()
        });
        Ok(Box::new(names.into_iter().map(Ok)))
    }

    fn add(&self, quad: &Quad) -> Result<()> {
        self.with_write(|snapshot| snapshot.insert(quad))
    }

    fn delete(&self, quad: &Quad) -> Result<()> {
        self.with_write(|snapshot| snapshot.remove(quad))
    }

    fn delete_any(&self, pattern: &QuadPattern) -> Result<()> {
        self.with_write(|snapshot| snapshot.remove_matching(pattern))
    }

    fn find(&self, pattern: &QuadPattern) -> Result<QuadIter<'_>> {
        Ok(Box::new(self.collect(pattern, false).into_iter().map(Ok)))
    }

    fn find_named(&self, pattern: &QuadPattern) -> Result<QuadIter<'_>> {
        if pattern.graph == GraphSelector::Default {
            return Ok(Box::new(std::iter::empty()));
        }
        Ok(Box::new(self.collect(pattern, true).into_iter().map(Ok)))
    }

    fn size(&self) -> Result<Option<usize>> {
        Ok(Some(self.with_view(|snapshot| {
            snapshot.graphs.keys().filter(|n| !n.is_default()).count()
        })))
    }

    fn clear(&self) -> Result<()> {
        self.with_write(|snapshot| snapshot.graphs.clear())
    }

    fn begin(&self, mode: TxnMode) -> Result<()> {
        let me = thread::current().id();
        if self.txns.lock().contains_key(&me) {
            return Err(GuardError::Transaction(
                "transaction already active on this thread".to_string(),
            ));
        }

        let txn = match mode {
            TxnMode::Read => Txn::Read(self.committed.read().clone()),
            TxnMode::Write => {
                self.acquire_writer();
                Txn::Write {
                    working: Snapshot::clone(&self.committed.read()),
                }
            }
        };
        debug!("Begin {:?} transaction on {:?}", mode, me);
        self.txns.lock().insert(me, txn);
        Ok(())
    }

    fn promote(&self, mode: Promote) -> Result<bool> {
        let me = thread::current().id();
        let pinned = match self.txns.lock().get(&me) {
            Some(Txn::Write { .. }) => return Ok(true),
            Some(Txn::Read(snapshot)) => snapshot.version,
            None => {
                return Err(GuardError::Transaction(
                    "no transaction to promote".to_string(),
                ))
            }
        };

        self.acquire_writer();
        let latest = self.committed.read().clone();
        if mode == Promote::Isolated && latest.version != pinned {
            self.release_writer();
            return Ok(false);
        }

        self.txns.lock().insert(
            me,
            Txn::Write {
                working: Snapshot::clone(&latest),
            },
        );
        Ok(true)
    }

    fn commit(&self) -> Result<()> {
        let me = thread::current().id();
        let txn = self.txns.lock().remove(&me);
        match txn {
            Some(Txn::Write { working }) => {
                self.publish(working);
                self.release_writer();
                debug!("Committed write transaction on {:?}", me);
                Ok(())
            }
            Some(Txn::Read(_)) => Ok(()),
            None => Err(GuardError::Transaction(
                "commit called outside a transaction".to_string(),
            )),
        }
    }

    fn abort(&self) -> Result<()> {
        let me = thread::current().id();
        let txn = self.txns.lock().remove(&me);
        match txn {
            Some(Txn::Write { .. }) => {
                self.release_writer();
                debug!("Aborted write transaction on {:?}", me);
                Ok(())
            }
            Some(Txn::Read(_)) => Ok(()),
            None => Err(GuardError::Transaction(
                "abort called outside a transaction".to_string(),
            )),
        }
    }

    fn end(&self) {
        let txn = self.txns.lock().remove(&thread::current().id());
        if let Some(Txn::Write { .. }) = txn {
            self.release_writer();
        }
    }

    fn transaction_mode(&self) -> Option<TxnMode> {
        self.txns
            .lock()
            .get(&thread::current().id())
            .map(Txn::mode)
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn lock(&self) -> &StoreLock {
        &self.lock
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Term;
    use std::sync::mpsc;

    fn quad(graph: &str, n: u32) -> Quad {
        Quad::new(
            GraphName::named(graph),
            Term::iri(format!("http://example.org/s{}", n)),
            Term::iri("http://example.org/p"),
            Term::literal(n.to_string()),
        )
    }

    #[test]
    fn test_add_find_delete() {
        let store = MemoryStore::new();
        store.add(&quad("http://example.org/g1", 1)).unwrap();
        store.add(&quad("http://example.org/g2", 2)).unwrap();

        assert_eq!(store.find(&QuadPattern::any()).unwrap().count(), 2);
        assert_eq!(
            store
                .find(&QuadPattern::in_graph(GraphName::named("http://example.org/g1")))
                .unwrap()
                .count(),
            1
        );

        store.delete(&quad("http://example.org/g1", 1)).unwrap();
        assert!(!store
            .contains_graph(&GraphName::named("http://example.org/g1"))
            .unwrap());
        assert_eq!(store.size().unwrap(), Some(1));
    }

    #[test]
    fn test_find_named_skips_default_graph() {
        let store = MemoryStore::new();
        store
            .add(&Quad::new(
                GraphName::Default,
                Term::iri("http://example.org/s"),
                Term::iri("http://example.org/p"),
                Term::literal("d"),
            ))
            .unwrap();
        store.add(&quad("http://example.org/g1", 1)).unwrap();

        assert_eq!(store.find(&QuadPattern::any()).unwrap().count(), 2);
        let named: Vec<Quad> = store
            .find_named(&QuadPattern::any())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(named.len(), 1);
        assert!(!named[0].graph.is_default());
    }

    #[test]
    fn test_add_graph_replaces_contents() {
        let store = MemoryStore::new();
        let name = GraphName::named("http://example.org/g");
        store.add(&quad("http://example.org/g", 1)).unwrap();

        let replacement: Graph = vec![quad("http://example.org/g", 7).triple()]
            .into_iter()
            .collect();
        store.add_graph(&name, &replacement).unwrap();

        assert_eq!(store.graph(&name).unwrap(), replacement);
    }

    #[test]
    fn test_write_transaction_isolated_from_other_threads() {
        let store = Arc::new(MemoryStore::new());
        store.begin(TxnMode::Write).unwrap();
        store.add(&quad("http://example.org/g", 1)).unwrap();

        // Same thread sees its own uncommitted write
        assert!(store.contains_quad(&quad("http://example.org/g", 1)).unwrap());

        // Another thread sees the committed state only
        let other = Arc::clone(&store);
        let seen = thread::spawn(move || other.is_empty().unwrap())
            .join()
            .unwrap();
        assert!(seen);

        store.commit().unwrap();
        let other = Arc::clone(&store);
        let seen = thread::spawn(move || other.is_empty().unwrap())
            .join()
            .unwrap();
        assert!(!seen);
    }

    #[test]
    fn test_abort_discards_changes() {
        let store = MemoryStore::new();
        store.begin(TxnMode::Write).unwrap();
        store.add(&quad("http://example.org/g", 1)).unwrap();
        store.abort().unwrap();

        assert!(store.is_empty().unwrap());
        assert!(!store.is_in_transaction());
    }

    #[test]
    fn test_end_aborts_uncommitted_write() {
        let store = MemoryStore::new();
        store.begin(TxnMode::Write).unwrap();
        store.add(&quad("http://example.org/g", 1)).unwrap();
        store.end();

        assert!(store.is_empty().unwrap());
        // Writer slot was released: autocommit write must not block
        store.add(&quad("http://example.org/g", 2)).unwrap();
    }

    #[test]
    fn test_read_transaction_pins_snapshot() {
        let store = Arc::new(MemoryStore::new());
        store.begin(TxnMode::Read).unwrap();

        let writer = Arc::clone(&store);
        thread::spawn(move || writer.add(&quad("http://example.org/g", 1)).unwrap())
            .join()
            .unwrap();

        assert!(store.is_empty().unwrap());
        assert!(store.add(&quad("http://example.org/g", 2)).is_err());
        store.end();
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn test_nested_begin_rejected() {
        let store = MemoryStore::new();
        store.begin(TxnMode::Read).unwrap();
        assert!(store.begin(TxnMode::Write).is_err());
        store.end();
        assert!(store.commit().is_err());
    }

    #[test]
    fn test_promote_isolated_fails_after_intervening_commit() {
        let store = Arc::new(MemoryStore::new());
        store.begin(TxnMode::Read).unwrap();

        let writer = Arc::clone(&store);
        thread::spawn(move || writer.add(&quad("http://example.org/g", 1)).unwrap())
            .join()
            .unwrap();

        assert!(!store.promote(Promote::Isolated).unwrap());
        assert!(store.promote(Promote::ReadCommitted).unwrap());
        assert_eq!(store.transaction_mode(), Some(TxnMode::Write));
        store.add(&quad("http://example.org/g", 2)).unwrap();
        store.commit().unwrap();
        assert_eq!(store.find(&QuadPattern::any()).unwrap().count(), 2);
    }

    #[test]
    fn test_second_writer_waits_for_first() {
        let store = Arc::new(MemoryStore::new());
        store.begin(TxnMode::Write).unwrap();

        let (tx, rx) = mpsc::channel();
        let writer = Arc::clone(&store);
        let handle = thread::spawn(move || {
            writer.begin(TxnMode::Write).unwrap();
            let seen = writer.contains_quad(&quad("http://example.org/g", 1)).unwrap();
            writer.commit().unwrap();
            tx.send(seen).unwrap();
        });

        store.add(&quad("http://example.org/g", 1)).unwrap();
        store.commit().unwrap();
        handle.join().unwrap();

        // The second writer began only after the first committed
        assert!(rx.recv().unwrap());
    }

    #[test]
    fn test_clear_and_version() {
        let store = MemoryStore::with_quads(vec![quad("http://example.org/g", 1)]);
        let before = store.version();
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.version(), before + 1);
    }
}
