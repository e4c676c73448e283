//! Policy reads on a dedicated thread
//!
//! Transactions are per thread. A caller that is in the middle of a write
//! transaction touching the policy graph cannot safely query that graph from
//! its own thread, so such reads are shipped to a worker thread that opens
//! its own read transaction, runs the read, ends the transaction and hands the
//! result back. The caller blocks until the answer arrives.
//!
//! On [`Drop`] the job sender is dropped, the worker's `recv()` loop ends and
//! the thread is joined.

use crate::core::error::{GuardError, Result};
use crate::core::store::{QuadStore, TxnMode};
use crossbeam::channel::{self, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce(&dyn QuadStore) + Send>;

/// Worker thread running reads inside its own read transaction
pub struct IsolatedReader {
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl IsolatedReader {
    pub const THREAD_NAME: &'static str = "policy-reader";

    /// Start the worker for `store`
    pub fn spawn(store: Arc<dyn QuadStore>) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();

        let worker = thread::Builder::new()
            .name(Self::THREAD_NAME.into())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job(store.as_ref());
                }
                debug!("Policy reader stopped");
            })?;

        Ok(IsolatedReader {
            jobs: Some(tx),
            worker: Some(worker),
        })
    }

    /// Run `read` on the worker inside a fresh read transaction and wait for
    /// its result
    pub fn run<T, F>(&self, read: F) -> Result<T>
    where
        F: FnOnce(&dyn QuadStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = channel::bounded::<Result<T>>(1);

        let job: Job = Box::new(move |store| {
            let result = match store.begin(TxnMode::Read) {
                Ok(()) => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| read(store)))
                        .unwrap_or_else(|_| {
                            Err(GuardError::policy_query("policy read panicked"))
                        });
                    store.end();
                    outcome
                }
                Err(err) => Err(err),
            };
            // The caller may have given up; nothing to do then
            let _ = reply_tx.send(result);
        });

        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| GuardError::policy_query("policy reader is shut down"))?;
        jobs.send(job)
            .map_err(|_| GuardError::policy_query("policy reader thread is gone"))?;

        match reply_rx.recv() {
            Ok(result) => result.map_err(|err| match err {
                GuardError::PolicyQuery(_) => err,
                other => GuardError::policy_query(other),
            }),
            Err(_) => Err(GuardError::policy_query(
                "policy reader dropped the request",
            )),
        }
    }
}

impl Drop for IsolatedReader {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(worker) = self.worker.take() {
            // Never join ourselves
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!("Policy reader thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{GraphName, Quad, QuadPattern, Term};
    use crate::core::store::MemoryStore;

    fn quad(graph: &str, object: &str) -> Quad {
        Quad::new(
            GraphName::named(graph),
            Term::iri("http://example.org/s"),
            Term::iri("http://example.org/p"),
            Term::literal(object),
        )
    }

    #[test]
    fn test_runs_inside_read_transaction_on_worker() {
        let store: Arc<dyn QuadStore> = Arc::new(MemoryStore::new());
        let reader = IsolatedReader::spawn(Arc::clone(&store)).unwrap();

        let (mode, name) = reader
            .run(|store| {
                Ok((
                    store.transaction_mode(),
                    thread::current().name().map(str::to_string),
                ))
            })
            .unwrap();

        assert_eq!(mode, Some(TxnMode::Read));
        assert_eq!(name.as_deref(), Some(IsolatedReader::THREAD_NAME));
        // Transaction ended after the read
        assert_eq!(reader.run(|_| Ok(1)).unwrap(), 1);
    }

    #[test]
    fn test_sees_committed_state_while_caller_writes() {
        let g = "http://example.org/graphs/security";
        let store: Arc<dyn QuadStore> = Arc::new(MemoryStore::with_quads(vec![quad(g, "old")]));
        let reader = IsolatedReader::spawn(Arc::clone(&store)).unwrap();

        store.begin(TxnMode::Write).unwrap();
        store.add(&quad(g, "new")).unwrap();

        let seen = reader
            .run(move |store| {
                let quads = store.find(&QuadPattern::in_graph(GraphName::named(g)))?;
                quads.map(|q| q.map(|q| q.object)).collect::<Result<Vec<_>>>()
            })
            .unwrap();
        assert_eq!(seen, vec![Term::literal("old")]);

        store.commit().unwrap();
        store.end();

        let count = reader
            .run(move |store| Ok(store.find(&QuadPattern::any())?.count()))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_errors_come_back_as_policy_query_failures() {
        let store: Arc<dyn QuadStore> = Arc::new(MemoryStore::new());
        let reader = IsolatedReader::spawn(store).unwrap();

        let err = reader
            .run(|_| -> Result<()> { Err(GuardError::Store("disk on fire".into())) })
            .unwrap_err();
        assert!(matches!(err, GuardError::PolicyQuery(ref msg) if msg.contains("disk on fire")));

        let err = reader
            .run(|_| -> Result<()> { panic!("boom") })
            .unwrap_err();
        assert!(matches!(err, GuardError::PolicyQuery(_)));

        // Worker survives both
        assert!(reader.run(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_drop_joins_worker() {
        let store: Arc<dyn QuadStore> = Arc::new(MemoryStore::new());
        let reader = IsolatedReader::spawn(Arc::clone(&store)).unwrap();
        reader.run(|_| Ok(())).unwrap();
        drop(reader);

        // Worker released its handle on the store
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
