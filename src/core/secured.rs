//! Access-controlled quad store
//!
//! [`SecuredStore`] wraps another [`QuadStore`] and asks a
//! [`SecurityEvaluator`] before every data operation:
//!
//! | Operation | Action | When denied |
//! |---|---|---|
//! | `default_graph`, `graph` | Read | empty graph |
//! | `contains_graph` | Read | `false` |
//! | `add_graph`, `add`, `add_terms` | Create | `AccessDenied` |
//! | `remove_graph`, `delete`, `delete_terms` | Delete | `AccessDenied` |
//! | `delete_any` on one graph | Delete on that graph | `AccessDenied` |
//! | `delete_any` on any graph, `clear` | Delete on every graph | `AccessDenied`, nothing removed |
//! | `find`, `find_named` on one graph | Read on that graph | `AccessDenied` |
//! | `find`, `find_named` on any graph | Read per quad | quad skipped |
//! | `graph_names` | Read per name | name skipped |
//! | `contains`, `is_empty` | through `find` | - |
//!
//! `size` is always unknown and `union_graph` is unsupported. Transaction
//! control passes straight through. Outside a caller transaction, `delete_any`
//! and `clear` check and delete inside one write transaction of their own.
//!
//! Filtered sequences are lazy. They capture the caller's principal when
//! created and remember the decision for the last graph seen, so a run of
//! quads from one graph costs a single decision.
//!
//! Writes that can change the policy graph drop cached decisions right away
//! and again when the surrounding transaction commits, aborts or ends.

use crate::core::error::{GuardError, Result};
use crate::core::iam::{Action, Principal, SecurityEvaluator};
use crate::core::model::{Graph, GraphName, GraphSelector, Quad, QuadPattern};
use crate::core::store::{
    Context, GraphNameIter, Promote, QuadIter, QuadStore, StoreLock, TxnMode,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// Quad store decorator enforcing graph-level access control
pub struct SecuredStore {
    inner: Arc<dyn QuadStore>,
    evaluator: Arc<dyn SecurityEvaluator>,
    policy_graph: Option<GraphName>,
    /// Threads whose open transaction has written policy data
    policy_dirty: Mutex<HashSet<ThreadId>>,
}

impl SecuredStore {
    pub fn new(inner: Arc<dyn QuadStore>, evaluator: Arc<dyn SecurityEvaluator>) -> Self {
        SecuredStore {
            inner,
            evaluator,
            policy_graph: None,
            policy_dirty: Mutex::new(HashSet::new()),
        }
    }

    /// Invalidate the evaluator when `graph` is written through this store
    pub fn with_policy_graph(mut self, graph: GraphName) -> Self {
        self.policy_graph = Some(graph);
        self
    }

    pub fn inner(&self) -> &Arc<dyn QuadStore> {
        &self.inner
    }

    pub fn evaluator(&self) -> &Arc<dyn SecurityEvaluator> {
        &self.evaluator
    }

    /// Whether the current principal may perform `action` on `graph`
    pub fn is_allowed(&self, action: Action, graph: &GraphName) -> Result<bool> {
        let principal = self.evaluator.principal();
        self.evaluator.decide(principal.as_ref(), action, graph)
    }

    fn require(&self, action: Action, graph: &GraphName) -> Result<()> {
        if self.is_allowed(action, graph)? {
            Ok(())
        } else {
            debug!(%action, graph = %graph, "Access denied");
            Err(GuardError::access_denied(action, graph))
        }
    }

    /// Every graph currently in the store; the default graph counts when it
    /// holds data
    fn every_graph(&self) -> Result<Vec<GraphName>> {
        let mut graphs = Vec::new();
        if self
            .inner
            .contains(&QuadPattern::in_graph(GraphSelector::Default))?
        {
            graphs.push(GraphName::Default);
        }
        for name in self.inner.graph_names()? {
            graphs.push(name?);
        }
        Ok(graphs)
    }

    /// Succeeds only if `action` is allowed on every graph in the store
    fn require_everywhere(&self, action: Action) -> Result<()> {
        for graph in self.every_graph()? {
            self.require(action, &graph)?;
        }
        Ok(())
    }

    fn require_selected(&self, action: Action, selector: &GraphSelector) -> Result<()> {
        match selector {
            GraphSelector::Default => self.require(action, &GraphName::Default),
            GraphSelector::Named(iri) => self.require(action, &GraphName::named(iri.as_str())),
            GraphSelector::Any => self.require_everywhere(action),
        }
    }

    fn is_policy_graph(&self, graph: &GraphName) -> bool {
        self.policy_graph.as_ref() == Some(graph)
    }

    fn selects_policy_graph(&self, selector: &GraphSelector) -> bool {
        self.policy_graph
            .as_ref()
            .is_some_and(|policy| selector.matches(policy))
    }

    /// Drop cached decisions after a write that may have changed policy data
    fn policy_written(&self) {
        self.evaluator.invalidate();
        if self.inner.is_in_transaction() {
            self.policy_dirty.lock().insert(thread::current().id());
        }
    }

    /// Re-invalidate once the transaction that wrote policy data is over
    fn settle_policy(&self) {
        let was_dirty = self.policy_dirty.lock().remove(&thread::current().id());
        if was_dirty {
            self.evaluator.invalidate();
        }
    }

    /// Run the access checks and the write of `op` in one write transaction,
    /// so the graphs checked are the graphs written. An open transaction of
    /// the caller is used as is.
    fn checked_write<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        if self.inner.is_in_transaction() || !self.inner.supports_transactions() {
            return op();
        }

        self.inner.begin(TxnMode::Write)?;
        let result = op().and_then(|value| {
            self.inner.commit()?;
            Ok(value)
        });
        if result.is_err() && self.inner.is_in_transaction() {
            if let Err(err) = self.inner.abort() {
                debug!("Abort after failed write: {}", err);
            }
        }
        self.inner.end();
        self.settle_policy();
        result
    }

    fn filtered<'a>(&'a self, quads: QuadIter<'a>) -> QuadIter<'a> {
        Box::new(SecuredQuads::new(
            quads,
            Arc::clone(&self.evaluator),
            self.evaluator.principal(),
        ))
    }

    fn secured_find<'a>(
        &'a self,
        pattern: &QuadPattern,
        find: impl FnOnce(&'a dyn QuadStore, &QuadPattern) -> Result<QuadIter<'a>>,
    ) -> Result<QuadIter<'a>> {
        match &pattern.graph {
            GraphSelector::Any => Ok(self.filtered(find(self.inner.as_ref(), pattern)?)),
            selector => {
                self.require_selected(Action::Read, selector)?;
                find(self.inner.as_ref(), pattern)
            }
        }
    }
}

impl QuadStore for SecuredStore {
    fn default_graph(&self) -> Result<Graph> {
        self.graph(&GraphName::Default)
    }

    fn graph(&self, name: &GraphName) -> Result<Graph> {
        if self.is_allowed(Action::Read, name)? {
            self.inner.graph(name)
        } else {
            debug!(graph = %name, "Read denied, returning empty graph");
            Ok(Graph::new())
        }
    }

    fn union_graph(&self) -> Result<Graph> {
        Err(GuardError::Unsupported(
            "union graph is not available through a secured store".to_string(),
        ))
    }

    fn contains_graph(&self, name: &GraphName) -> Result<bool> {
        Ok(self.is_allowed(Action::Read, name)? && self.inner.contains_graph(name)?)
    }

    fn add_graph(&self, name: &GraphName, data: &Graph) -> Result<()> {
        self.require(Action::Create, name)?;
        self.inner.add_graph(name, data)?;
        if self.is_policy_graph(name) {
            self.policy_written();
        }
        Ok(())
    }

    fn remove_graph(&self, name: &GraphName) -> Result<()> {
        self.require(Action::Delete, name)?;
        self.inner.remove_graph(name)?;
        if self.is_policy_graph(name) {
            self.policy_written();
        }
        Ok(())
    }

    fn graph_names(&self) -> Result<GraphNameIter<'_>> {
        Ok(Box::new(SecuredGraphNames {
            inner: self.inner.graph_names()?,
            evaluator: Arc::clone(&self.evaluator),
            principal: self.evaluator.principal(),
        }))
    }

    fn add(&self, quad: &Quad) -> Result<()> {
        self.require(Action::Create, &quad.graph)?;
        self.inner.add(quad)?;
        if self.is_policy_graph(&quad.graph) {
            self.policy_written();
        }
        Ok(())
    }

    fn delete(&self, quad: &Quad) -> Result<()> {
        self.require(Action::Delete, &quad.graph)?;
        self.inner.delete(quad)?;
        if self.is_policy_graph(&quad.graph) {
            self.policy_written();
        }
        Ok(())
    }

    fn delete_any(&self, pattern: &QuadPattern) -> Result<()> {
        self.checked_write(|| {
            self.require_selected(Action::Delete, &pattern.graph)?;
            self.inner.delete_any(pattern)?;
            if self.selects_policy_graph(&pattern.graph) {
                self.policy_written();
            }
            Ok(())
        })
    }

    fn find(&self, pattern: &QuadPattern) -> Result<QuadIter<'_>> {
        self.secured_find(pattern, |store, pattern| store.find(pattern))
    }

    fn find_named(&self, pattern: &QuadPattern) -> Result<QuadIter<'_>> {
        self.secured_find(pattern, |store, pattern| store.find_named(pattern))
    }

    fn contains(&self, pattern: &QuadPattern) -> Result<bool> {
        match self.find(pattern) {
            Ok(mut quads) => Ok(quads.next().transpose()?.is_some()),
            Err(err) if err.is_access_denied() => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn size(&self) -> Result<Option<usize>> {
        Ok(None)
    }

    fn clear(&self) -> Result<()> {
        self.checked_write(|| {
            self.require_everywhere(Action::Delete)?;
            self.inner.clear()?;
            if self.policy_graph.is_some() {
                self.policy_written();
            }
            Ok(())
        })
    }

    fn begin(&self, mode: TxnMode) -> Result<()> {
        self.inner.begin(mode)
    }

    fn promote(&self, mode: Promote) -> Result<bool> {
        self.inner.promote(mode)
    }

    fn commit(&self) -> Result<()> {
        let result = self.inner.commit();
        self.settle_policy();
        result
    }

    fn abort(&self) -> Result<()> {
        let result = self.inner.abort();
        self.settle_policy();
        result
    }

    fn end(&self) {
        self.inner.end();
        self.settle_policy();
    }

    fn transaction_mode(&self) -> Option<TxnMode> {
        self.inner.transaction_mode()
    }

    fn supports_transactions(&self) -> bool {
        self.inner.supports_transactions()
    }

    fn lock(&self) -> &StoreLock {
        self.inner.lock()
    }

    fn context(&self) -> &Context {
        self.inner.context()
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

/// Quads of an any-graph `find`, minus those the principal may not read
pub struct SecuredQuads<'a> {
    inner: QuadIter<'a>,
    evaluator: Arc<dyn SecurityEvaluator>,
    principal: Option<Principal>,
    last: Option<(GraphName, bool)>,
}

impl<'a> SecuredQuads<'a> {
    pub fn new(
        inner: QuadIter<'a>,
        evaluator: Arc<dyn SecurityEvaluator>,
        principal: Option<Principal>,
    ) -> Self {
        SecuredQuads {
            inner,
            evaluator,
            principal,
            last: None,
        }
    }

    fn readable(&mut self, graph: &GraphName) -> Result<bool> {
        if let Some((seen, allowed)) = &self.last {
            if seen == graph {
                return Ok(*allowed);
            }
        }
        let allowed = self
            .evaluator
            .decide(self.principal.as_ref(), Action::Read, graph)?;
        self.last = Some((graph.clone(), allowed));
        Ok(allowed)
    }
}

impl Iterator for SecuredQuads<'_> {
    type Item = Result<Quad>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let quad = match self.inner.next()? {
                Ok(quad) => quad,
                Err(err) => return Some(Err(err)),
            };
            match self.readable(&quad.graph) {
                Ok(true) => return Some(Ok(quad)),
                Ok(false) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Graph names the principal may read
pub struct SecuredGraphNames<'a> {
    inner: GraphNameIter<'a>,
    evaluator: Arc<dyn SecurityEvaluator>,
    principal: Option<Principal>,
}

impl Iterator for SecuredGraphNames<'_> {
    type Item = Result<GraphName>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let name = match self.inner.next()? {
                Ok(name) => name,
                Err(err) => return Some(Err(err)),
            };
            match self
                .evaluator
                .decide(self.principal.as_ref(), Action::Read, &name)
            {
                Ok(true) => return Some(Ok(name)),
                Ok(false) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
