//! Access decisions for (principal, action, graph)
//!
//! [`GraphPolicyEvaluator`] answers from three places, in order:
//! 1. the own-graph rule: `own_graph_prefix + identity` is always fully
//!    accessible to that identity (never cached)
//! 2. the [`DecisionCache`], only when the calling thread has no open
//!    transaction so that cached answers always come from committed state
//! 3. the policy graph, queried through the configured [`PolicySchema`] and
//!    [`QueryEngine`]. Reads that target the policy graph itself run on the
//!    [`IsolatedReader`]
//!
//! Missing or unauthenticated principals are denied without a query.

use super::{
    Action, AclSchema, CacheStats, DecisionCache, DecisionKey, IsolatedReader, PatternMatcher,
    PolicySchema, Principal, PrincipalSource, ThreadPrincipal,
};
use crate::core::error::{GuardError, Result};
use crate::core::model::GraphName;
use crate::core::query::{BgpEngine, Bindings, QueryEngine};
use crate::core::store::QuadStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pluggable decision point used by the secured store
pub trait SecurityEvaluator: Send + Sync {
    /// Principal of the current call
    fn principal(&self) -> Option<Principal>;

    fn decide(&self, principal: Option<&Principal>, action: Action, graph: &GraphName)
        -> Result<bool>;

    /// True when every action is allowed
    fn decide_all(
        &self,
        principal: Option<&Principal>,
        actions: &[Action],
        graph: &GraphName,
    ) -> Result<bool> {
        for &action in actions {
            if !self.decide(principal, action, graph)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True when at least one action is allowed
    fn decide_any(
        &self,
        principal: Option<&Principal>,
        actions: &[Action],
        graph: &GraphName,
    ) -> Result<bool> {
        for &action in actions {
            if self.decide(principal, action, graph)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Forget cached decisions
    fn invalidate(&self) {}
}

/// Evaluator backed by policy statements stored in a graph of the store
pub struct GraphPolicyEvaluator {
    store: Arc<dyn QuadStore>,
    engine: Arc<dyn QueryEngine>,
    schema: Arc<dyn PolicySchema>,
    principals: Arc<dyn PrincipalSource>,
    cache: DecisionCache,
    reader: IsolatedReader,
    policy_graph: GraphName,
    own_graph_prefix: String,
}

impl GraphPolicyEvaluator {
    /// Evaluator over `store` with the ACL vocabulary, the built-in query
    /// engine and the thread-bound principal
    pub fn new(
        store: Arc<dyn QuadStore>,
        policy_graph: GraphName,
        own_graph_prefix: impl Into<String>,
    ) -> Result<Self> {
        let reader = IsolatedReader::spawn(Arc::clone(&store))?;
        Ok(GraphPolicyEvaluator {
            store,
            engine: Arc::new(BgpEngine::new()),
            schema: Arc::new(AclSchema),
            principals: Arc::new(ThreadPrincipal),
            cache: DecisionCache::default(),
            reader,
            policy_graph,
            own_graph_prefix: own_graph_prefix.into(),
        })
    }

    pub fn with_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_schema(mut self, schema: Arc<dyn PolicySchema>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_principals(mut self, principals: Arc<dyn PrincipalSource>) -> Self {
        self.principals = principals;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = DecisionCache::new(capacity);
        self
    }

    pub fn policy_graph(&self) -> &GraphName {
        &self.policy_graph
    }

    pub fn own_graph_prefix(&self) -> &str {
        &self.own_graph_prefix
    }

    pub fn schema(&self) -> &dyn PolicySchema {
        self.schema.as_ref()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whether `graph` is the private graph of `identity`
    pub fn is_own_graph(&self, identity: &str, graph: &GraphName) -> bool {
        graph
            .as_iri()
            .and_then(|iri| iri.strip_prefix(self.own_graph_prefix.as_str()))
            .is_some_and(|rest| rest == identity)
    }

    /// Policy rows applying to `identity`
    fn policy_rows(&self, identity: &str, target: &GraphName) -> Result<Vec<Bindings>> {
        let query = self.schema.entries_query(identity);

        if *target == self.policy_graph {
            let engine = Arc::clone(&self.engine);
            let policy_graph = self.policy_graph.clone();
            return self
                .reader
                .run(move |store| engine.select(store, &policy_graph, &query));
        }

        self.engine
            .select(self.store.as_ref(), &self.policy_graph, &query)
            .map_err(|err| match err {
                GuardError::PolicyQuery(_) => err,
                other => GuardError::policy_query(other),
            })
    }

    fn evaluate_uncached(&self, identity: &str, action: Action, graph: &GraphName) -> Result<bool> {
        let security_name = graph.security_name();
        let rows = self.policy_rows(identity, graph)?;

        for row in &rows {
            let Some(grant) = self.schema.decode(row) else {
                warn!(
                    schema = self.schema.name(),
                    principal = identity,
                    "Skipping malformed policy row"
                );
                continue;
            };
            if grant.mode.implies(action) && PatternMatcher::matches(&grant.pattern, security_name) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl SecurityEvaluator for GraphPolicyEvaluator {
    fn principal(&self) -> Option<Principal> {
        self.principals.principal()
    }

    fn decide(
        &self,
        principal: Option<&Principal>,
        action: Action,
        graph: &GraphName,
    ) -> Result<bool> {
        let principal = match principal {
            Some(p) if p.is_authenticated() => p,
            _ => {
                debug!(%action, graph = %graph, "No authenticated principal, denied");
                return Ok(false);
            }
        };
        let identity = principal.identity();

        if self.is_own_graph(identity, graph) {
            debug!(principal = identity, %action, graph = %graph, "Authorized for own graph");
            return Ok(true);
        }

        // Inside a transaction the policy is read through the caller's view,
        // which may hold uncommitted or pinned data; keep it out of the cache
        if self.store.is_in_transaction() {
            let allowed = self.evaluate_uncached(identity, action, graph)?;
            debug!(principal = identity, %action, graph = %graph, allowed, "Transaction-local decision");
            return Ok(allowed);
        }

        let key = DecisionKey::new(identity, action, graph.security_name());
        if let Some(allowed) = self.cache.get(&key) {
            debug!(principal = identity, %action, graph = %graph, allowed, "Cached decision");
            return Ok(allowed);
        }

        let generation = self.cache.generation();
        let allowed = self.evaluate_uncached(identity, action, graph)?;
        self.cache.put_if_current(key, allowed, generation);

        debug!(principal = identity, %action, graph = %graph, allowed, "Policy decision");
        Ok(allowed)
    }

    fn invalidate(&self) {
        self.cache.clear();
        debug!("Decision cache invalidated");
    }
}
