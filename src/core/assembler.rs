//! Assembly of a secured store
//!
//! [`SecuredStoreBuilder`] wires a store, a [`GuardConfig`] and the optional
//! collaborators into a [`SecuredStore`]:
//! 1. records `union_default_graph` in the store context
//! 2. seeds the policy graph from a [`PolicyDocument`], if one is given
//!    directly or named by the config
//! 3. builds a [`GraphPolicyEvaluator`] (unless an evaluator is supplied)
//! 4. wraps the store
//!
//! Seeding runs in its own write transaction and replaces the policy graph.
//! A failed seed is logged and rolled back; the store is still built.

use crate::core::config::GuardConfig;
use crate::core::error::{GuardError, Result};
use crate::core::iam::{
    GraphPolicyEvaluator, PolicyDocument, PolicySchema, PrincipalSource, SecurityEvaluator,
};
use crate::core::model::{Graph, GraphName};
use crate::core::query::QueryEngine;
use crate::core::secured::SecuredStore;
use crate::core::store::{QuadStore, TxnMode};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Context key holding the union-default-graph setting
pub const UNION_DEFAULT_GRAPH: &str = "union_default_graph";

/// Builder for [`SecuredStore`]
pub struct SecuredStoreBuilder {
    inner: Arc<dyn QuadStore>,
    config: Option<GuardConfig>,
    principals: Option<Arc<dyn PrincipalSource>>,
    engine: Option<Arc<dyn QueryEngine>>,
    schema: Option<Arc<dyn PolicySchema>>,
    evaluator: Option<Arc<dyn SecurityEvaluator>>,
    seed: Option<PolicyDocument>,
}

impl SecuredStoreBuilder {
    pub fn new(inner: Arc<dyn QuadStore>) -> Self {
        SecuredStoreBuilder {
            inner,
            config: None,
            principals: None,
            engine: None,
            schema: None,
            evaluator: None,
            seed: None,
        }
    }

    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Where the principal of each call comes from (defaults to the
    /// thread-bound principal)
    pub fn principals(mut self, principals: Arc<dyn PrincipalSource>) -> Self {
        self.principals = Some(principals);
        self
    }

    pub fn query_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Policy vocabulary; overrides the config's `schema`
    pub fn schema(mut self, schema: Arc<dyn PolicySchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Use this evaluator instead of building a [`GraphPolicyEvaluator`]
    pub fn evaluator(mut self, evaluator: Arc<dyn SecurityEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Seed the policy graph with `document`; overrides the config's
    /// `policy_document`
    pub fn seed_policy(mut self, document: PolicyDocument) -> Self {
        self.seed = Some(document);
        self
    }

    pub fn build(self) -> Result<SecuredStore> {
        let config = self
            .config
            .ok_or_else(|| GuardError::Config("configuration must be set".to_string()))?;
        config.validate()?;

        let policy_graph = config.policy_graph.to_graph_name();
        let schema = self.schema.unwrap_or_else(|| config.schema.build());

        info!(
            policy_graph = %policy_graph,
            schema = schema.name(),
            cache_capacity = config.cache_capacity,
            "Assembling secured store"
        );

        if config.union_default_graph {
            self.inner.context().set(UNION_DEFAULT_GRAPH, "true");
        }

        let seed = match (self.seed, &config.policy_document) {
            (Some(document), _) => Some(document),
            (None, Some(path)) => {
                let json = std::fs::read_to_string(path)?;
                Some(PolicyDocument::from_json(&json)?)
            }
            (None, None) => None,
        };
        if let Some(document) = seed {
            seed_policy_graph(self.inner.as_ref(), &policy_graph, schema.as_ref(), &document);
        }

        let evaluator: Arc<dyn SecurityEvaluator> = match self.evaluator {
            Some(evaluator) => evaluator,
            None => {
                let mut evaluator = GraphPolicyEvaluator::new(
                    Arc::clone(&self.inner),
                    policy_graph.clone(),
                    config.own_graph_prefix.as_str(),
                )?
                .with_schema(schema)
                .with_cache_capacity(config.cache_capacity);
                if let Some(principals) = self.principals {
                    evaluator = evaluator.with_principals(principals);
                }
                if let Some(engine) = self.engine {
                    evaluator = evaluator.with_engine(engine);
                }
                Arc::new(evaluator)
            }
        };

        Ok(SecuredStore::new(self.inner, evaluator).with_policy_graph(policy_graph))
    }
}

/// Replace the policy graph with the statements for `document`
///
/// Failures are logged and the write transaction is aborted.
pub fn seed_policy_graph(
    store: &dyn QuadStore,
    policy_graph: &GraphName,
    schema: &dyn PolicySchema,
    document: &PolicyDocument,
) -> bool {
    let data: Graph = document
        .entries
        .iter()
        .flat_map(|entry| schema.encode(entry))
        .collect();

    if let Err(err) = store.begin(TxnMode::Write) {
        warn!("Error while populating policy graph: {}", err);
        return false;
    }

    let outcome = store
        .add_graph(policy_graph, &data)
        .and_then(|()| store.commit());
    match outcome {
        Ok(()) => {
            debug!(
                entries = document.entries.len(),
                statements = data.len(),
                "Policy graph seeded"
            );
            store.end();
            true
        }
        Err(err) => {
            warn!("Error while populating policy graph: {}", err);
            if let Err(abort_err) = store.abort() {
                debug!("Abort after failed seed: {}", abort_err);
            }
            store.end();
            false
        }
    }
}
