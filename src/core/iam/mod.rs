//! Graph-level access control
//!
//! Provides per-graph authorization with:
//! - Principals supplied per call by a pluggable source
//! - Policy entries stored as statements in a policy graph
//! - Path-glob pattern matching over graph identifiers
//! - An own-graph rule granting each user full access to a private graph
//! - LRU caching of decisions
//! - Policy-graph reads isolated on a dedicated thread

mod cache;
mod evaluator;
mod isolation;
mod pattern;
mod policy;
mod principal;
mod schema;

pub use cache::{CacheStats, DecisionCache, DecisionKey, DEFAULT_CACHE_CAPACITY};
pub use evaluator::{GraphPolicyEvaluator, SecurityEvaluator};
pub use isolation::IsolatedReader;
pub use pattern::PatternMatcher;
pub use policy::{Action, PermissionMode, PolicyDocument, PolicyEntry, PrincipalMatcher};
pub use principal::{Principal, PrincipalGuard, PrincipalSource, StaticPrincipal, ThreadPrincipal};
pub use schema::{AclSchema, Grant, LegacySchema, PolicySchema, SchemaKind};

/// Vocabulary constants used by the bundled schemas
pub mod vocab {
    pub use super::schema::{
        ACL_NS, FOAF_NS, FO_NS, GRAPHS_NS, GRAPH_VAR, LEGACY_ALL_USERS, PERMISSION_VAR, RDF_TYPE,
        SEC_NS, USERS_NS,
    };
}
