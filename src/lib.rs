//! # quadguard - Graph-Level Access Control for Quad Stores
//!
//! `quadguard` puts an access-control layer in front of a transactional quad
//! store so many authenticated users can share one store while each named
//! graph stays readable or writable only by the principals allowed to use it.
//!
//! - **Policy in the data**: grants are statements in a policy graph, matched
//!   against graph IRIs with path globs (`*`, `**`)
//! - **Own graphs**: every user fully controls `own_graph_prefix + identity`
//! - **Drop-in decorator**: [`SecuredStore`] implements the same [`QuadStore`]
//!   trait it wraps
//! - **Cached decisions** with invalidation on policy writes
//!
//! ## Quick Start
//!
//! ```rust
//! use quadguard::iam::{PermissionMode, PolicyDocument, PolicyEntry, Principal, ThreadPrincipal};
//! use quadguard::{GraphName, GuardConfig, MemoryStore, Quad, QuadStore, Result, SecuredStoreBuilder, Term};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let mut policy = PolicyDocument::new();
//! policy.add_entry(PolicyEntry::for_identity(
//!     "alice",
//!     "https://example.org/graphs/team/**",
//!     PermissionMode::Write,
//! ));
//!
//! let store = SecuredStoreBuilder::new(Arc::new(MemoryStore::new()))
//!     .config(GuardConfig::new(
//!         "https://example.org/graphs/security",
//!         "https://example.org/graphs/users/",
//!     )?)
//!     .seed_policy(policy)
//!     .build()?;
//!
//! let _alice = ThreadPrincipal::bind(Principal::authenticated("alice"));
//! let quad = |graph: &str| {
//!     Quad::new(
//!         GraphName::named(graph),
//!         Term::iri("https://example.org/s"),
//!         Term::iri("https://example.org/p"),
//!         Term::literal("o"),
//!     )
//! };
//!
//! store.add(&quad("https://example.org/graphs/team/red"))?;
//! store.add(&quad("https://example.org/graphs/users/alice"))?;
//! assert!(store.add(&quad("https://example.org/graphs/finance")).is_err());
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::iam;

pub use crate::core::{
    assembler::{seed_policy_graph, SecuredStoreBuilder, UNION_DEFAULT_GRAPH},
    config::GuardConfig,
    error::{GuardError, Result},
    iam::{Action, GraphPolicyEvaluator, Principal, PrincipalSource, SecurityEvaluator},
    model::{
        Graph, GraphName, GraphSelector, Literal, Quad, QuadPattern, Term, Triple,
        DEFAULT_GRAPH_SECURITY_NAME,
    },
    query::{BgpEngine, QueryEngine},
    secured::{SecuredGraphNames, SecuredQuads, SecuredStore},
    store::{Context, MemoryStore, Promote, QuadStore, TxnMode},
    validation::GraphIri,
};
