//! Core implementation
//!
//! - [`model`] - Terms, quads and graph addressing
//! - [`store`] - The transactional quad store contract and an in-memory store
//! - [`query`] - Graph-pattern queries used to read policy data
//! - [`iam`] - Principals, policy entries, schemas and the decision engine
//! - [`secured`] - The enforcing store decorator
//! - [`config`], [`assembler`] - Configuration and assembly of a secured store
//!
//! ```text
//! caller ──► SecuredStore ──► SecurityEvaluator::decide
//!                 │                 ├─ own-graph rule
//!                 │                 ├─ DecisionCache
//!                 │                 └─ policy graph query ─► QuadStore
//!                 │                      (IsolatedReader when the target
//!                 │                       is the policy graph)
//!                 └──────────────► wrapped QuadStore
//! ```

pub mod assembler;
pub mod config;
pub mod error;
pub mod iam;
pub mod model;
pub mod query;
pub mod secured;
pub mod store;
pub mod validation;
