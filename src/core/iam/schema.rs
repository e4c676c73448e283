//! Policy vocabularies
//!
//! The evaluator does not know how policy entries are spelled as statements;
//! a [`PolicySchema`] owns both directions:
//! - [`PolicySchema::entries_query`] builds the query that returns
//!   `(?graph, ?permission)` rows for one identity (entries naming the identity
//!   plus entries for any authenticated agent)
//! - [`PolicySchema::encode`] turns a [`PolicyEntry`] into the statements that
//!   query finds, which is how the policy graph is seeded
//!
//! Two vocabularies are provided: [`AclSchema`] (Web Access Control terms plus
//! a user-name property) and [`LegacySchema`] (the older per-user
//! `graphAccess` layout).

use super::{PermissionMode, PolicyEntry, PrincipalMatcher};
use crate::core::model::{Term, Triple};
use crate::core::query::{Bindings, Pattern, PatternTerm, SelectQuery, TriplePattern};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Web Access Control namespace
pub const ACL_NS: &str = "http://www.w3.org/ns/auth/acl#";
pub const FOAF_NS: &str = "http://xmlns.com/foaf/0.1/";
/// User-name and graph-pattern properties used alongside `acl:`
pub const FO_NS: &str = "https://linked.solutions/fuseki-oidc/ontology#";

pub const SEC_NS: &str = "http://www.smartswissparticipation.com/security#";
pub const USERS_NS: &str = "http://www.smartswissparticipation.com/users#";
pub const GRAPHS_NS: &str = "http://www.smartswissparticipation.com/graphs#";
/// Subject standing for every user in the legacy vocabulary
pub const LEGACY_ALL_USERS: &str = "http://www.smartswissparticipation.com/users/**";

/// Variable bound to the graph pattern of an entry
pub const GRAPH_VAR: &str = "graph";
/// Variable bound to the permission mode of an entry
pub const PERMISSION_VAR: &str = "permission";

fn iri(ns: &str, local: &str) -> Term {
    Term::iri(format!("{}{}", ns, local))
}

fn var(name: &str) -> PatternTerm {
    PatternTerm::var(name)
}

/// Stable blank-node label for statements describing `entry`
fn node_label(kind: &str, parts: &[&str]) -> String {
    let joined = parts.join("\u{1f}");
    format!("{}-{:016x}", kind, xxh3_64(joined.as_bytes()))
}

/// A policy row reduced to what a decision needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub pattern: String,
    pub mode: PermissionMode,
}

/// Maps policy entries to and from statements in the policy graph
pub trait PolicySchema: Send + Sync {
    fn name(&self) -> &'static str;

    /// Query projecting `?graph` and `?permission` for every entry that
    /// applies to `identity`
    fn entries_query(&self, identity: &str) -> SelectQuery;

    /// Statements representing `entry`
    fn encode(&self, entry: &PolicyEntry) -> Vec<Triple>;

    /// Read one row of [`PolicySchema::entries_query`]; `None` for rows that
    /// cannot be interpreted
    fn decode(&self, row: &Bindings) -> Option<Grant> {
        let pattern_term = row.get(GRAPH_VAR)?;
        let pattern = pattern_term.as_literal().or_else(|| pattern_term.as_iri())?;
        let mode_term = row.get(PERMISSION_VAR)?;
        let mode_name = mode_term.local_name().or_else(|| mode_term.as_literal())?;
        let mode = match PermissionMode::from_name(mode_name) {
            Some(mode) => mode,
            None => {
                debug!(mode = mode_name, "Unknown permission mode in policy row");
                return None;
            }
        };

        Some(Grant {
            pattern: pattern.to_string(),
            mode,
        })
    }
}

/// Authorizations typed `acl:Authorization`, linked to a user name
/// (`fo:agentUserName`) or to every agent (`acl:agentClass foaf:Agent`), with
/// the graph pattern in `fo:accessTo` and the mode as an `acl:` IRI
#[derive(Debug, Clone, Copy, Default)]
pub struct AclSchema;

impl PolicySchema for AclSchema {
    fn name(&self) -> &'static str {
        "acl"
    }

    fn entries_query(&self, identity: &str) -> SelectQuery {
        let auth = || var("authorization");
        let by_name = Pattern::bgp([TriplePattern::new(
            auth(),
            iri(FO_NS, "agentUserName"),
            Term::literal(identity),
        )]);
        let any_agent = Pattern::bgp([TriplePattern::new(
            auth(),
            iri(ACL_NS, "agentClass"),
            iri(FOAF_NS, "Agent"),
        )]);
        let body = Pattern::bgp([
            TriplePattern::new(auth(), Term::iri(RDF_TYPE), iri(ACL_NS, "Authorization")),
            TriplePattern::new(auth(), iri(FO_NS, "accessTo"), var(GRAPH_VAR)),
            TriplePattern::new(auth(), iri(ACL_NS, "mode"), var(PERMISSION_VAR)),
        ]);

        SelectQuery::new([GRAPH_VAR, PERMISSION_VAR], by_name.union(any_agent).join(body))
    }

    fn encode(&self, entry: &PolicyEntry) -> Vec<Triple> {
        let principal = entry.principal.to_string();
        let auth = Term::blank(node_label(
            "auth",
            &[principal.as_str(), entry.graph.as_str(), entry.mode.local_name()],
        ));

        let agent = match &entry.principal {
            PrincipalMatcher::Exact(identity) => Triple::new(
                auth.clone(),
                iri(FO_NS, "agentUserName"),
                Term::literal(identity.as_str()),
            ),
            PrincipalMatcher::AnyAuthenticated => {
                Triple::new(auth.clone(), iri(ACL_NS, "agentClass"), iri(FOAF_NS, "Agent"))
            }
        };

        vec![
            Triple::new(auth.clone(), Term::iri(RDF_TYPE), iri(ACL_NS, "Authorization")),
            agent,
            Triple::new(
                auth.clone(),
                iri(FO_NS, "accessTo"),
                Term::literal(entry.graph.as_str()),
            ),
            Triple::new(auth, iri(ACL_NS, "mode"), iri(ACL_NS, entry.mode.local_name())),
        ]
    }
}

/// Users carrying `sec:graphAccess` nodes, each with a `graphs:graph` pattern
/// and a literal `sec:accessType`
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacySchema;

impl PolicySchema for LegacySchema {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn entries_query(&self, identity: &str) -> SelectQuery {
        let access = || var("access");
        let by_name = Pattern::bgp([
            TriplePattern::new(var("user"), iri(USERS_NS, "username"), Term::literal(identity)),
            TriplePattern::new(var("user"), iri(SEC_NS, "graphAccess"), access()),
        ]);
        let everyone = Pattern::bgp([TriplePattern::new(
            Term::iri(LEGACY_ALL_USERS),
            iri(SEC_NS, "graphAccess"),
            access(),
        )]);
        let body = Pattern::bgp([
            TriplePattern::new(access(), iri(GRAPHS_NS, "graph"), var(GRAPH_VAR)),
            TriplePattern::new(access(), iri(SEC_NS, "accessType"), var(PERMISSION_VAR)),
        ]);

        SelectQuery::new([GRAPH_VAR, PERMISSION_VAR], by_name.union(everyone).join(body))
    }

    fn encode(&self, entry: &PolicyEntry) -> Vec<Triple> {
        let principal = entry.principal.to_string();
        let access = Term::blank(node_label(
            "access",
            &[principal.as_str(), entry.graph.as_str(), entry.mode.local_name()],
        ));

        let mut triples = match &entry.principal {
            PrincipalMatcher::Exact(identity) => {
                let user = Term::blank(node_label("user", &[identity.as_str()]));
                vec![
                    Triple::new(
                        user.clone(),
                        iri(USERS_NS, "username"),
                        Term::literal(identity.as_str()),
                    ),
                    Triple::new(user, iri(SEC_NS, "graphAccess"), access.clone()),
                ]
            }
            PrincipalMatcher::AnyAuthenticated => vec![Triple::new(
                Term::iri(LEGACY_ALL_USERS),
                iri(SEC_NS, "graphAccess"),
                access.clone(),
            )],
        };

        triples.push(Triple::new(
            access.clone(),
            iri(GRAPHS_NS, "graph"),
            Term::literal(entry.graph.as_str()),
        ));
        triples.push(Triple::new(
            access,
            iri(SEC_NS, "accessType"),
            Term::literal(entry.mode.local_name()),
        ));
        triples
    }
}

/// Schema selection as written in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    #[default]
    Acl,
    Legacy,
}

impl SchemaKind {
    pub fn build(self) -> Arc<dyn PolicySchema> {
        match self {
            SchemaKind::Acl => Arc::new(AclSchema),
            SchemaKind::Legacy => Arc::new(LegacySchema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Graph, GraphName};
    use crate::core::query::{BgpEngine, QueryEngine};
    use crate::core::store::{MemoryStore, QuadStore};

    const POLICY: &str = "http://example.org/graphs/security";

    fn entries() -> Vec<PolicyEntry> {
        vec![
            PolicyEntry::for_identity("alice", "http://example.org/graphs/team/**", PermissionMode::Write),
            PolicyEntry::for_identity("alice", "http://example.org/graphs/team/**", PermissionMode::Read),
            PolicyEntry::for_identity("bob", "http://example.org/graphs/bob-only", PermissionMode::Read),
            PolicyEntry::for_any_authenticated("http://example.org/graphs/public/*", PermissionMode::Read),
        ]
    }

    fn grants_for(schema: &dyn PolicySchema, identity: &str) -> Vec<Grant> {
        let graph: Graph = entries().iter().flat_map(|e| schema.encode(e)).collect();
        let store = MemoryStore::new();
        let policy = GraphName::named(POLICY);
        store.add_graph(&policy, &graph).unwrap();

        let rows = BgpEngine::new()
            .select(&store, &policy, &schema.entries_query(identity))
            .unwrap();
        let mut grants: Vec<Grant> = rows.iter().filter_map(|row| schema.decode(row)).collect();
        grants.sort_by(|a, b| (&a.pattern, a.mode.local_name()).cmp(&(&b.pattern, b.mode.local_name())));
        grants
    }

    fn check_schema(schema: &dyn PolicySchema) {
        let alice = grants_for(schema, "alice");
        assert_eq!(
            alice,
            vec![
                Grant {
                    pattern: "http://example.org/graphs/public/*".into(),
                    mode: PermissionMode::Read,
                },
                Grant {
                    pattern: "http://example.org/graphs/team/**".into(),
                    mode: PermissionMode::Read,
                },
                Grant {
                    pattern: "http://example.org/graphs/team/**".into(),
                    mode: PermissionMode::Write,
                },
            ]
        );

        let bob = grants_for(schema, "bob");
        assert_eq!(bob.len(), 2);
        assert!(bob.iter().any(|g| g.pattern.ends_with("bob-only")));

        // Unknown identities still see the wildcard entry
        let carol = grants_for(schema, "carol");
        assert_eq!(carol.len(), 1);
        assert_eq!(carol[0].pattern, "http://example.org/graphs/public/*");
    }

    #[test]
    fn test_acl_schema_round_trip_through_query() {
        check_schema(&AclSchema);
    }

    #[test]
    fn test_legacy_schema_round_trip_through_query() {
        check_schema(&LegacySchema);
    }

    #[test]
    fn test_encoding_is_stable() {
        let entry = &entries()[0];
        assert_eq!(AclSchema.encode(entry), AclSchema.encode(entry));

        let other = &entries()[1];
        let a: Graph = AclSchema.encode(entry).into_iter().collect();
        let b: Graph = AclSchema.encode(other).into_iter().collect();
        // Same principal and pattern, different mode: distinct nodes
        assert!(a.iter().all(|t| !b.contains(t)));
    }

    #[test]
    fn test_decode_skips_malformed_rows() {
        let mut row = Bindings::new();
        assert!(AclSchema.decode(&row).is_none());

        row.insert(GRAPH_VAR.into(), Term::literal("http://example.org/**"));
        assert!(AclSchema.decode(&row).is_none(), "missing mode");

        row.insert(PERMISSION_VAR.into(), iri(ACL_NS, "Control"));
        assert!(AclSchema.decode(&row).is_none(), "unknown mode");

        row.insert(PERMISSION_VAR.into(), iri(ACL_NS, "Write"));
        assert_eq!(AclSchema.decode(&row).unwrap().mode, PermissionMode::Write);

        row.insert(PERMISSION_VAR.into(), Term::literal("read"));
        assert_eq!(LegacySchema.decode(&row).unwrap().mode, PermissionMode::Read);

        row.insert(GRAPH_VAR.into(), Term::blank("b0"));
        assert!(AclSchema.decode(&row).is_none(), "blank graph pattern");
    }

    #[test]
    fn test_schema_kind_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            schema: SchemaKind,
        }
        let parsed: Wrapper = toml::from_str("schema = \"legacy\"").unwrap();
        assert_eq!(parsed.schema, SchemaKind::Legacy);
        assert_eq!(parsed.schema.build().name(), "legacy");
        assert_eq!(SchemaKind::default().build().name(), "acl");
    }
}
