//! Nested-loop evaluation of graph patterns through `find`

use super::{Bindings, Pattern, PatternTerm, QueryEngine, SelectQuery, TriplePattern};
use crate::core::error::Result;
use crate::core::model::{GraphName, Quad, QuadPattern, Term};
use crate::core::store::QuadStore;

/// Query engine evaluating patterns with one `find` per triple pattern and row
#[derive(Debug, Clone, Copy, Default)]
pub struct BgpEngine;

impl BgpEngine {
    pub fn new() -> Self {
        BgpEngine
    }

    fn eval(
        &self,
        store: &dyn QuadStore,
        graph: &GraphName,
        pattern: &Pattern,
        seed: &Bindings,
    ) -> Result<Vec<Bindings>> {
        match pattern {
            Pattern::Bgp(triples) => {
                let mut rows = vec![seed.clone()];
                for triple in triples {
                    let mut next = Vec::new();
                    for row in &rows {
                        Self::extend_row(store, graph, triple, row, &mut next)?;
                    }
                    rows = next;
                    if rows.is_empty() {
                        break;
                    }
                }
                Ok(rows)
            }
            Pattern::Join(left, right) => {
                let mut rows = Vec::new();
                for row in self.eval(store, graph, left, seed)? {
                    rows.extend(self.eval(store, graph, right, &row)?);
                }
                Ok(rows)
            }
            Pattern::Union(left, right) => {
                let mut rows = self.eval(store, graph, left, seed)?;
                rows.extend(self.eval(store, graph, right, seed)?);
                Ok(rows)
            }
        }
    }

    /// Push every extension of `row` that satisfies `triple`
    fn extend_row(
        store: &dyn QuadStore,
        graph: &GraphName,
        triple: &TriplePattern,
        row: &Bindings,
        out: &mut Vec<Bindings>,
    ) -> Result<()> {
        let mut lookup = QuadPattern::in_graph(graph);
        lookup.subject = triple.subject.resolve(row);
        lookup.predicate = triple.predicate.resolve(row);
        lookup.object = triple.object.resolve(row);

        for quad in store.find(&lookup)? {
            if let Some(extended) = Self::bind(triple, row, &quad?) {
                out.push(extended);
            }
        }
        Ok(())
    }

    /// Bind the variables of `triple` to the terms of `quad`; `None` when the
    /// same variable would take two different values
    fn bind(triple: &TriplePattern, row: &Bindings, quad: &Quad) -> Option<Bindings> {
        let mut extended = row.clone();
        let slots: [(&PatternTerm, &Term); 3] = [
            (&triple.subject, &quad.subject),
            (&triple.predicate, &quad.predicate),
            (&triple.object, &quad.object),
        ];

        for (slot, term) in slots {
            if let PatternTerm::Var(name) = slot {
                match extended.get(name) {
                    Some(bound) if bound != term => return None,
                    Some(_) => {}
                    None => {
                        extended.insert(name.clone(), term.clone());
                    }
                }
            }
        }
        Some(extended)
    }
}

impl QueryEngine for BgpEngine {
    fn select(
        &self,
        store: &dyn QuadStore,
        graph: &GraphName,
        query: &SelectQuery,
    ) -> Result<Vec<Bindings>> {
        let rows = self.eval(store, graph, &query.pattern, &Bindings::new())?;
        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .filter(|(name, _)| query.projection.contains(name))
                    .collect()
            })
            .collect())
    }

    fn ask(&self, store: &dyn QuadStore, graph: &GraphName, pattern: &Pattern) -> Result<bool> {
        Ok(!self.eval(store, graph, pattern, &Bindings::new())?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;

    const G: &str = "http://example.org/people";

    fn iri(local: &str) -> Term {
        Term::iri(format!("http://example.org/{}", local))
    }

    fn store() -> MemoryStore {
        let g = GraphName::named(G);
        MemoryStore::with_quads(vec![
            Quad::new(g.clone(), iri("alice"), iri("knows"), iri("bob")),
            Quad::new(g.clone(), iri("bob"), iri("knows"), iri("carol")),
            Quad::new(g.clone(), iri("alice"), iri("name"), Term::literal("Alice")),
            Quad::new(g.clone(), iri("bob"), iri("name"), Term::literal("Bob")),
            Quad::new(g.clone(), iri("carol"), iri("knows"), iri("carol")),
            // Same shape in another graph must never leak into results
            Quad::new(
                GraphName::named("http://example.org/other"),
                iri("dave"),
                iri("knows"),
                iri("erin"),
            ),
        ])
    }

    #[test]
    fn test_bgp_join_through_shared_variable() {
        let store = store();
        let query = SelectQuery::new(
            ["name"],
            Pattern::bgp([
                TriplePattern::new(PatternTerm::var("x"), iri("knows"), iri("carol")),
                TriplePattern::new(PatternTerm::var("x"), iri("name"), PatternTerm::var("name")),
            ]),
        );

        let rows = BgpEngine::new()
            .select(&store, &GraphName::named(G), &query)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Term::literal("Bob")));
        assert!(rows[0].get("x").is_none(), "projection drops ?x");
    }

    #[test]
    fn test_union_then_join() {
        let store = store();
        let pattern = Pattern::bgp([TriplePattern::new(
            PatternTerm::var("p"),
            iri("name"),
            Term::literal("Alice"),
        )])
        .union(Pattern::bgp([TriplePattern::new(
            PatternTerm::var("p"),
            iri("name"),
            Term::literal("Bob"),
        )]))
        .join(Pattern::bgp([TriplePattern::new(
            PatternTerm::var("p"),
            iri("knows"),
            PatternTerm::var("friend"),
        )]));

        let rows = BgpEngine::new()
            .select(&store, &GraphName::named(G), &SelectQuery::new(["friend"], pattern))
            .unwrap();
        let mut friends: Vec<_> = rows.iter().filter_map(|r| r.get("friend")).collect();
        friends.sort();
        assert_eq!(friends, vec![&iri("bob"), &iri("carol")]);
    }

    #[test]
    fn test_repeated_variable_must_agree() {
        let store = store();
        let pattern = Pattern::bgp([TriplePattern::new(
            PatternTerm::var("x"),
            iri("knows"),
            PatternTerm::var("x"),
        )]);

        let rows = BgpEngine::new()
            .select(&store, &GraphName::named(G), &SelectQuery::new(["x"], pattern))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("x"), Some(&iri("carol")));
    }

    #[test]
    fn test_ask() {
        let store = store();
        let engine = BgpEngine::new();
        let hit = Pattern::bgp([TriplePattern::new(iri("dave"), iri("knows"), iri("erin"))]);

        assert!(engine
            .ask(&store, &GraphName::named("http://example.org/other"), &hit)
            .unwrap());
        assert!(!engine.ask(&store, &GraphName::named(G), &hit).unwrap());
    }
}
