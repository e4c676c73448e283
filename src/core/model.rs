//! Quad data model
//!
//! Terms, triples and quads as stored in the quad store, plus the two ways a
//! caller addresses graphs:
//! - [`GraphName`] names one concrete graph (the default graph or a named graph)
//! - [`GraphSelector`] additionally allows the "any graph" wildcard used by bulk
//!   operations such as `find` and `delete_any`

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Name under which the default graph is addressed by access-control rules
pub const DEFAULT_GRAPH_SECURITY_NAME: &str = "DEFAULT";

/// Literal value with optional language tag or datatype IRI
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

/// RDF term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Term::Blank(label.into())
    }

    /// Plain literal (no language tag, no datatype)
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal(Literal {
            value: value.into(),
            language: None,
            datatype: None,
        })
    }

    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal(Literal {
            value: value.into(),
            language: Some(language.into()),
            datatype: None,
        })
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Lexical form of a literal
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Term::Literal(lit) => Some(&lit.value),
            _ => None,
        }
    }

    /// Local name of an IRI: the part after the last `#` or `/`
    pub fn local_name(&self) -> Option<&str> {
        let iri = self.as_iri()?;
        let start = iri.rfind(['#', '/']).map(|i| i + 1).unwrap_or(0);
        let name = &iri[start..];
        (!name.is_empty()).then_some(name)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Blank(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => {
                write!(f, "\"{}\"", lit.value)?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{}", lang)
                } else if let Some(dt) = &lit.datatype {
                    write!(f, "^^<{}>", dt)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Concrete graph: the unnamed default graph or a named graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GraphName {
    Default,
    Named(String),
}

impl GraphName {
    pub fn named(iri: impl Into<String>) -> Self {
        GraphName::Named(iri.into())
    }

    pub fn is_default(&self) -> bool {
        matches!(self, GraphName::Default)
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            GraphName::Named(iri) => Some(iri),
            GraphName::Default => None,
        }
    }

    /// Identifier used when matching this graph against policy patterns
    pub fn security_name(&self) -> &str {
        match self {
            GraphName::Default => DEFAULT_GRAPH_SECURITY_NAME,
            GraphName::Named(iri) => iri,
        }
    }
}

impl fmt::Display for GraphName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphName::Default => f.write_str("<default>"),
            GraphName::Named(iri) => write!(f, "<{}>", iri),
        }
    }
}

/// Graph position of a quad pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphSelector {
    Default,
    /// Every graph, default graph included
    Any,
    Named(String),
}

impl GraphSelector {
    pub fn matches(&self, graph: &GraphName) -> bool {
        match (self, graph) {
            (GraphSelector::Any, _) => true,
            (GraphSelector::Default, GraphName::Default) => true,
            (GraphSelector::Named(a), GraphName::Named(b)) => a == b,
            _ => false,
        }
    }
}

impl From<GraphName> for GraphSelector {
    fn from(name: GraphName) -> Self {
        match name {
            GraphName::Default => GraphSelector::Default,
            GraphName::Named(iri) => GraphSelector::Named(iri),
        }
    }
}

impl From<&GraphName> for GraphSelector {
    fn from(name: &GraphName) -> Self {
        name.clone().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Triple {
            subject,
            predicate,
            object,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quad {
    pub graph: GraphName,
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Quad {
    pub fn new(graph: GraphName, subject: Term, predicate: Term, object: Term) -> Self {
        Quad {
            graph,
            subject,
            predicate,
            object,
        }
    }

    pub fn from_triple(graph: GraphName, triple: Triple) -> Self {
        Quad::new(graph, triple.subject, triple.predicate, triple.object)
    }

    pub fn triple(&self) -> Triple {
        Triple::new(
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
        )
    }
}

/// Quad pattern; `None` positions match anything
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuadPattern {
    pub graph: GraphSelector,
    pub subject: Option<Term>,
    pub predicate: Option<Term>,
    pub object: Option<Term>,
}

impl QuadPattern {
    /// Pattern matching every quad in every graph
    pub fn any() -> Self {
        Self::in_graph(GraphSelector::Any)
    }

    pub fn in_graph(graph: impl Into<GraphSelector>) -> Self {
        QuadPattern {
            graph: graph.into(),
            subject: None,
            predicate: None,
            object: None,
        }
    }

    pub fn subject(mut self, term: Term) -> Self {
        self.subject = Some(term);
        self
    }

    pub fn predicate(mut self, term: Term) -> Self {
        self.predicate = Some(term);
        self
    }

    pub fn object(mut self, term: Term) -> Self {
        self.object = Some(term);
        self
    }

    /// Whether the subject/predicate/object positions accept `triple`
    pub fn matches_triple(&self, triple: &Triple) -> bool {
        fn accepts(slot: &Option<Term>, term: &Term) -> bool {
            slot.as_ref().map_or(true, |t| t == term)
        }

        accepts(&self.subject, &triple.subject)
            && accepts(&self.predicate, &triple.predicate)
            && accepts(&self.object, &triple.object)
    }

    pub fn matches(&self, quad: &Quad) -> bool {
        self.graph.matches(&quad.graph)
            && self.subject.as_ref().map_or(true, |t| *t == quad.subject)
            && self.predicate.as_ref().map_or(true, |t| *t == quad.predicate)
            && self.object.as_ref().map_or(true, |t| *t == quad.object)
    }
}

impl From<&Quad> for QuadPattern {
    fn from(quad: &Quad) -> Self {
        QuadPattern {
            graph: GraphSelector::from(&quad.graph),
            subject: Some(quad.subject.clone()),
            predicate: Some(quad.predicate.clone()),
            object: Some(quad.object.clone()),
        }
    }
}

/// Materialized view of one graph's triples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    /// Empty graph, also what a caller sees for a graph it may not read
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Graph {
            triples: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Graph {
    type Item = Triple;
    type IntoIter = std::collections::btree_set::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}
