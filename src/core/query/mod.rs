//! Graph-pattern queries over one graph of a quad store
//!
//! The access-control layer only needs a small slice of a query language:
//! triple patterns with variables, joined and unioned, answered either as
//! rows of bindings (`select`) or as a boolean (`ask`). [`QueryEngine`] is the
//! seam where a full query processor can be plugged in; [`BgpEngine`] answers
//! queries directly through [`QuadStore::find`](crate::core::store::QuadStore::find).

mod engine;

pub use engine::BgpEngine;

use crate::core::error::Result;
use crate::core::model::{GraphName, Term};
use crate::core::store::QuadStore;
use std::collections::BTreeMap;

/// One solution row: variable name -> bound term
pub type Bindings = BTreeMap<String, Term>;

/// Position of a triple pattern: a variable or a constant term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    Var(String),
    Const(Term),
}

impl PatternTerm {
    pub fn var(name: impl Into<String>) -> Self {
        PatternTerm::Var(name.into())
    }

    /// Resolve against a row: constants and bound variables yield a term,
    /// unbound variables yield `None`
    pub fn resolve(&self, row: &Bindings) -> Option<Term> {
        match self {
            PatternTerm::Const(term) => Some(term.clone()),
            PatternTerm::Var(name) => row.get(name).cloned(),
        }
    }
}

impl From<Term> for PatternTerm {
    fn from(term: Term) -> Self {
        PatternTerm::Const(term)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<PatternTerm>,
        predicate: impl Into<PatternTerm>,
        object: impl Into<PatternTerm>,
    ) -> Self {
        TriplePattern {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

/// Graph pattern algebra
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Basic graph pattern: every triple pattern must match
    Bgp(Vec<TriplePattern>),
    Join(Box<Pattern>, Box<Pattern>),
    Union(Box<Pattern>, Box<Pattern>),
}

impl Pattern {
    pub fn bgp(triples: impl IntoIterator<Item = TriplePattern>) -> Self {
        Pattern::Bgp(triples.into_iter().collect())
    }

    pub fn join(self, other: Pattern) -> Self {
        Pattern::Join(Box::new(self), Box::new(other))
    }

    pub fn union(self, other: Pattern) -> Self {
        Pattern::Union(Box::new(self), Box::new(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    /// Variables kept in each returned row
    pub projection: Vec<String>,
    pub pattern: Pattern,
}

impl SelectQuery {
    pub fn new<S: Into<String>>(projection: impl IntoIterator<Item = S>, pattern: Pattern) -> Self {
        SelectQuery {
            projection: projection.into_iter().map(Into::into).collect(),
            pattern,
        }
    }
}

/// Pattern-match query capability over one graph of a store
pub trait QueryEngine: Send + Sync {
    fn select(
        &self,
        store: &dyn QuadStore,
        graph: &GraphName,
        query: &SelectQuery,
    ) -> Result<Vec<Bindings>>;

    fn ask(&self, store: &dyn QuadStore, graph: &GraphName, pattern: &Pattern) -> Result<bool>;
}
