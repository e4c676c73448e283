//! Validation for graph identifiers coming from configuration
//!
//! Policy-graph names and the own-graph prefix are compared textually against
//! graph IRIs, so they must be absolute IRIs: a bad value would silently
//! disable the own-graph rule or point the evaluator at an empty graph.

use crate::core::error::{GuardError, Result};
use crate::core::model::GraphName;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Validated absolute IRI
///
/// # Rules
/// - Starts with a scheme (`[A-Za-z][A-Za-z0-9+.-]*:`) followed by at least
///   one character
/// - No whitespace, no `<`, `>`, `"`, `{`, `}`, `|`, `\`, `^` or backtick
/// - Length: 1-4096 characters
///
/// # Examples
///
/// Valid:
/// - "https://example.org/graphs/security"
/// - "urn:example:policy"
///
/// Invalid:
/// - "graphs/security" (relative)
/// - "https://example.org/my graph" (whitespace)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GraphIri(String);

impl GraphIri {
    const PATTERN: &'static str = r#"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s<>"{}|\\^`]+$"#;

    const MAX_LENGTH: usize = 4096;

    /// Create a new validated IRI
    ///
    /// # Examples
    ///
    /// ```
    /// use quadguard::GraphIri;
    ///
    /// let iri = GraphIri::new("https://example.org/graphs/security").unwrap();
    /// assert_eq!(iri.as_str(), "https://example.org/graphs/security");
    ///
    /// assert!(GraphIri::new("graphs/security").is_err());
    /// assert!(GraphIri::new("https://example.org/a b").is_err());
    /// ```
    pub fn new(iri: impl Into<String>) -> Result<Self> {
        let iri = iri.into();
        Self::validate_iri(&iri)?;
        Ok(GraphIri(iri))
    }

    fn pattern() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(Self::PATTERN).expect("IRI pattern is a valid regex"))
    }

    fn validate_iri(iri: &str) -> Result<()> {
        if iri.is_empty() {
            return Err(GuardError::InvalidIri("IRI cannot be empty".to_string()));
        }

        if iri.len() > Self::MAX_LENGTH {
            return Err(GuardError::InvalidIri(format!(
                "IRI too long (max {} characters)",
                Self::MAX_LENGTH
            )));
        }

        if !Self::pattern().is_match(iri) {
            return Err(GuardError::InvalidIri(iri.to_string()));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Named graph with this IRI
    pub fn to_graph_name(&self) -> GraphName {
        GraphName::named(self.0.clone())
    }
}

impl TryFrom<String> for GraphIri {
    type Error = GuardError;

    fn try_from(value: String) -> Result<Self> {
        GraphIri::new(value)
    }
}

impl From<GraphIri> for String {
    fn from(iri: GraphIri) -> Self {
        iri.0
    }
}

impl AsRef<str> for GraphIri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GraphIri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
