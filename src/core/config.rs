//! Secured store configuration
//!
//! ```toml
//! policy_graph = "https://example.org/graphs/security"
//! own_graph_prefix = "https://example.org/graphs/users/"
//! schema = "acl"
//! cache_capacity = 10000
//! union_default_graph = false
//! policy_document = "policies.json"
//! ```

use crate::core::error::{GuardError, Result};
use crate::core::iam::{SchemaKind, DEFAULT_CACHE_CAPACITY};
use crate::core::validation::GraphIri;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Graph holding the policy statements
    pub policy_graph: GraphIri,

    /// `own_graph_prefix + identity` is the private graph of each user
    pub own_graph_prefix: GraphIri,

    #[serde(default)]
    pub schema: SchemaKind,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Stored in the store context as `union_default_graph`
    #[serde(default)]
    pub union_default_graph: bool,

    /// JSON policy document seeded into the policy graph at assembly;
    /// relative paths resolve against the config file's directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_document: Option<PathBuf>,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl GuardConfig {
    pub fn new(policy_graph: &str, own_graph_prefix: &str) -> Result<Self> {
        Ok(GuardConfig {
            policy_graph: GraphIri::new(policy_graph)?,
            own_graph_prefix: GraphIri::new(own_graph_prefix)?,
            schema: SchemaKind::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            union_default_graph: false,
            policy_document: None,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;

        if let (Some(doc), Some(dir)) = (config.policy_document.as_mut(), path.parent()) {
            if doc.is_relative() {
                let resolved = dir.join(&*doc);
                *doc = resolved;
            }
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: GuardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(GuardError::Config(
                "cache_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_schema(mut self, schema: SchemaKind) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_union_default_graph(mut self, enabled: bool) -> Self {
        self.union_default_graph = enabled;
        self
    }
}
