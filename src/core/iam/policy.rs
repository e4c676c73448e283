//! Access-control vocabulary
//!
//! A policy entry says "principal P may perform mode M on graphs matching G".
//! Entries live as statements in the policy graph; [`PolicyDocument`] is the
//! JSON form used to seed that graph when a secured store is assembled.

use crate::core::error::{GuardError, Result};
use crate::core::iam::PatternMatcher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action requested against a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Read, Action::Create, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission mode stored in policy data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PermissionMode {
    Read,
    Create,
    Update,
    Delete,
    /// Create, Update and Delete
    Write,
}

impl PermissionMode {
    /// Whether holding this mode permits `action`
    pub fn implies(&self, action: Action) -> bool {
        match self {
            PermissionMode::Read => action == Action::Read,
            PermissionMode::Create => action == Action::Create,
            PermissionMode::Update => action == Action::Update,
            PermissionMode::Delete => action == Action::Delete,
            PermissionMode::Write => matches!(
                action,
                Action::Create | Action::Update | Action::Delete
            ),
        }
    }

    /// Parse a mode name, ignoring case (`"Write"`, `"READ"`, `"delete"`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "READ" => Some(PermissionMode::Read),
            "CREATE" => Some(PermissionMode::Create),
            "UPDATE" => Some(PermissionMode::Update),
            "DELETE" => Some(PermissionMode::Delete),
            "WRITE" => Some(PermissionMode::Write),
            _ => None,
        }
    }

    /// Capitalised name as used for mode IRIs (`Read`, `Write`, ...)
    pub fn local_name(&self) -> &'static str {
        match self {
            PermissionMode::Read => "Read",
            PermissionMode::Create => "Create",
            PermissionMode::Update => "Update",
            PermissionMode::Delete => "Delete",
            PermissionMode::Write => "Write",
        }
    }
}

impl TryFrom<String> for PermissionMode {
    type Error = GuardError;

    fn try_from(value: String) -> Result<Self> {
        PermissionMode::from_name(&value)
            .ok_or_else(|| GuardError::Config(format!("unknown permission mode '{}'", value)))
    }
}

impl From<PermissionMode> for String {
    fn from(mode: PermissionMode) -> Self {
        mode.local_name().to_ascii_lowercase()
    }
}

/// Who a policy entry applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PrincipalMatcher {
    /// One identity
    Exact(String),
    /// Every authenticated principal; written as `*`
    AnyAuthenticated,
}

impl PrincipalMatcher {
    pub fn matches(&self, identity: &str) -> bool {
        match self {
            PrincipalMatcher::Exact(expected) => expected == identity,
            PrincipalMatcher::AnyAuthenticated => true,
        }
    }
}

impl From<String> for PrincipalMatcher {
    fn from(value: String) -> Self {
        if value == "*" {
            PrincipalMatcher::AnyAuthenticated
        } else {
            PrincipalMatcher::Exact(value)
        }
    }
}

impl From<PrincipalMatcher> for String {
    fn from(matcher: PrincipalMatcher) -> Self {
        match matcher {
            PrincipalMatcher::Exact(identity) => identity,
            PrincipalMatcher::AnyAuthenticated => "*".to_string(),
        }
    }
}

impl fmt::Display for PrincipalMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalMatcher::Exact(identity) => f.write_str(identity),
            PrincipalMatcher::AnyAuthenticated => f.write_str("*"),
        }
    }
}

/// "principal may perform mode on graphs matching pattern"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub principal: PrincipalMatcher,
    /// Path-glob pattern over graph identifiers
    pub graph: String,
    pub mode: PermissionMode,
}

impl PolicyEntry {
    pub fn new(principal: PrincipalMatcher, graph: impl Into<String>, mode: PermissionMode) -> Self {
        PolicyEntry {
            principal,
            graph: graph.into(),
            mode,
        }
    }

    pub fn for_identity(
        identity: impl Into<String>,
        graph: impl Into<String>,
        mode: PermissionMode,
    ) -> Self {
        Self::new(PrincipalMatcher::Exact(identity.into()), graph, mode)
    }

    pub fn for_any_authenticated(graph: impl Into<String>, mode: PermissionMode) -> Self {
        Self::new(PrincipalMatcher::AnyAuthenticated, graph, mode)
    }

    /// Whether this entry lets `identity` perform `action` on `graph`
    pub fn grants(&self, identity: &str, action: Action, graph: &str) -> bool {
        self.principal.matches(identity)
            && self.mode.implies(action)
            && PatternMatcher::matches(&self.graph, graph)
    }
}

/// Policy entries in their JSON seed form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub entries: Vec<PolicyEntry>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: PolicyEntry) {
        self.entries.push(entry);
    }

    /// Parse a document from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let document: PolicyDocument = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject entries that could never match anything
    pub fn validate(&self) -> Result<()> {
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.graph.trim().is_empty() {
                return Err(GuardError::Config(format!(
                    "policy entry {} has an empty graph pattern",
                    i
                )));
            }
            if let PrincipalMatcher::Exact(identity) = &entry.principal {
                if identity.trim().is_empty() {
                    return Err(GuardError::Config(format!(
                        "policy entry {} has an empty principal",
                        i
                    )));
                }
            }
        }
        Ok(())
    }
}
