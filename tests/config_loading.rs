//! Loading a secured store from TOML configuration on disk

use quadguard::iam::{Principal, SchemaKind, StaticPrincipal};
use quadguard::{
    Action, GraphName, GuardConfig, GuardError, MemoryStore, QuadStore, SecuredStoreBuilder,
    UNION_DEFAULT_GRAPH,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const POLICY_JSON: &str = r#"{
  "entries": [
    { "principal": "alice", "graph": "https://example.org/graphs/team/**", "mode": "Write" },
    { "principal": "alice", "graph": "https://example.org/graphs/team/**", "mode": "read" },
    { "principal": "*", "graph": "https://example.org/public/**", "mode": "read" }
  ]
}"#;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("quadguard.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_relative_policy_document_resolves_next_to_config() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("policies.json"), POLICY_JSON)?;
    let path = write_config(
        &dir,
        r#"
policy_graph = "https://example.org/graphs/security"
own_graph_prefix = "https://example.org/graphs/users/"
schema = "legacy"
cache_capacity = 128
union_default_graph = true
policy_document = "policies.json"
"#,
    );

    let config = GuardConfig::from_file(&path)?;
    assert_eq!(config.schema, SchemaKind::Legacy);
    assert_eq!(config.policy_document.as_deref(), Some(dir.path().join("policies.json").as_path()));

    let inner = Arc::new(MemoryStore::new());
    let store = SecuredStoreBuilder::new(inner.clone())
        .config(config)
        .principals(Arc::new(StaticPrincipal::new(Principal::authenticated("alice"))))
        .build()?;

    assert!(inner.context().is_true(UNION_DEFAULT_GRAPH));
    assert!(inner.contains_graph(&GraphName::named("https://example.org/graphs/security"))?);

    let team = GraphName::named("https://example.org/graphs/team/red");
    assert!(store.is_allowed(Action::Create, &team)?);
    assert!(store.is_allowed(Action::Read, &team)?);
    assert!(store.is_allowed(Action::Read, &GraphName::named("https://example.org/public/a"))?);
    assert!(!store.is_allowed(Action::Create, &GraphName::named("https://example.org/public/a"))?);
    Ok(())
}

#[test]
fn test_missing_policy_document_fails_assembly() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        r#"
policy_graph = "https://example.org/graphs/security"
own_graph_prefix = "https://example.org/graphs/users/"
policy_document = "absent.json"
"#,
    );

    let config = GuardConfig::from_file(&path)?;
    let result = SecuredStoreBuilder::new(Arc::new(MemoryStore::new()))
        .config(config)
        .build();
    assert!(matches!(result, Err(GuardError::Io(_))));
    Ok(())
}

#[test]
fn test_malformed_policy_document_fails_assembly() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("policies.json"), r#"{ "entries": [ { "principal": "alice" } ] }"#)?;
    let path = write_config(
        &dir,
        r#"
policy_graph = "https://example.org/graphs/security"
own_graph_prefix = "https://example.org/graphs/users/"
policy_document = "policies.json"
"#,
    );

    let result = SecuredStoreBuilder::new(Arc::new(MemoryStore::new()))
        .config(GuardConfig::from_file(&path)?)
        .build();
    assert!(matches!(result, Err(GuardError::Serialization(_))));
    Ok(())
}

#[test]
fn test_invalid_config_files() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    let missing_field = write_config(&dir, r#"policy_graph = "https://example.org/graphs/security""#);
    assert!(matches!(GuardConfig::from_file(&missing_field), Err(GuardError::Toml(_))));

    let bad_iri = write_config(
        &dir,
        r#"
policy_graph = "https://example.org/graphs/security"
own_graph_prefix = "not an iri"
"#,
    );
    assert!(GuardConfig::from_file(&bad_iri).is_err());

    assert!(matches!(
        GuardConfig::from_file(&dir.path().join("nope.toml")),
        Err(GuardError::Io(_))
    ));
    Ok(())
}
