//! Tests for layered config handles.

use super::*;
use crate::formats::{JsonCodec, PropertiesCodec};
use pretty_assertions::assert_eq;
use serde_json::json;

fn source(value: serde_json::Value) -> Source {
    Source::from_tree("test", TreeNode::from(value))
}

struct ServerSpec {
    spec: Spec,
    host: Item<String>,
    port: Item<u16>,
    timeout: Item<u64>,
}

fn server_spec() -> ServerSpec {
    let mut spec = Spec::new("server");
    let host = spec.required::<String>("host");
    let port = spec.optional("port", 8080u16);
    let timeout = spec.optional("timeout", 30u64);
    ServerSpec {
        spec,
        host,
        port,
        timeout,
    }
}

/// Later layers win per path; base-only paths survive.
#[test]
fn later_layers_override_earlier_ones() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .build()
        .expect("config")
        .with_source(source(json!({ "server": { "host": "a", "port": 1 } })))
        .expect("first layer")
        .with_source(source(json!({ "server": { "port": 2 } })))
        .expect("second layer");

    assert_eq!(config.get(&server.host).expect("host"), "a");
    assert_eq!(config.get(&server.port).expect("port"), 2);
    assert_eq!(config.get(&server.timeout).expect("timeout"), 30);
    assert_eq!(config.layers().len(), 2);
}

/// Loading forks; the parent never sees the child's layers.
#[test]
fn loads_fork_instead_of_mutating() {
    let server = server_spec();
    let base = Config::builder()
        .spec(server.spec.clone())
        .build()
        .expect("config")
        .with_source(source(json!({ "server": { "host": "base" } })))
        .expect("base layer");
    let child = base
        .with_source(source(json!({ "server": { "host": "child" } })))
        .expect("child layer");

    assert_eq!(base.get(&server.host).expect("base host"), "base");
    assert_eq!(child.get(&server.host).expect("child host"), "child");
    assert!(!base.ptr_eq(&child));
    assert!(base.ptr_eq(&base.clone()));
}

/// Duplicate and nested item paths fail at construction.
#[test]
fn builder_rejects_conflicting_specs() {
    let server = server_spec();
    let err = Config::builder()
        .spec(server.spec.clone())
        .spec(server.spec.clone())
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateItem { .. }));

    let mut nested = Spec::new("server.host");
    nested.required::<String>("name");
    let config = Config::builder()
        .spec(server.spec)
        .build()
        .expect("config");
    let err = config.with_spec(&nested).unwrap_err();
    assert!(matches!(err, ConfigError::PathConflict { .. }));
}

/// Missing required items fail only when read, so later layers can fill them.
#[test]
fn missing_required_item_is_reported_on_read() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .build()
        .expect("config");

    let err = config.get(&server.host).unwrap_err();
    match err {
        ConfigError::MissingRequiredItem { path } => assert_eq!(path.to_string(), "server.host"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(config.get_optional(&server.host).expect("optional"), None);

    let filled = config
        .with_source(source(json!({ "server": { "host": "late" } })))
        .expect("layer");
    assert_eq!(filled.get(&server.host).expect("host"), "late");
}

/// With fail-on-unknown-path an undeclared key aborts the load.
#[test]
fn unknown_paths_fail_the_load_when_enabled() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .enable(Feature::FailOnUnknownPath)
        .build()
        .expect("config")
        .with_source(source(json!({ "server": { "host": "kept" } })))
        .expect("known layer");

    let err = config
        .with_source(source(json!({ "server": { "host": "new", "hots": "typo" } })))
        .unwrap_err();
    match err {
        ConfigError::UnknownPath { path, origin } => {
            assert_eq!(path.to_string(), "server.hots");
            assert_eq!(origin, "test");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(config.get(&server.host).expect("host"), "kept");

    let lenient = config.disable(Feature::FailOnUnknownPath);
    let loaded = lenient
        .with_source(source(json!({ "extra": true })))
        .expect("unknown kept");
    assert_eq!(loaded.get_node(&KeyPath::parse("extra")), Some(TreeNode::from(true)));
    assert!(config.is_enabled(Feature::FailOnUnknownPath));
}

/// A scalar where a declared subtree belongs is rejected, not silently
/// swallowed.
#[test]
fn scalars_over_declared_subtrees_fail_the_load() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .enable(Feature::FailOnUnknownPath)
        .build()
        .expect("config");

    let err = config
        .with_source(source(json!({ "server": "oops" })))
        .unwrap_err();
    match err {
        ConfigError::UnknownPath { path, .. } => assert_eq!(path.to_string(), "server"),
        other => panic!("unexpected error: {other}"),
    }
    config
        .with_source(source(json!({ "server": {} })))
        .expect("empty placeholder");
}

/// Features are inherited by forks and can be overridden per load.
#[test]
fn loader_overrides_do_not_leak_into_the_config() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .enable(Feature::FailOnUnknownPath)
        .build()
        .expect("config");
    let loaded = config
        .from(Arc::new(PropertiesCodec))
        .disable(Feature::FailOnUnknownPath)
        .string("server.host = h\nother = 1\n")
        .expect("lenient load");
    assert!(loaded.is_enabled(Feature::FailOnUnknownPath));
    assert_eq!(loaded.get(&server.host).expect("host"), "h");
}

/// Keys differing only in case bind when the feature is on.
#[test]
fn keys_can_load_case_insensitively() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .enable(Feature::LoadKeysCaseInsensitively)
        .build()
        .expect("config")
        .with_source(source(json!({ "SERVER": { "Host": "upper" } })))
        .expect("layer");
    assert_eq!(config.get(&server.host).expect("host"), "upper");
}

/// References resolve against the layer and the layers below it.
#[test]
fn substitution_reads_lower_layers() {
    let mut spec = Spec::new("app");
    let url = spec.required::<String>("url");
    let config = Config::builder()
        .spec(spec)
        .build()
        .expect("config")
        .with_source(source(json!({ "app": { "host": "example.org" } })))
        .expect("base")
        .with_source(source(json!({ "app": { "url": "https://${app.host}/" } })))
        .expect("substituted");
    assert_eq!(config.get(&url).expect("url"), "https://example.org/");

    let raw = config
        .disable(Feature::SubstituteSourceBeforeLoaded)
        .with_source(source(json!({ "app": { "url": "${app.host}" } })))
        .expect("raw");
    assert_eq!(raw.get(&url).expect("url"), "${app.host}");
}

/// Lazy items derive from other items unless a layer sets them.
#[test]
fn lazy_items_derive_values() {
    let mut spec = Spec::new("db");
    let host = spec.required::<String>("host");
    let derived_host = host.clone();
    let url = spec.lazy("url", move |snapshot| {
        Ok(format!("postgres://{}/app", snapshot.get(&derived_host)?))
    });
    let config = Config::builder().spec(spec).build().expect("config");

    let err = config.get(&url).unwrap_err();
    assert!(matches!(err, ConfigError::MissingRequiredItem { .. }));

    let config = config
        .with_source(source(json!({ "db": { "host": "db1" } })))
        .expect("layer");
    assert_eq!(config.get(&url).expect("derived"), "postgres://db1/app");

    let config = config
        .with_value(&url, "sqlite://mem".to_string())
        .expect("explicit");
    assert_eq!(config.get(&url).expect("explicit"), "sqlite://mem");
}

/// Lazy items that end up reading themselves fail instead of recursing.
#[test]
fn cyclic_lazy_items_fail() {
    let slot: Arc<Mutex<Option<Item<String>>>> = Arc::default();
    let peer = Arc::clone(&slot);
    let mut spec = Spec::new("cycle");
    let first = spec.lazy("first", move |snapshot| match peer.lock().clone() {
        Some(second) => snapshot.get(&second),
        None => Ok(String::new()),
    });
    let first_ref = first.clone();
    let second = spec.lazy("second", move |snapshot| snapshot.get(&first_ref));
    *slot.lock() = Some(second);

    let config = Config::builder().spec(spec).build().expect("config");
    match config.get(&first).unwrap_err() {
        ConfigError::LazyCycle { path } => assert_eq!(path.to_string(), "cycle.first"),
        other => panic!("unexpected error: {other}"),
    }

    let config = config
        .with_source(source(json!({ "cycle": { "second": "set" } })))
        .expect("layer");
    assert_eq!(config.get(&first).expect("breaks the cycle"), "set");
}

/// `Option` items bind null or absence to `None`.
#[test]
fn option_items_default_to_none() {
    let mut spec = Spec::new("");
    let proxy = spec.required::<Option<String>>("proxy");
    let config = Config::builder().spec(spec).build().expect("config");
    assert_eq!(config.get(&proxy).expect("absent"), None);

    let config = config
        .with_source(source(json!({ "proxy": null })))
        .expect("null");
    assert_eq!(config.get(&proxy).expect("null"), None);

    let config = config
        .with_source(source(json!({ "proxy": "http://proxy" })))
        .expect("set");
    assert_eq!(config.get(&proxy).expect("set"), Some("http://proxy".into()));
}

/// Items that were never added cannot be read or set.
#[test]
fn unregistered_items_are_rejected() {
    let config = Config::default();
    let stray = Item::<String>::required("stray");
    assert!(matches!(
        config.get(&stray).unwrap_err(),
        ConfigError::NoSuchItem { .. }
    ));
    assert!(matches!(
        config.with_value(&stray, "x".into()).unwrap_err(),
        ConfigError::NoSuchItem { .. }
    ));
    assert!(!config.contains(stray.path()));
}

/// A pinned snapshot is unaffected by later loads.
#[test]
fn snapshots_are_stable() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .build()
        .expect("config")
        .with_source(source(json!({ "server": { "host": "one" } })))
        .expect("layer");
    let snapshot = config.snapshot();
    let _later = config
        .with_source(source(json!({ "server": { "host": "two" } })))
        .expect("later");
    assert_eq!(snapshot.get(&server.host).expect("host"), "one");
    assert_eq!(snapshot.get(&server.host).expect("again"), "one");
    assert!(snapshot.is_set(&server.host));
    assert!(!snapshot.is_set(&server.port));
}

/// Exported trees include defaults and parse back to the same tree.
#[test]
fn export_includes_defaults_and_round_trips() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .build()
        .expect("config")
        .with_source(source(json!({ "server": { "host": "h" }, "extra": [1, 2] })))
        .expect("layer");

    let tree = config.to_tree().expect("tree");
    assert_eq!(
        tree.to_json(),
        json!({ "server": { "host": "h", "port": 8080, "timeout": 30 }, "extra": [1, 2] })
    );

    let bytes = config.export(&JsonCodec).expect("export");
    let reloaded = Config::builder()
        .spec(server.spec.clone())
        .build()
        .expect("config")
        .from(Arc::new(JsonCodec))
        .bytes(&bytes)
        .expect("reload");
    assert_eq!(reloaded.tree(), tree);
}

/// Loading the same content twice equals loading it once.
#[test]
fn identical_loads_are_idempotent() {
    let server = server_spec();
    let config = Config::builder()
        .spec(server.spec.clone())
        .build()
        .expect("config");
    let content = "server.host = h\nserver.port = 81\n";
    let once = config
        .from(Arc::new(PropertiesCodec))
        .string(content)
        .expect("once");
    let twice = once
        .from(Arc::new(PropertiesCodec))
        .string(content)
        .expect("twice");
    assert_eq!(once.tree(), twice.tree());
    assert_eq!(twice.get(&server.port).expect("port"), 81);
}
