//! End-to-end loading scenarios against the public API.

use cascade_rs_core::{
    Config, ConfigError, ConfigValue, Feature, Field, Item, JsonCodec, LoaderOptions,
    ManualScheduler, PropertiesCodec, ResourceRoots, Source, Spec, TokioScheduler,
    TypeDescriptor, WatchOptions, WatchState,
};
use cascade_rs_test_utils::TempSourceDir;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn resources() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources")
}

fn provider_config() -> (Config, Item<String>) {
    let mut spec = Spec::new("");
    let kind = spec.required::<String>("type");
    let config = Config::builder()
        .spec(spec)
        .loader_options(
            LoaderOptions::new().with_resource_roots(ResourceRoots::new().with_root(resources())),
        )
        .build()
        .expect("config");
    (config, kind)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ServerConfig {
    host: String,
    port: u16,
    #[serde(default)]
    tags: Vec<String>,
}

impl ConfigValue for ServerConfig {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::nested([
            Field::of::<String>("host"),
            Field::of::<u16>("port"),
            Field::optional("tags", Vec::<String>::descriptor()),
        ])
    }
}

/// A reader loads like any other source.
#[test]
fn load_from_reader() {
    let (config, kind) = provider_config();
    let loaded = config
        .from(Arc::new(PropertiesCodec))
        .reader(Cursor::new("type = reader"))
        .expect("reader");
    assert_eq!(loaded.get(&kind).expect("type"), "reader");
}

/// Only the selected byte window is parsed.
#[test]
fn load_from_byte_slice() {
    let (config, kind) = provider_config();
    let loaded = config
        .from(Arc::new(PropertiesCodec))
        .bytes_slice(b"|type = slice|", 1, 12)
        .expect("slice");
    assert_eq!(loaded.get(&kind).expect("type"), "slice");
}

/// Resources come from the test resource root.
#[test]
fn load_from_resource() {
    let (config, kind) = provider_config();
    let loaded = config
        .from(Arc::new(PropertiesCodec))
        .resource("source/provider.properties")
        .expect("resource");
    assert_eq!(loaded.get(&kind).expect("type"), "resource");
    assert_eq!(
        loaded.layers()[0].description(),
        "resource(source/provider.properties)"
    );
}

/// A missing resource fails unless optional sources are enabled.
#[test]
fn missing_resource_is_reported_or_skipped() {
    let (config, kind) = provider_config();
    let err = config
        .from(Arc::new(PropertiesCodec))
        .resource("source/no-provider.properties")
        .unwrap_err();
    assert!(matches!(err, ConfigError::SourceNotFound { .. }));

    let loaded = config
        .enable(Feature::OptionalSourceOnNotFound)
        .from(Arc::new(PropertiesCodec))
        .resource("source/no-provider.properties")
        .expect("optional");
    assert!(matches!(
        loaded.get(&kind).unwrap_err(),
        ConfigError::MissingRequiredItem { .. }
    ));
}

/// The handle returned by `watch_file` reflects later file contents.
#[test]
fn watch_file_updates_the_returned_handle() {
    let (config, kind) = provider_config();
    let dir = TempSourceDir::new();
    let path = dir.write("provider.properties", "type = originalValue");
    let scheduler = ManualScheduler::new();

    let watched = config
        .from(Arc::new(PropertiesCodec))
        .watch_file(
            &path,
            WatchOptions::new().with_scheduler(Arc::new(scheduler.clone())),
        )
        .expect("watch");
    assert_eq!(watched.get(&kind).expect("initial"), "originalValue");

    dir.write("provider.properties", "type = newValue");
    scheduler.run_pending();
    assert_eq!(watched.get(&kind).expect("reloaded"), "newValue");

    let handle = watched.watches().remove(0);
    handle.cancel();
    assert_eq!(handle.state(), WatchState::Stopped);
}

/// Reloads driven by a tokio runtime.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watch_file_on_tokio_runtime() {
    let (config, kind) = provider_config();
    let dir = TempSourceDir::new();
    let path = dir.write("provider.properties", "type = originalValue");
    let scheduler = TokioScheduler::current().expect("runtime");

    let watched = config
        .from(Arc::new(PropertiesCodec))
        .watch_file(
            &path,
            WatchOptions::new()
                .with_scheduler(Arc::new(scheduler))
                .with_interval(Duration::from_millis(20)),
        )
        .expect("watch");
    dir.write("provider.properties", "type = newValue");

    let mut reloaded = false;
    for _ in 0..250 {
        if watched.get(&kind).ok().as_deref() == Some("newValue") {
            reloaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reloaded);
    watched.cancel_watches();
}

/// Undeclared keys fail the load when unknown paths are rejected.
#[test]
fn unknown_path_fails_the_load() {
    let (config, kind) = provider_config();
    let strict = config.enable(Feature::FailOnUnknownPath);
    let err = strict
        .from(Arc::new(PropertiesCodec))
        .string("type = x\nunknown = y")
        .unwrap_err();
    match err {
        ConfigError::UnknownPath { path, origin } => {
            assert_eq!(path.to_string(), "unknown");
            assert_eq!(origin, "string");
        }
        other => panic!("unexpected error: {other}"),
    }

    let lenient = config
        .from(Arc::new(PropertiesCodec))
        .string("type = x\nunknown = y")
        .expect("lenient");
    assert_eq!(lenient.get(&kind).expect("type"), "x");
}

/// A lazy item reading a missing required item fails with that item's path.
#[test]
fn lazy_item_over_missing_required_item() {
    let mut spec = Spec::new("db");
    let host = spec.required::<String>("host");
    let reader = host.clone();
    let url = spec.lazy("url", move |snapshot| {
        Ok(format!("postgres://{}", snapshot.get(&reader)?))
    });
    let config = Config::builder().spec(spec).build().expect("config");

    match config.get(&url).unwrap_err() {
        ConfigError::MissingRequiredItem { path } => assert_eq!(path, *host.path()),
        other => panic!("unexpected error: {other}"),
    }
}

/// Sources cascade: files, then environment, then command-line properties.
#[test]
fn layered_sources_cascade() {
    let mut spec = Spec::new("");
    let server = spec.required::<ServerConfig>("server");
    let mut limits = Spec::new("server_limits");
    let max_conn = limits.add(Item::<u32>::optional("max_conn", 10));
    let config = Config::builder()
        .spec(spec)
        .spec(limits)
        .build()
        .expect("config");

    let config = config
        .from(Arc::new(JsonCodec))
        .string(r#"{ "server": { "host": "file", "port": 80, "tags": ["a"] } }"#)
        .expect("json")
        .with_source(Source::from_env_vars(
            [
                ("APP_SERVER_PORT", "8080"),
                ("APP_SERVER__LIMITS_MAX__CONN", "64"),
                ("OTHER_SERVER_PORT", "1"),
            ],
            Some("APP"),
        ))
        .expect("env")
        .with_source(Source::from_properties(["server.host=cli"]).expect("properties"))
        .expect("cli");

    assert_eq!(
        config.get(&server).expect("server"),
        ServerConfig {
            host: "cli".into(),
            port: 8080,
            tags: vec!["a".into()],
        }
    );
    assert_eq!(config.get(&max_conn).expect("max_conn"), 64);
    let descriptions = config
        .layers()
        .iter()
        .map(|info| info.description().to_string())
        .collect::<Vec<_>>();
    assert_eq!(descriptions, ["string", "env(prefix=APP)", "properties"]);
}

/// A typed value exported as properties binds back to the same value.
#[test]
fn typed_values_survive_export_and_reload() {
    let mut spec = Spec::new("");
    let server = spec.required::<ServerConfig>("server");
    let config = Config::builder().spec(spec).build().expect("config");
    let loaded = config
        .from(Arc::new(PropertiesCodec))
        .string("server.host = h\nserver.port = 443\nserver.tags = x, y\n")
        .expect("load");
    let expected = ServerConfig {
        host: "h".into(),
        port: 443,
        tags: vec!["x".into(), "y".into()],
    };
    assert_eq!(loaded.get(&server).expect("server"), expected);

    let exported = loaded.export(&PropertiesCodec).expect("export");
    let reloaded = config
        .from(Arc::new(PropertiesCodec))
        .bytes(&exported)
        .expect("reload");
    assert_eq!(reloaded.get(&server).expect("server"), expected);

    let replaced = config
        .with_value(&server, expected.clone())
        .expect("with value");
    assert_eq!(replaced.get(&server).expect("server"), expected);
}
