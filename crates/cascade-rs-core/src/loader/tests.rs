//! Tests for loader entry points.

use super::*;
use crate::formats::{JsonCodec, PropertiesCodec};
use crate::item::Item;
use crate::spec::Spec;
use cascade_rs_test_utils::{TempSourceDir, temp_file_of};
use pretty_assertions::assert_eq;
use std::io::Cursor;

fn type_config() -> (Config, Item<String>) {
    let mut spec = Spec::new("");
    let kind = spec.required::<String>("type");
    let config = Config::builder()
        .spec(spec)
        .loader_options(LoaderOptions {
            resource_roots: ResourceRoots::new(),
            http_timeout: Some(Duration::from_secs(5)),
        })
        .build()
        .expect("config");
    (config, kind)
}

fn properties(config: &Config) -> Loader {
    config.from(Arc::new(PropertiesCodec))
}

/// Readers and input streams are drained and parsed.
#[test]
fn reader_and_stream_entry_points() {
    let (config, kind) = type_config();
    let loaded = properties(&config)
        .reader(Cursor::new("type = reader"))
        .expect("reader");
    assert_eq!(loaded.get(&kind).expect("type"), "reader");
    assert_eq!(loaded.layers()[0].description(), "reader");

    let loaded = properties(&config)
        .input_stream(Cursor::new(b"type = inputStream".to_vec()))
        .expect("stream");
    assert_eq!(loaded.get(&kind).expect("type"), "inputStream");
}

/// Only the requested window is parsed; out-of-range windows are rejected.
#[test]
fn byte_slices_are_bounds_checked() {
    let (config, kind) = type_config();
    let loaded = properties(&config)
        .bytes_slice(b"|type = slice|", 1, 12)
        .expect("slice");
    assert_eq!(loaded.get(&kind).expect("type"), "slice");

    let err = properties(&config)
        .bytes_slice(b"|type = slice|", 10, 12)
        .unwrap_err();
    match err {
        ConfigError::InvalidSlice {
            offset,
            length,
            available,
        } => assert_eq!((offset, length, available), (10, 12, 14)),
        other => panic!("unexpected error: {other}"),
    }
    assert!(
        properties(&config)
            .bytes_slice(b"abc", usize::MAX, 2)
            .is_err()
    );
}

#[test]
fn strings_and_bytes_load() {
    let (config, kind) = type_config();
    let loaded = properties(&config).string("type = string").expect("string");
    assert_eq!(loaded.get(&kind).expect("type"), "string");
    let loaded = config
        .from(Arc::new(JsonCodec))
        .bytes(br#"{ "type": "bytes" }"#)
        .expect("bytes");
    assert_eq!(loaded.get(&kind).expect("type"), "bytes");
}

/// A broken source fails the load and the parent config keeps its layers.
#[test]
fn parse_errors_leave_the_config_untouched() {
    let (config, kind) = type_config();
    let base = properties(&config).string("type = base").expect("base");
    let err = base
        .from(Arc::new(JsonCodec))
        .string("{ broken")
        .unwrap_err();
    match err {
        ConfigError::Parse(parse) => assert_eq!(parse.origin, "string"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(base.get(&kind).expect("type"), "base");
    assert_eq!(base.layers().len(), 1);
}

#[test]
fn files_load_by_handle_and_path() {
    let (config, kind) = type_config();
    let file = temp_file_of("type = file", "properties");
    let loaded = properties(&config).file(file.path()).expect("file");
    assert_eq!(loaded.get(&kind).expect("type"), "file");

    let path = file.path().to_str().expect("utf-8 path");
    let loaded = properties(&config).file_path(path).expect("file path");
    assert_eq!(loaded.get(&kind).expect("type"), "file");
    assert_eq!(
        loaded.layers()[0].details().get("path").map(String::as_str),
        Some(path)
    );
}

/// Registry loaders pick the codec from the file extension.
#[test]
fn registry_picks_codec_by_extension() {
    let (config, kind) = type_config();
    let registry = CodecRegistry::with_builtin();
    let json = temp_file_of(r#"{ "type": "json" }"#, "json");
    let loaded = config
        .from_registry(registry.clone())
        .file(json.path())
        .expect("json");
    assert_eq!(loaded.get(&kind).expect("type"), "json");

    let unknown = temp_file_of("type: yaml", "yaml");
    let err = config
        .from_registry(registry.clone())
        .file(unknown.path())
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));

    let err = config.from_registry(registry).string("type = x").unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
}

/// Missing files are errors unless optional sources are enabled.
#[test]
fn missing_sources_fail_unless_optional() {
    let (config, kind) = type_config();
    let dir = TempSourceDir::new();
    let missing = dir.path().join("absent.properties");

    let err = properties(&config).file(&missing).unwrap_err();
    assert!(matches!(err, ConfigError::SourceNotFound { .. }));

    let loaded = properties(&config)
        .enable(Feature::OptionalSourceOnNotFound)
        .file(&missing)
        .expect("optional");
    assert!(loaded.get(&kind).is_err());
    let layers = loaded.layers();
    assert_eq!(layers.len(), 1);
    assert_eq!(
        layers[0].details().get("missing").map(String::as_str),
        Some("true")
    );
}

/// Resources are searched under each configured root in order.
#[test]
fn resources_resolve_against_roots() {
    let dir = TempSourceDir::new();
    dir.write("source/provider.properties", "type = resource");
    let mut spec = Spec::new("");
    let kind = spec.required::<String>("type");
    let config = Config::builder()
        .spec(spec)
        .loader_options(
            LoaderOptions::new().with_resource_roots(ResourceRoots::new().with_root(dir.path())),
        )
        .build()
        .expect("config");

    let loaded = properties(&config)
        .resource("source/provider.properties")
        .expect("resource");
    assert_eq!(loaded.get(&kind).expect("type"), "resource");

    let err = properties(&config)
        .resource("source/no-provider.properties")
        .unwrap_err();
    match err {
        ConfigError::SourceNotFound { description } => {
            assert_eq!(description, "resource(source/no-provider.properties)")
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// `file://` and `http://` URLs load; a 404 is reported as not found.
#[test]
fn urls_load_over_file_and_http() {
    let (config, kind) = type_config();
    let file = temp_file_of("type = fileUrl", "properties");
    let file_url = Url::from_file_path(file.path()).expect("file url");
    let loaded = properties(&config).url(&file_url).expect("file url");
    assert_eq!(loaded.get(&kind).expect("type"), "fileUrl");

    let mut server = mockito::Server::new();
    let provider = server
        .mock("GET", "/source/provider.properties")
        .with_status(200)
        .with_body("type = http")
        .create();
    let missing = server
        .mock("GET", "/missing.properties")
        .with_status(404)
        .create();
    let loaded = properties(&config)
        .url_str(&format!("{}/source/provider.properties", server.url()))
        .expect("http");
    assert_eq!(loaded.get(&kind).expect("type"), "http");

    let err = properties(&config)
        .url_str(&format!("{}/missing.properties", server.url()))
        .unwrap_err();
    assert!(matches!(err, ConfigError::SourceNotFound { .. }));
    provider.assert();
    missing.assert();

    let err = properties(&config).url_str("not a url").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl(_)));
}
