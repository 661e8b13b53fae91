//! Tests for layered configuration loading.

use super::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Verify that a minimal config parses with defaults.
#[test]
fn parse_minimal_config() {
    let config = LuminoConfig::load_from_str("{}").expect("config");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.backend.binary, "llama-server");
    assert!(config.include.enabled);
    assert!(config.tui.stream);
    assert_eq!(config.tui.render_batch, 4);
    assert!(config.models.overrides.is_empty());
}

#[test]
fn parses_every_section() {
    let json5 = r#"{
        // comments are allowed
        server: { host: "0.0.0.0", port: 7000 },
        models: { dir: "weights", default: "a-coder.gguf", overrides: { n_gpu_layers: -1, temperature: 0.2 } },
        backend: { binary: "/opt/llama/llama-server", port: 9000, ready_timeout_secs: 5 },
        include: { enabled: false, project_root: "/srv/project" },
        tui: { stream: false, render_batch: 8 },
    }"#;
    let config = LuminoConfig::load_from_str(json5).expect("config");
    assert_eq!(config.server_url(), "http://0.0.0.0:7000");
    assert_eq!(config.models.default.as_deref(), Some("a-coder.gguf"));
    assert_eq!(config.models.overrides.n_gpu_layers, Some(-1));
    assert_eq!(config.backend.port, 9000);
    assert!(!config.include.enabled);
    assert_eq!(config.tui.render_batch, 8);

    let cwd = Path::new("/work");
    assert_eq!(config.models_dir(cwd), Path::new("/work/weights"));
    assert_eq!(config.project_root(cwd), Path::new("/srv/project"));
}

#[test]
fn relative_paths_default_to_cwd() {
    let config = LuminoConfig::default();
    let cwd = Path::new("/work");
    assert_eq!(config.models_dir(cwd), Path::new("/work/models"));
    assert_eq!(config.project_root(cwd), Path::new("/work"));
}

/// Reject unexpected top-level config keys.
#[test]
fn rejects_unknown_top_level_key() {
    let err = LuminoConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

#[test]
fn rejects_wrong_field_types() {
    let err = LuminoConfig::load_from_str(r#"{ server: { port: "5000" } }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("server.port"), "{msg}");

    let err = LuminoConfig::load_from_str(r#"{ models: { overrides: { n_ctx: -4 } } }"#)
        .unwrap_err();
    assert!(format!("{err}").contains("models.overrides.n_ctx"));
}

#[test]
fn rejects_zero_render_batch() {
    let err = LuminoConfig::load_from_str(r#"{ tui: { render_batch: 0 } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

/// Runtime layers win over cwd, which wins over user.
#[test]
fn layered_config_precedence() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("project");
    fs::create_dir_all(&cwd).expect("cwd");

    let user_config = root.join("home").join(".lumino").join("lumino.json5");
    write_json5(
        &user_config,
        "{ server: { port: 6000 }, tui: { render_batch: 2 } }",
    );
    write_json5(&cwd.join("lumino.json5"), "{ server: { port: 6100 } }");
    let runtime = root.join("runtime.json5");
    write_json5(&runtime, "{ tui: { stream: false } }");

    let options = LayeredConfigOptions::new(&cwd)
        .with_user_config_path(Some(user_config))
        .with_runtime_path(&runtime);
    let layered = LuminoConfig::load_layered_with_options(options).expect("config");

    assert_eq!(layered.config.server.port, 6100);
    assert_eq!(layered.config.tui.render_batch, 2);
    assert!(!layered.config.tui.stream);
    let sources: Vec<_> = layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::User,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Runtime
        ]
    );
}

#[test]
fn missing_optional_layers_are_skipped() {
    let temp = TempDir::new().expect("tmp");
    let options = LayeredConfigOptions::new(temp.path())
        .with_user_config_path(Some(temp.path().join("absent.json5")));
    let layered = LuminoConfig::load_layered_with_options(options).expect("config");
    assert!(layered.layers.is_empty());
    assert_eq!(layered.config.server.port, 5000);
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let options = LayeredConfigOptions::new(temp.path())
        .with_user_config_path(None)
        .with_runtime_path(temp.path().join("absent.json5"));
    let err = LuminoConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}

#[test]
fn invalid_layer_reports_its_label() {
    let temp = TempDir::new().expect("tmp");
    write_json5(&temp.path().join("lumino.json5"), "{ tui: { colour: 1 } }");
    let options = LayeredConfigOptions::new(temp.path()).with_user_config_path(None);
    let err = LuminoConfig::load_layered_with_options(options).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("cwd("), "{msg}");
    assert!(msg.contains("tui.colour"), "{msg}");
}
