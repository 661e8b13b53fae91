//! Configuration schema for Lumino.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root config for the Lumino assistant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LuminoConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub include: IncludeConfig,
    #[serde(default)]
    pub tui: TuiSettings,
}

impl LuminoConfig {
    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".to_string()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".to_string()));
        }
        if self.backend.binary.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "backend.binary must not be empty".to_string(),
            ));
        }
        if self.backend.ready_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend.ready_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.tui.render_batch == 0 {
            return Err(ConfigError::Invalid(
                "tui.render_batch must be at least 1".to_string(),
            ));
        }
        if let Some(temperature) = self.models.overrides.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ConfigError::Invalid(format!(
                "models.overrides.temperature out of range: {temperature}"
            )));
        }
        if let Some(name) = self.models.default.as_deref()
            && (name.contains('/') || name.contains('\\'))
        {
            return Err(ConfigError::Invalid(format!(
                "models.default must be a file name, got {name}"
            )));
        }
        Ok(())
    }

    /// Models directory, resolved against `cwd` when relative.
    pub fn models_dir(&self, cwd: &Path) -> PathBuf {
        resolve_against(cwd, self.models.dir.as_deref(), "models")
    }

    /// Root that `/read` directives are confined to, resolved against `cwd`.
    pub fn project_root(&self, cwd: &Path) -> PathBuf {
        resolve_against(cwd, self.include.project_root.as_deref(), ".")
    }

    /// Base URL the HTTP surface listens on.
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server.host, self.server.port)
    }
}

fn resolve_against(cwd: &Path, configured: Option<&Path>, fallback: &str) -> PathBuf {
    let path = configured.unwrap_or_else(|| Path::new(fallback));
    if path.is_absolute() {
        path.to_path_buf()
    } else if path == Path::new(".") {
        cwd.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Loopback HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    5000
}

/// Model discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelsConfig {
    /// Directory scanned for `.gguf` files (default `<cwd>/models`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// File name loaded at startup; the first listed model otherwise.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub overrides: ProfileOverrides,
}

/// Values applied on top of every family default.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProfileOverrides {
    #[serde(default)]
    pub n_ctx: Option<u32>,
    #[serde(default)]
    pub n_threads: Option<u32>,
    #[serde(default)]
    pub n_gpu_layers: Option<i32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ProfileOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// llama-server process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Binary name looked up on PATH, or an explicit path.
    #[serde(default = "default_backend_binary")]
    pub binary: String,
    #[serde(default = "default_backend_host")]
    pub host: String,
    #[serde(default = "default_backend_port")]
    pub port: u16,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            binary: default_backend_binary(),
            host: default_backend_host(),
            port: default_backend_port(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

fn default_backend_binary() -> String {
    "llama-server".to_string()
}

fn default_backend_host() -> String {
    "127.0.0.1".to_string()
}

fn default_backend_port() -> u16 {
    8089
}

fn default_ready_timeout_secs() -> u64 {
    120
}

/// File-inclusion preprocessor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub project_root: Option<PathBuf>,
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_root: None,
        }
    }
}

/// Terminal client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuiSettings {
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Tokens buffered between redraws of a streaming reply.
    #[serde(default = "default_render_batch")]
    pub render_batch: usize,
}

impl Default for TuiSettings {
    fn default() -> Self {
        Self {
            stream: true,
            render_batch: default_render_batch(),
        }
    }
}

fn default_render_batch() -> usize {
    4
}

fn default_true() -> bool {
    true
}
