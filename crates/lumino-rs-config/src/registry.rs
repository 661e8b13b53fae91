//! Discovery of GGUF model files and resolution into profiles.

use crate::{ConfigError, ModelProfile, ProfileOverrides};
use log::{debug, info};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// File extension of loadable model files.
pub const MODEL_EXTENSION: &str = "gguf";

/// Lists model files and builds profiles for them.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models_dir: PathBuf,
    overrides: ProfileOverrides,
}

impl ModelRegistry {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            overrides: ProfileOverrides::default(),
        }
    }

    /// Apply configured overrides to every profile this registry resolves.
    pub fn with_overrides(mut self, overrides: ProfileOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// File names of the `.gguf` models in the models directory, sorted.
    /// A missing directory yields an empty list.
    pub fn list_available_models(&self) -> Result<Vec<String>, ConfigError> {
        let entries = match fs::read_dir(&self.models_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "models directory missing (path={})",
                    self.models_dir.display()
                );
                return Ok(Vec::new());
            }
            Err(err) => return Err(ConfigError::ReadFailed(err)),
        };

        let mut models = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_model = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(MODEL_EXTENSION));
            if !is_model {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                models.push(name.to_string());
            }
        }
        models.sort();
        debug!(
            "listed models (dir={}, count={})",
            self.models_dir.display(),
            models.len()
        );
        Ok(models)
    }

    /// Build the profile for a model file name in the models directory.
    pub fn resolve(&self, identifier: &str) -> Result<ModelProfile, ConfigError> {
        let identifier = identifier.trim();
        if !is_plain_file_name(identifier) {
            return Err(ConfigError::Invalid(format!(
                "model id must be a plain file name: {identifier}"
            )));
        }
        let path = self.models_dir.join(identifier);
        if !path.is_file() {
            return Err(ConfigError::ModelNotFound(path));
        }
        let profile = ModelProfile::for_file(identifier, path).with_overrides(&self.overrides);
        info!(
            "resolved model profile (id={}, family={:?}, mode={})",
            profile.id,
            profile.family,
            profile.mode()
        );
        Ok(profile)
    }
}

/// True for exactly one normal path component: no separators, no `.`/`..`.
fn is_plain_file_name(identifier: &str) -> bool {
    let mut components = Path::new(identifier).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ModelFamily, PromptFormat};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"GGUF").expect("write");
    }

    #[test]
    fn lists_only_gguf_files_sorted() {
        let temp = TempDir::new().expect("tmp");
        touch(temp.path(), "b-coder.gguf");
        touch(temp.path(), "A-Llama-3.GGUF");
        touch(temp.path(), "notes.txt");
        fs::create_dir(temp.path().join("nested.gguf")).expect("dir");

        let registry = ModelRegistry::new(temp.path());
        let models = registry.list_available_models().expect("list");
        assert_eq!(models, vec!["A-Llama-3.GGUF", "b-coder.gguf"]);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let temp = TempDir::new().expect("tmp");
        let registry = ModelRegistry::new(temp.path().join("absent"));
        assert!(registry.list_available_models().expect("list").is_empty());
    }

    #[test]
    fn resolve_builds_family_profile() {
        let temp = TempDir::new().expect("tmp");
        touch(temp.path(), "qwen2.5-coder-7b.gguf");
        let registry = ModelRegistry::new(temp.path()).with_overrides(ProfileOverrides {
            max_tokens: Some(128),
            ..ProfileOverrides::default()
        });

        let profile = registry.resolve("qwen2.5-coder-7b.gguf").expect("profile");
        assert_eq!(profile.family, ModelFamily::Coder);
        assert_eq!(profile.prompt_format, PromptFormat::ChatMl);
        assert_eq!(profile.path, temp.path().join("qwen2.5-coder-7b.gguf"));
        assert_eq!(profile.generation.max_tokens, 128);
    }

    #[test]
    fn resolve_rejects_missing_and_traversal() {
        let temp = TempDir::new().expect("tmp");
        let registry = ModelRegistry::new(temp.path());

        let err = registry.resolve("absent.gguf").unwrap_err();
        assert!(matches!(err, ConfigError::ModelNotFound(_)));

        for id in ["../secret.gguf", "sub/model.gguf", "/abs.gguf", "..", ".", ""] {
            let err = registry.resolve(id).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{id}");
        }
    }

    #[test]
    fn resolve_accepts_dots_inside_file_name() {
        let temp = TempDir::new().expect("tmp");
        fs::write(temp.path().join("model..q4.gguf"), b"").expect("write");
        let registry = ModelRegistry::new(temp.path());

        let profile = registry.resolve("model..q4.gguf").expect("resolve");
        assert_eq!(profile.id, "model..q4.gguf");
    }
}
