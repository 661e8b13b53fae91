//! `/read <path>` directive expansion for outbound chat messages.

use log::{debug, warn};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/read\s+([A-Za-z0-9_\-./]+)").expect("directive pattern"));

/// Names requested by `/read` directives, in order, without touching disk.
pub fn directives(raw: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in DIRECTIVE.captures_iter(raw) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Message with its directives replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expanded {
    pub message: String,
    /// Requested names, in order of first appearance.
    pub files_read: Vec<String>,
}

/// Expands `/read` directives against files under a project root.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    root: PathBuf,
}

impl IncludeResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let root = project_root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn project_root(&self) -> &Path {
        &self.root
    }

    /// Replace every directive with the file block or an inline sentinel.
    pub fn process(&self, raw: &str) -> Expanded {
        let files_read = directives(raw);
        if files_read.is_empty() {
            return Expanded {
                message: raw.to_string(),
                files_read,
            };
        }
        let message = DIRECTIVE
            .replace_all(raw, |caps: &Captures<'_>| self.include(&caps[1]))
            .into_owned();
        debug!(
            "expanded read directives (files={}, len={})",
            files_read.len(),
            message.len()
        );
        Expanded {
            message,
            files_read,
        }
    }

    fn include(&self, name: &str) -> String {
        let Some(candidate) = confine(&self.root, name) else {
            warn!("read directive outside project (name={name})");
            return format!("[SYSTEM: Access denied. File {name} is outside the project folder.]");
        };
        if !candidate.exists() {
            return format!("[SYSTEM: File {name} not found.]");
        }
        match candidate.canonicalize() {
            Ok(real) if !real.starts_with(&self.root) => {
                warn!("read directive escapes project via link (name={name})");
                return format!(
                    "[SYSTEM: Access denied. File {name} is outside the project folder.]"
                );
            }
            Ok(_) => {}
            Err(err) => return format!("[SYSTEM: Failed to read file {name}: {err}]"),
        }
        match fs::read_to_string(&candidate) {
            Ok(content) => format!(
                "\n\n--- START OF FILE: {name} ---\n```{}\n{content}\n```\n--- END OF FILE ---\n\n",
                fence_hint(name)
            ),
            Err(err) => format!("[SYSTEM: Failed to read file {name}: {err}]"),
        }
    }
}

/// Resolve `name` against `root` lexically and keep it only when the result
/// still lies under `root`.
fn confine(root: &Path, name: &str) -> Option<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in root.join(name).components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved.starts_with(root).then_some(resolved)
}

/// Code fence language hint: the text after the last dot.
fn fence_hint(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn directives_are_listed_without_disk_access() {
        assert_eq!(
            directives("look at /read src/main.rs and /read  a.py, again /read a.py"),
            vec!["src/main.rs", "a.py"]
        );
        assert!(directives("no directives here").is_empty());
    }

    #[test]
    fn confine_handles_dot_segments() {
        let root = Path::new("/project");
        assert_eq!(
            confine(root, "./src/../lib.rs"),
            Some(PathBuf::from("/project/lib.rs"))
        );
        assert_eq!(
            confine(root, "../project/src/main.rs"),
            Some(PathBuf::from("/project/src/main.rs"))
        );
        assert_eq!(confine(root, "../secret"), None);
        assert_eq!(confine(root, "../project-other/a.rs"), None);
        assert_eq!(confine(root, "src/../../secret"), None);
        assert_eq!(confine(root, "/etc/passwd"), None);
    }

    #[test]
    fn parent_hop_back_into_root_is_read() {
        let temp = TempDir::new().expect("tmp");
        let root = temp.path().join("project");
        fs::create_dir(&root).expect("mkdir");
        fs::write(root.join("main.py"), "print(1)").expect("write");
        let resolver = IncludeResolver::new(&root);

        let expanded = resolver.process("/read ../project/main.py");
        assert!(expanded.message.contains("--- START OF FILE: ../project/main.py ---"));
        assert!(expanded.message.contains("print(1)"));
        assert_eq!(expanded.files_read, vec!["../project/main.py"]);
    }

    #[test]
    fn fence_hint_uses_last_extension() {
        assert_eq!(fence_hint("archive.tar.gz"), "gz");
        assert_eq!(fence_hint("Makefile"), "Makefile");
    }

    #[test]
    fn message_without_directives_is_untouched() {
        let temp = TempDir::new().expect("tmp");
        let resolver = IncludeResolver::new(temp.path());
        let expanded = resolver.process("plain text");
        assert_eq!(expanded.message, "plain text");
        assert!(expanded.files_read.is_empty());
    }
}
