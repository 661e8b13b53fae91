use std::fs;
use tempfile::TempDir;

/// Temporary models directory holding empty files with the given names.
pub fn models_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("models tempdir");
    for name in names {
        fs::write(dir.path().join(name), b"GGUF").expect("write model file");
    }
    dir
}
