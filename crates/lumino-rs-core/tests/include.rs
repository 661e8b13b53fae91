//! `/read` directive expansion against a real directory tree.

use lumino_rs_core::IncludeResolver;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn project() -> (TempDir, IncludeResolver) {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path().join("project");
    fs::create_dir_all(root.join("src")).expect("src");
    fs::write(root.join("src/main.py"), "print('hi')\n").expect("write");
    fs::write(temp.path().join("outside.txt"), "secret").expect("write");
    let resolver = IncludeResolver::new(&root);
    (temp, resolver)
}

#[test]
fn in_root_file_is_inlined_verbatim() {
    let (_temp, resolver) = project();
    let expanded = resolver.process("explain /read src/main.py please");
    assert_eq!(
        expanded.message,
        "explain \n\n--- START OF FILE: src/main.py ---\n```py\nprint('hi')\n\n```\n--- END OF FILE ---\n\n please"
    );
    assert_eq!(expanded.files_read, vec!["src/main.py"]);
}

#[test]
fn traversal_is_denied() {
    let (_temp, resolver) = project();
    let expanded = resolver.process("/read ../../etc/passwd");
    assert_eq!(
        expanded.message,
        "[SYSTEM: Access denied. File ../../etc/passwd is outside the project folder.]"
    );
    assert_eq!(expanded.files_read, vec!["../../etc/passwd"]);

    let expanded = resolver.process("/read ../outside.txt");
    assert!(expanded.message.starts_with("[SYSTEM: Access denied."));

    let expanded = resolver.process("/read /etc/hostname");
    assert!(expanded.message.starts_with("[SYSTEM: Access denied."));
}

#[test]
fn missing_and_unreadable_files_become_sentinels() {
    let (_temp, resolver) = project();
    let expanded = resolver.process("/read nope.rs");
    assert_eq!(expanded.message, "[SYSTEM: File nope.rs not found.]");

    let expanded = resolver.process("/read src");
    assert!(
        expanded
            .message
            .starts_with("[SYSTEM: Failed to read file src: "),
        "{}",
        expanded.message
    );
}

#[test]
fn each_directive_is_replaced_independently() {
    let (_temp, resolver) = project();
    let expanded = resolver.process("a /read missing.txt b /read src/main.py");
    assert!(expanded.message.starts_with("a [SYSTEM: File missing.txt not found.] b "));
    assert!(expanded.message.contains("--- START OF FILE: src/main.py ---"));
    assert_eq!(expanded.files_read, vec!["missing.txt", "src/main.py"]);
}

#[cfg(unix)]
#[test]
fn symlink_out_of_root_is_denied() {
    let (temp, resolver) = project();
    std::os::unix::fs::symlink(
        temp.path().join("outside.txt"),
        resolver.project_root().join("link.txt"),
    )
    .expect("symlink");
    let expanded = resolver.process("/read link.txt");
    assert!(expanded.message.starts_with("[SYSTEM: Access denied."));
}
