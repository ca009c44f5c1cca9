//! Entry enumeration tests against a real directory tree

use std::path::Path;

use clevert_actions::enumerate;
use clevert_core::types::Entry;
use serde_json::json;
use tempfile::TempDir;

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"x").unwrap();
}

#[test]
fn test_common_files_mirrors_tree() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("i");
    let output = temp.path().join("o");
    touch(&input, "a.txt");
    touch(&input, "sub/b.txt");
    std::fs::create_dir_all(input.join("empty")).unwrap();

    let entries = enumerate(&json!({
        "kind": "common-files",
        "inputDir": input.to_str().unwrap(),
        "outputDir": output.to_str().unwrap(),
        "outputExtension": "out"
    }))
    .unwrap();

    assert_eq!(
        entries,
        vec![
            Entry::files(input.join("a.txt"), output.join("a.out")),
            Entry::files(input.join("sub/b.txt"), output.join("sub/b.out")),
        ]
    );
}

#[test]
fn test_common_files_keeps_extension_when_unset() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("photos");
    touch(&input, "cat.png");

    let entries = enumerate(&json!({
        "kind": "common-files",
        "inputDir": input.to_str().unwrap(),
        "outputDir": temp.path().join("converted").to_str().unwrap()
    }))
    .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].main_output().unwrap(),
        temp.path().join("converted/cat.png")
    );
}

#[test]
fn test_common_files_missing_input_dir() {
    let temp = TempDir::new().unwrap();
    let result = enumerate(&json!({
        "kind": "common-files",
        "inputDir": temp.path().join("nope").to_str().unwrap(),
        "outputDir": temp.path().to_str().unwrap()
    }));
    assert!(result.is_err());
}

#[test]
fn test_entries_serialize_for_actions() {
    let entry = Entry::files("/i/a.txt", "/o/a.out");
    assert_eq!(
        serde_json::to_value(&entry).unwrap(),
        json!({"input": {"main": ["/i/a.txt"]}, "output": {"main": ["/o/a.out"]}})
    );
}
