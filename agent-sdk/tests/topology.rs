//! End-to-end: configuration file to routed backend through the facade.

use agent_sdk::backends::format::{extract_preview, format_content_with_line_numbers};
use agent_sdk::config::BackendConfig;

#[tokio::test]
async fn config_file_drives_routing() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join("workspace");
    let json = format!(
        r#"{{
            "default": {{"kind": "state"}},
            "routes": [
                {{"prefix": "/memories/", "backend": {{"kind": "store", "agent_id": "reviewer"}}}},
                {{"prefix": "/workspace/", "backend": {{"kind": "filesystem", "root": {root}}}}}
            ]
        }}"#,
        root = serde_json::to_string(&workspace).unwrap()
    );
    let path = dir.path().join("backends.json");
    std::fs::write(&path, json).unwrap();

    let backend = BackendConfig::load(&path).await.unwrap().build().await.unwrap();

    backend
        .write("/workspace/src/lib.rs", "pub fn answer() -> u32 {\n    42\n}\n")
        .await
        .unwrap();
    backend.write("/memories/style.md", "prefer 42").await.unwrap();
    backend.write("/scratch.txt", "unrelated").await.unwrap();

    assert!(workspace.join("src/lib.rs").exists());

    let matches = backend.grep("42", "/", None).await.unwrap();
    let paths: Vec<_> = matches.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(paths, ["/workspace/src/lib.rs", "/memories/style.md"]);

    let content = backend.read("/workspace/src/lib.rs", 1, 1).await.unwrap();
    assert_eq!(format_content_with_line_numbers(&content, 2), "     2\t    42");
    assert_eq!(
        extract_preview(&backend.read("/scratch.txt", 0, 0).await.unwrap(), 0),
        "     1\tunrelated"
    );
}
