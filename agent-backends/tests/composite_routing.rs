//! Routes one namespace across in-memory, key-value and on-disk backends.

use std::sync::Arc;

use agent_backends::format::{GrepOutputMode, format_grep_results};
use agent_backends::{
    BackendError, BackendProtocol, CompositeBackend, FilesystemBackend, LocalSandbox,
    MemoryStore, Route, StateBackend, StoreBackend,
};
use agent_primitives::AgentId;
use tempfile::TempDir;

struct Mounted {
    composite: CompositeBackend,
    scratch: Arc<StateBackend>,
    memories: Arc<StoreBackend>,
    workspace: TempDir,
}

fn mount() -> Mounted {
    let workspace = tempfile::tempdir().unwrap();
    let scratch = Arc::new(StateBackend::new());
    let memories = Arc::new(StoreBackend::new(
        Arc::new(MemoryStore::new()),
        AgentId::new("agent-7").unwrap(),
    ));
    let disk = Arc::new(FilesystemBackend::new(Arc::new(LocalSandbox::new(
        workspace.path(),
    ))));

    let composite = CompositeBackend::new(
        scratch.clone(),
        [
            Route::new("/memories/", memories.clone()),
            Route::new("/workspace/", disk),
        ],
    )
    .unwrap();

    Mounted {
        composite,
        scratch,
        memories,
        workspace,
    }
}

#[tokio::test]
async fn writes_land_in_the_owning_backend() {
    let m = mount();
    m.composite.write("/scratch.md", "draft").await.unwrap();
    m.composite.write("/memories/prefs.md", "tabs").await.unwrap();
    let disk = m.composite.write("/workspace/src/main.rs", "fn main() {}").await.unwrap();
    assert!(disk.is_ok());

    assert_eq!(m.scratch.read("/scratch.md", 0, 0).await.unwrap(), "draft");
    assert_eq!(m.memories.read("/prefs.md", 0, 0).await.unwrap(), "tabs");
    assert_eq!(
        std::fs::read_to_string(m.workspace.path().join("src/main.rs")).unwrap(),
        "fn main() {}"
    );
}

#[tokio::test]
async fn edits_route_by_prefix() {
    let m = mount();
    m.composite.write("/workspace/a.txt", "one two one").await.unwrap();
    let edit = m
        .composite
        .edit("/workspace/a.txt", "one", "1", true)
        .await
        .unwrap();
    assert_eq!(edit.replacements_made, 2);
    assert_eq!(
        m.composite.read("/workspace/a.txt", 0, 0).await.unwrap(),
        "1 two 1"
    );

    let missing = m
        .composite
        .edit("/memories/none.txt", "a", "b", false)
        .await
        .unwrap();
    assert!(!missing.is_ok());
}

#[tokio::test]
async fn fan_out_merges_every_backend() {
    let m = mount();
    m.composite.write("/scratch.md", "TODO scratch").await.unwrap();
    m.composite.write("/memories/prefs.md", "TODO memory").await.unwrap();
    m.composite.write("/workspace/notes.md", "TODO disk").await.unwrap();

    let mut globbed: Vec<String> = m
        .composite
        .glob("*.md", "/")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    globbed.sort();
    assert_eq!(
        globbed,
        ["/memories/prefs.md", "/scratch.md", "/workspace/notes.md"]
    );

    let matches = m.composite.grep("TODO", "/", None).await.unwrap();
    assert_eq!(
        format_grep_results(&matches, GrepOutputMode::FilesWithMatches),
        "/workspace/notes.md\n/memories/prefs.md\n/scratch.md"
    );

    let listed = m.composite.list("/").await.unwrap();
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().any(|e| e.path == "/workspace/notes.md"));
}

#[tokio::test]
async fn sandbox_escape_is_an_error_not_a_route_change() {
    let m = mount();
    let err = m
        .composite
        .read("/workspace/../../etc/passwd", 0, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::PathEscapesSandbox(_)));

    let gathered = m.composite.grep_gathered("x", "/", None).await;
    assert!(gathered.is_complete());
}
