//! End-to-end workspace scenarios over the public API

use apiary::messages::Notification;
use apiary::models::{HttpMethod, KeyValue, NodeKind, RequestBody, RequestDescriptor};
use apiary::placement::DropTarget;
use apiary::storage::Storage;
use apiary::tabs::TabHandle;
use apiary::{AppState, WorkspaceError};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

fn workspace() -> (TempDir, AppState) {
    let dir = tempdir().unwrap();
    let state = AppState::new(Storage::new(dir.path().join("collections.json")));
    (dir, state)
}

fn opened_tab(notes: &[Notification]) -> TabHandle {
    notes
        .iter()
        .find_map(|n| match n {
            Notification::TabOpened { tab, .. } => Some(*tab),
            _ => None,
        })
        .expect("no TabOpened notification")
}

fn title(state: &AppState, tab: TabHandle) -> String {
    state.tabs.get(tab).unwrap().title()
}

#[test]
fn test_tab_follows_collection_rename() {
    let (_dir, mut state) = workspace();
    state.create_collection(None, "Auth").unwrap();
    state.create_collection(None, "Authority").unwrap();
    state.create_request(Some("Auth"), "Login", None).unwrap();
    state.create_request(Some("Authority"), "Audit", None).unwrap();

    let login = opened_tab(&state.open_tab("Auth/Login").unwrap());
    let audit = opened_tab(&state.open_tab("Authority/Audit").unwrap());
    assert_eq!(title(&state, login), "Auth/Login");

    let mut edited = RequestDescriptor::new(HttpMethod::POST, "https://example.com/login");
    edited.body = RequestBody::json(r#"{"user":"a"}"#);
    state.edit_tab(login, edited.clone()).unwrap();
    assert_eq!(title(&state, login), "Auth/Login*");

    state.rename("Auth", "Identity").unwrap();
    assert_eq!(title(&state, login), "Identity/Login*");
    assert_eq!(title(&state, audit), "Authority/Audit");

    state.save_tab(login).unwrap();
    assert_eq!(title(&state, login), "Identity/Login");

    let id = state.tree.resolve("Identity/Login").unwrap();
    assert_eq!(state.tree.descriptor(id), Some(&edited));
    assert_eq!(state.tree.resolve("Auth/Login"), None);
}

#[test]
fn test_move_request_and_reject_cycle() {
    let (_dir, mut state) = workspace();
    state.create_collection(None, "Auth").unwrap();
    state.create_request(Some("Auth"), "Login", None).unwrap();
    state.create_collection(None, "Temp").unwrap();

    let notes = state.move_node("Auth/Login", Some("Temp")).unwrap();
    assert_eq!(
        notes[0],
        Notification::TreeChanged {
            old_path: Some("Auth/Login".into()),
            new_path: Some("Temp/Login".into()),
        }
    );

    let before = state.tree.paths();
    let err = state.move_node("Temp", Some("Temp/Login")).unwrap_err();
    match err {
        WorkspaceError::InvalidPlacement { source_kind, target, .. } => {
            assert_eq!(source_kind, NodeKind::Collection);
            assert_eq!(target, DropTarget::Node(NodeKind::Request));
        }
        other => panic!("expected InvalidPlacement, got {:?}", other),
    }
    assert_eq!(state.tree.paths(), before);
}

#[test]
fn test_collection_cannot_move_into_its_descendant() {
    let (_dir, mut state) = workspace();
    state.create_collection(None, "A").unwrap();
    state.create_collection(Some("A"), "B").unwrap();

    assert!(matches!(
        state.move_node("A", Some("A/B")),
        Err(WorkspaceError::InvalidPlacement { .. })
    ));
    assert!(matches!(
        state.move_node("A", Some("A")),
        Err(WorkspaceError::InvalidPlacement { .. })
    ));
}

#[test]
fn test_duplicate_sibling_names_are_rejected() {
    let (_dir, mut state) = workspace();
    state.create_collection(None, "Auth").unwrap();
    state.create_request(Some("Auth"), "Login", None).unwrap();
    state.create_request(Some("Auth"), "Logout", None).unwrap();

    assert!(matches!(
        state.create_request(Some("Auth"), "Login", None),
        Err(WorkspaceError::DuplicateName { .. })
    ));
    assert!(matches!(
        state.rename("Auth/Logout", "Login"),
        Err(WorkspaceError::DuplicateName { .. })
    ));
    assert!(matches!(
        state.create_collection(None, "a/b"),
        Err(WorkspaceError::InvalidName(_))
    ));
}

#[test]
fn test_delete_removes_whole_subtree() {
    let (_dir, mut state) = workspace();
    state.create_collection(None, "Auth").unwrap();
    state.create_collection(Some("Auth"), "Admin").unwrap();
    state.create_request(Some("Auth/Admin"), "Ban", None).unwrap();
    state.create_request(Some("Auth"), "Login", None).unwrap();

    let removed = state.tree.delete("Auth").unwrap();
    let paths: Vec<_> = removed.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(paths, vec!["Auth", "Auth/Admin", "Auth/Admin/Ban", "Auth/Login"]);
    assert!(state.tree.is_empty());
    for path in paths {
        assert_eq!(state.tree.resolve(path), None);
    }
}

#[test]
fn test_saved_workspace_reloads() {
    let (dir, mut state) = workspace();
    state.create_collection(None, "Auth").unwrap();
    let mut login = RequestDescriptor::new(HttpMethod::POST, "https://example.com/login");
    login.headers.push(KeyValue::new("X-Debug", "1").disabled());
    login.body = RequestBody::json(r#"{"a":1}"#);
    state.create_request(Some("Auth"), "Login", Some(login.clone())).unwrap();
    // Never saved, so never written
    state.create_request(Some("Auth"), "Scratch", None).unwrap();

    let notes = state.retry_save();
    assert_eq!(notes, vec![Notification::Saved { requests_written: 1 }]);

    let reopened = AppState::open(Storage::new(dir.path().join("collections.json"))).unwrap();
    assert_eq!(reopened.tree.paths(), vec!["Auth", "Auth/Login"]);
    let id = reopened.tree.resolve("Auth/Login").unwrap();
    assert_eq!(reopened.tree.descriptor(id), Some(&login));
}

#[test]
fn test_merge_import_combines_collections() {
    let (dir, mut state) = workspace();
    state.create_collection(None, "Auth").unwrap();
    state
        .create_request(Some("Auth"), "Login", Some(RequestDescriptor::default()))
        .unwrap();

    let source = dir.path().join("shared.json");
    std::fs::write(
        &source,
        r#"[
            {"type": "collection", "name": "Auth", "children": [
                {"type": "request", "name": "Login", "request": {"method": "PUT", "url": "https://example.com/login"}},
                {"type": "request", "name": "Refresh", "request": {"method": "POST", "url": "https://example.com/refresh"}}
            ]},
            {"type": "request", "name": "Health", "request": {"url": "https://example.com/health"}}
        ]"#,
    )
    .unwrap();

    state.import(&source, apiary::ImportMode::Merge).unwrap();
    assert_eq!(
        state.tree.paths(),
        vec!["Auth", "Auth/Login", "Auth/Refresh", "Health"]
    );
    let login = state.tree.resolve("Auth/Login").unwrap();
    assert_eq!(state.tree.descriptor(login).unwrap().method, HttpMethod::PUT);
}

#[test]
fn test_malformed_import_leaves_tree_untouched() {
    let (dir, mut state) = workspace();
    state.create_collection(None, "Auth").unwrap();

    let source = dir.path().join("broken.json");
    std::fs::write(&source, r#"{"type": "collection", "name": "Auth"}"#).unwrap();

    assert!(matches!(
        state.import(&source, apiary::ImportMode::Replace),
        Err(WorkspaceError::ImportFormat(_))
    ));
    assert_eq!(state.tree.paths(), vec!["Auth"]);
}
