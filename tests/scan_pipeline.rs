//! Scan, reconcile and persist through the library API.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use notekeeper::io::database::Database;
use notekeeper::io::fs::LocalFs;
use notekeeper::io::kv::{JsonFileStore, KeyValueStore};
use notekeeper::model::{Location, ScanConfig, ScanRules};
use notekeeper::ops::cancel::CancellationToken;
use notekeeper::ops::scanner::Scanner;
use notekeeper::ops::{ignore_ops, note_ops, reconcile};
use pretty_assertions::assert_eq;

fn rules() -> ScanRules {
    ScanRules::compile(&ScanConfig {
        note_file_regex: r".*note.*\.(md|txt)$".into(),
        project_marker_regex: r"^\.marker$".into(),
        ..Default::default()
    })
    .unwrap()
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
}

fn workspace(root: &Path) {
    touch(&root.join("ws/.marker"));
    touch(&root.join("ws/notes/note-todo.md"));
    touch(&root.join("ws/notes/readme.md"));
    touch(&root.join("ws/other/deep/note-ideas.txt"));
}

fn scan(db: &mut Database, root: &Path) -> reconcile::ReconcileSummary {
    let rules = rules();
    let cancel = CancellationToken::new();
    let report = Scanner::new(&LocalFs, &rules).scan(&[Location::new(root)], &cancel, None);
    reconcile::apply_scan(db, &LocalFs, &rules, &report, &cancel)
}

#[test]
fn example_workspace_end_to_end() {
    let tmp = tempfile::TempDir::new().unwrap();
    workspace(tmp.path());
    let ws = tmp.path().join("ws");
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(tmp.path().join("store.json")));

    let mut db = Database::open(store.clone());
    scan(&mut db, &ws);

    // A fresh process sees the same state
    let db = Database::open(store);
    let projects: Vec<_> = db.projects.get_all().collect();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].location, Location::new(&ws));
    assert_eq!(projects[0].name.as_deref(), Some("ws"));

    let mut notes: Vec<(Location, Option<u64>)> = db
        .notes
        .get_all()
        .map(|n| (n.location.clone(), n.project_id))
        .collect();
    notes.sort();
    assert_eq!(
        notes,
        vec![
            (Location::new(ws.join("notes/note-todo.md")), Some(projects[0].id)),
            (
                Location::new(ws.join("other/deep/note-ideas.txt")),
                Some(projects[0].id)
            ),
        ]
    );
}

#[test]
fn remove_rescan_then_reimport() {
    let tmp = tempfile::TempDir::new().unwrap();
    workspace(tmp.path());
    let ws = tmp.path().join("ws");
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(tmp.path().join("store.json")));
    let mut db = Database::open(store.clone());
    scan(&mut db, &ws);

    let todo = Location::new(ws.join("notes/note-todo.md"));
    let id = db.note_by_location(&todo).unwrap().id;
    note_ops::remove_note(&mut db, id).unwrap();

    let summary = scan(&mut db, &ws);
    assert_eq!(summary.notes_skipped_ignored, 1);
    assert!(db.note_by_location(&todo).is_none());

    // Ignore entries survive a restart
    let mut db = Database::open(store);
    assert!(ignore_ops::is_ignored(&db, &todo));

    note_ops::import_notes(&mut db, &[todo.clone()], None).unwrap();
    assert!(!ignore_ops::is_ignored(&db, &todo));
    scan(&mut db, &ws);
    // Re-imported without a project, then picked up by inference
    let note = db.note_by_location(&todo).unwrap();
    assert_eq!(
        db.project_of(note).map(|p| p.location.clone()),
        Some(Location::new(&ws))
    );
    assert_eq!(db.notes.len(), 2);
}

#[test]
fn cancelled_scan_reconciles_partial_results() {
    let tmp = tempfile::TempDir::new().unwrap();
    workspace(tmp.path());
    let rules = rules();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut db = Database::new(Arc::new(notekeeper::io::kv::MemoryStore::new()));
    let report = Scanner::new(&LocalFs, &rules).scan(&[Location::new(tmp.path())], &cancel, None);
    assert!(report.cancelled);
    let summary = reconcile::apply_scan(&mut db, &LocalFs, &rules, &report, &cancel);
    assert_eq!(summary.notes_created, 0);
    assert!(db.notes.is_empty());
}
