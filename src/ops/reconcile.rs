//! Merging scan results into the database.
//!
//! Reconciliation only ever adds: it creates missing projects and notes and
//! fills in the project of notes that have none. Notes that already belong
//! to a project keep it, and nothing is removed because it was not found.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::io::database::Database;
use crate::io::fs::FileSystem;
use crate::model::{EntityId, Location, Note, Project, ScanRules};
use crate::ops::cancel::CancellationToken;
use crate::ops::ignore_ops;
use crate::ops::inference::infer_project;
use crate::ops::scanner::ScanReport;

/// Counts of what one reconciliation did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub notes_found: usize,
    pub projects_found: usize,
    pub projects_created: usize,
    pub notes_created: usize,
    pub notes_assigned: usize,
    pub notes_skipped_ignored: usize,
}

/// Apply a scan report to `db`.
///
/// Inference walks up from each unassigned discovered note, so a marker
/// outside the scanned roots can still yield a project; it is created like
/// any other.
pub fn apply_scan(
    db: &mut Database,
    fs: &dyn FileSystem,
    rules: &ScanRules,
    report: &ScanReport,
    cancel: &CancellationToken,
) -> ReconcileSummary {
    let found_notes = report.note_locations();
    let found_projects = report.project_locations();
    let mut summary = ReconcileSummary {
        notes_found: found_notes.len(),
        projects_found: found_projects.len(),
        ..Default::default()
    };

    let mut project_ids: HashMap<Location, EntityId> = db
        .projects
        .get_all()
        .map(|p| (p.location.clone(), p.id))
        .collect();

    // Projects
    let mut new_projects = Vec::new();
    let mut next_project_id = db.projects.next_id();
    for location in &found_projects {
        if project_ids.contains_key(location) {
            continue;
        }
        let project = Project {
            id: next_project_id,
            location: location.clone(),
            name: location.file_name().map(str::to_string),
        };
        next_project_id += 1;
        project_ids.insert(location.clone(), project.id);
        new_projects.push(project);
    }
    summary.projects_created = new_projects.len();
    if !new_projects.is_empty() {
        db.projects.add_or_update_all(new_projects);
    }

    // Notes
    let tracked: HashSet<Location> = db.notes.get_all().map(|n| n.location.clone()).collect();
    let mut new_notes = Vec::new();
    let mut next_note_id = db.notes.next_id();
    for location in &found_notes {
        if tracked.contains(location) {
            continue;
        }
        if ignore_ops::is_ignored(db, location) {
            debug!(note = %location, "skipping ignored note");
            summary.notes_skipped_ignored += 1;
            continue;
        }
        new_notes.push(Note {
            id: next_note_id,
            location: location.clone(),
            project_id: None,
        });
        next_note_id += 1;
    }
    summary.notes_created = new_notes.len();
    if !new_notes.is_empty() {
        db.notes.add_or_update_all(new_notes);
    }

    // Assignment
    let unassigned: Vec<Note> = db
        .notes
        .get_all()
        .filter(|n| n.project_id.is_none() && found_notes.contains(&n.location))
        .cloned()
        .collect();
    let mut known: HashSet<Location> = project_ids.keys().cloned().collect();
    let mut assigned = Vec::new();
    for mut note in unassigned {
        if cancel.is_cancelled() {
            break;
        }
        let Some(project_location) = infer_project(fs, rules, &note.location, &known, cancel)
        else {
            continue;
        };
        let project_id = match project_ids.get(&project_location) {
            Some(id) => *id,
            None => {
                let project = Project {
                    id: db.projects.next_id(),
                    location: project_location.clone(),
                    name: project_location.file_name().map(str::to_string),
                };
                let id = project.id;
                db.projects.add_or_update(project);
                summary.projects_created += 1;
                project_ids.insert(project_location.clone(), id);
                known.insert(project_location);
                id
            }
        };
        note.project_id = Some(project_id);
        assigned.push(note);
    }
    summary.notes_assigned = assigned.len();
    if !assigned.is_empty() {
        db.notes.add_or_update_all(assigned);
    }

    info!(
        notes_created = summary.notes_created,
        projects_created = summary.projects_created,
        notes_assigned = summary.notes_assigned,
        "reconciled scan results"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fs::LocalFs;
    use crate::io::kv::MemoryStore;
    use crate::model::ScanConfig;
    use crate::ops::scanner::Scanner;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

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

    fn scan_and_apply(db: &mut Database, roots: &[&Path]) -> ReconcileSummary {
        let rules = rules();
        let roots: Vec<Location> = roots.iter().map(Location::new).collect();
        let cancel = CancellationToken::new();
        let report = Scanner::new(&LocalFs, &rules).scan(&roots, &cancel, None);
        apply_scan(db, &LocalFs, &rules, &report, &cancel)
    }

    fn db() -> Database {
        Database::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn creates_projects_and_assigns_notes() {
        let tmp = TempDir::new().unwrap();
        let ws = tmp.path().join("ws");
        touch(&ws.join(".marker"));
        touch(&ws.join("notes/note-todo.md"));
        touch(&ws.join("other/deep/note-ideas.txt"));

        let mut db = db();
        let summary = scan_and_apply(&mut db, &[&ws]);

        assert_eq!(summary.projects_created, 1);
        assert_eq!(summary.notes_created, 2);
        assert_eq!(summary.notes_assigned, 2);
        let project = db.project_by_location(&Location::new(&ws)).unwrap();
        assert_eq!(project.name.as_deref(), Some("ws"));
        assert!(db.notes.get_all().all(|n| n.project_id == Some(project.id)));
    }

    #[test]
    fn rescanning_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join(".marker"));
        touch(&tmp.path().join("note-a.md"));

        let mut db = db();
        scan_and_apply(&mut db, &[tmp.path()]);
        let notes: Vec<Note> = db.notes.get_all().cloned().collect();
        let summary = scan_and_apply(&mut db, &[tmp.path()]);

        assert_eq!(summary.notes_created, 0);
        assert_eq!(summary.projects_created, 0);
        assert_eq!(summary.notes_assigned, 0);
        assert_eq!(db.notes.get_all().cloned().collect::<Vec<_>>(), notes);
    }

    #[test]
    fn assigned_notes_are_never_reassigned() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("ws/.marker"));
        touch(&tmp.path().join("ws/note-a.md"));

        let mut db = db();
        db.projects.add_or_update(Project {
            id: 7,
            location: Location::new("/elsewhere"),
            name: None,
        });
        db.notes.add_or_update(Note {
            id: 1,
            location: Location::new(tmp.path().join("ws/note-a.md")),
            project_id: Some(7),
        });

        let summary = scan_and_apply(&mut db, &[tmp.path()]);
        assert_eq!(summary.notes_assigned, 0);
        assert_eq!(db.notes.get_by_id(1).unwrap().project_id, Some(7));
    }

    #[test]
    fn ignored_notes_are_skipped() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("note-a.md"));
        touch(&tmp.path().join("note-b.md"));

        let mut db = db();
        ignore_ops::ignore(&mut db, &Location::new(tmp.path().join("note-a.md")));
        let summary = scan_and_apply(&mut db, &[tmp.path()]);

        assert_eq!(summary.notes_skipped_ignored, 1);
        assert_eq!(db.notes.len(), 1);
        assert!(
            db.note_by_location(&Location::new(tmp.path().join("note-b.md")))
                .is_some()
        );
    }

    #[test]
    fn marker_above_scan_root_creates_project() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("ws/.marker"));
        touch(&tmp.path().join("ws/sub/note-a.md"));

        let mut db = db();
        let summary = scan_and_apply(&mut db, &[&tmp.path().join("ws/sub")]);

        assert_eq!(summary.projects_found, 0);
        assert_eq!(summary.projects_created, 1);
        let project = db
            .project_by_location(&Location::new(tmp.path().join("ws")))
            .unwrap();
        assert_eq!(db.notes.get_by_id(1).unwrap().project_id, Some(project.id));
    }

    #[test]
    fn new_notes_are_written_in_one_batch() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            touch(&tmp.path().join(format!("note-{i}.md")));
        }
        let mut db = db();
        let writes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = writes.clone();
        db.notes.subscribe(move |_| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        scan_and_apply(&mut db, &[tmp.path()]);
        // No markers anywhere, so nothing gets assigned afterwards
        assert_eq!(db.notes.len(), 5);
        assert_eq!(writes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
