//! User actions on notes and projects.
//!
//! Actions that touch the disk do so before the store is changed, so a
//! failed rename, move or delete leaves the store exactly as it was.

use std::collections::HashSet;
use std::io;

use tracing::{debug, info};

use crate::io::database::Database;
use crate::io::fs::FileSystem;
use crate::model::{EntityId, Location, Note, Project, ScanRules};
use crate::ops::cancel::CancellationToken;
use crate::ops::ignore_ops;
use crate::ops::inference::infer_project;

#[derive(Debug, thiserror::Error)]
pub enum NoteOpError {
    #[error("no note with id {0}")]
    NoteNotFound(EntityId),
    #[error("no project with id {0}")]
    ProjectNotFound(EntityId),
    #[error("{0} already exists")]
    TargetExists(Location),
    #[error("invalid note name: {0:?}")]
    InvalidName(String),
    #[error("could not move {from} to {to}: {source}")]
    RenameFailed {
        from: Location,
        to: Location,
        source: io::Error,
    },
    #[error("could not delete {location}: {source}")]
    DeleteFailed { location: Location, source: io::Error },
    #[error("could not create {location}: {source}")]
    CreateFailed { location: Location, source: io::Error },
}

/// Create a project with the next free id.
pub fn new_project(db: &mut Database, location: Location, name: Option<String>) -> Project {
    let project = Project {
        id: db.projects.next_id(),
        location,
        name,
    };
    db.projects.add_or_update(project.clone());
    project
}

/// Create a note with the next free id.
pub fn new_note(db: &mut Database, location: Location, project_id: Option<EntityId>) -> Note {
    let note = Note {
        id: db.notes.next_id(),
        location,
        project_id,
    };
    db.notes.add_or_update(note.clone());
    note
}

/// Set or clear a project's display name.
pub fn rename_project(
    db: &mut Database,
    project_id: EntityId,
    name: Option<String>,
) -> Result<Project, NoteOpError> {
    let mut project = db
        .projects
        .get_by_id(project_id)
        .cloned()
        .ok_or(NoteOpError::ProjectNotFound(project_id))?;
    project.name = name.filter(|n| !n.trim().is_empty());
    db.projects.add_or_update(project.clone());
    Ok(project)
}

/// Stop tracking a note and remember not to pick it up again.
pub fn remove_note(db: &mut Database, note_id: EntityId) -> Result<Note, NoteOpError> {
    let note = db
        .notes
        .remove_by_id(note_id)
        .ok_or(NoteOpError::NoteNotFound(note_id))?;
    ignore_ops::ignore(db, &note.location);
    info!(note = %note.location, "removed note");
    Ok(note)
}

/// Remove a project together with its notes. Each note is removed as if by
/// [`remove_note`], so it is ignored from then on.
pub fn delete_project(
    db: &mut Database,
    project_id: EntityId,
) -> Result<(Project, Vec<Note>), NoteOpError> {
    if db.projects.get_by_id(project_id).is_none() {
        return Err(NoteOpError::ProjectNotFound(project_id));
    }
    let note_ids: Vec<EntityId> = db
        .notes
        .get_all()
        .filter(|n| n.project_id == Some(project_id))
        .map(|n| n.id)
        .collect();
    let mut removed = Vec::with_capacity(note_ids.len());
    for id in note_ids {
        removed.push(remove_note(db, id)?);
    }
    let project = db
        .projects
        .remove_by_id(project_id)
        .ok_or(NoteOpError::ProjectNotFound(project_id))?;
    info!(project = %project.location, notes = removed.len(), "deleted project");
    Ok((project, removed))
}

/// Move a note to another project, or out of any project with `None`.
pub fn assign_project(
    db: &mut Database,
    note_id: EntityId,
    project_id: Option<EntityId>,
) -> Result<Note, NoteOpError> {
    let mut note = db
        .notes
        .get_by_id(note_id)
        .cloned()
        .ok_or(NoteOpError::NoteNotFound(note_id))?;
    if let Some(id) = project_id
        && db.projects.get_by_id(id).is_none()
    {
        return Err(NoteOpError::ProjectNotFound(id));
    }
    note.project_id = project_id;
    db.notes.add_or_update(note.clone());
    Ok(note)
}

/// Explicitly track `locations`, clearing any ignore entry first.
///
/// Locations that are already tracked are skipped. Returns the notes created.
pub fn import_notes(
    db: &mut Database,
    locations: &[Location],
    project_id: Option<EntityId>,
) -> Result<Vec<Note>, NoteOpError> {
    if let Some(id) = project_id
        && db.projects.get_by_id(id).is_none()
    {
        return Err(NoteOpError::ProjectNotFound(id));
    }

    let mut tracked: HashSet<Location> = db.notes.get_all().map(|n| n.location.clone()).collect();
    let mut next_id = db.notes.next_id();
    let mut created = Vec::new();
    for location in locations {
        ignore_ops::unignore(db, location);
        if !tracked.insert(location.clone()) {
            debug!(note = %location, "already tracked");
            continue;
        }
        created.push(Note {
            id: next_id,
            location: location.clone(),
            project_id,
        });
        next_id += 1;
    }
    if !created.is_empty() {
        db.notes.add_or_update_all(created.clone());
    }
    Ok(created)
}

/// Rename a note's file within its folder.
pub fn rename_note(
    db: &mut Database,
    fs: &dyn FileSystem,
    note_id: EntityId,
    new_name: &str,
) -> Result<Note, NoteOpError> {
    let note = db
        .notes
        .get_by_id(note_id)
        .cloned()
        .ok_or(NoteOpError::NoteNotFound(note_id))?;
    validate_name(new_name)?;

    let target = match note.location.parent() {
        Some(dir) => dir.join(new_name),
        None => Location::new(new_name),
    };
    relocate(db, fs, note, target)
}

/// Move a note's file into a project folder and assign it to that project.
pub fn move_note_to_project(
    db: &mut Database,
    fs: &dyn FileSystem,
    note_id: EntityId,
    project_id: EntityId,
) -> Result<Note, NoteOpError> {
    let mut note = db
        .notes
        .get_by_id(note_id)
        .cloned()
        .ok_or(NoteOpError::NoteNotFound(note_id))?;
    let project = db
        .projects
        .get_by_id(project_id)
        .cloned()
        .ok_or(NoteOpError::ProjectNotFound(project_id))?;

    let target = project.location.join(note.file_name());
    note.project_id = Some(project.id);
    if target == note.location {
        db.notes.add_or_update(note.clone());
        return Ok(note);
    }
    relocate(db, fs, note, target)
}

/// Delete a note's file, then remove the note.
pub fn delete_note_from_disk(
    db: &mut Database,
    fs: &dyn FileSystem,
    note_id: EntityId,
) -> Result<Note, NoteOpError> {
    let note = db
        .notes
        .get_by_id(note_id)
        .cloned()
        .ok_or(NoteOpError::NoteNotFound(note_id))?;
    fs.delete(note.location.as_path())
        .map_err(|source| NoteOpError::DeleteFailed {
            location: note.location.clone(),
            source,
        })?;
    remove_note(db, note_id)
}

/// Outcome of [`auto_import`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoImport {
    NotANote,
    Ignored,
    AlreadyTracked(Note),
    Imported(Note),
}

/// Track a single opened file if it looks like a note.
///
/// The project is inferred from the file's ancestors, preferring projects
/// the database already knows, and created when it is new.
pub fn auto_import(
    db: &mut Database,
    fs: &dyn FileSystem,
    rules: &ScanRules,
    location: &Location,
    cancel: &CancellationToken,
) -> AutoImport {
    if !location.file_name().is_some_and(|n| rules.is_note_name(n)) {
        return AutoImport::NotANote;
    }
    if let Some(note) = db.note_by_location(location) {
        return AutoImport::AlreadyTracked(note.clone());
    }
    if ignore_ops::is_ignored(db, location) {
        debug!(note = %location, "not importing ignored note");
        return AutoImport::Ignored;
    }

    let known: HashSet<Location> = db.projects.get_all().map(|p| p.location.clone()).collect();
    let project_id = match infer_project(fs, rules, location, &known, cancel) {
        None => None,
        Some(project_location) => {
            let existing = db.project_by_location(&project_location).map(|p| p.id);
            Some(existing.unwrap_or_else(|| {
                let name = project_location.file_name().map(str::to_string);
                new_project(db, project_location, name).id
            }))
        }
    };

    let note = new_note(db, location.clone(), project_id);
    info!(note = %note.location, project_id = ?note.project_id, "imported opened note");
    AutoImport::Imported(note)
}

fn validate_name(name: &str) -> Result<(), NoteOpError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || name.contains('/')
        || name.contains(std::path::MAIN_SEPARATOR)
    {
        return Err(NoteOpError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Move the note's file to `target`, then store the note at its new location.
fn relocate(
    db: &mut Database,
    fs: &dyn FileSystem,
    mut note: Note,
    target: Location,
) -> Result<Note, NoteOpError> {
    if fs.exists(target.as_path()) {
        return Err(NoteOpError::TargetExists(target));
    }
    fs.rename(note.location.as_path(), target.as_path())
        .map_err(|source| NoteOpError::RenameFailed {
            from: note.location.clone(),
            to: target.clone(),
            source,
        })?;
    debug!(from = %note.location, to = %target, "moved note file");
    note.location = target;
    db.notes.add_or_update(note.clone());
    Ok(note)
}
