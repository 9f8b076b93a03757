use crate::io::database::Database;
use crate::model::{IgnoredNote, Location};

/// Whether scans and auto-import should skip `location`.
pub fn is_ignored(db: &Database, location: &Location) -> bool {
    db.ignored_notes
        .find(|ignored| &ignored.location == location)
        .is_some()
}

/// Record `location` as ignored. Recording it twice keeps a single entry.
pub fn ignore(db: &mut Database, location: &Location) {
    if is_ignored(db, location) {
        return;
    }
    let id = db.ignored_notes.next_id();
    db.ignored_notes.add_or_update(IgnoredNote {
        id,
        location: location.clone(),
    });
}

/// Forget that `location` was ignored. Returns whether anything was removed.
pub fn unignore(db: &mut Database, location: &Location) -> bool {
    let ids: Vec<_> = db
        .ignored_notes
        .get_all()
        .filter(|ignored| &ignored.location == location)
        .map(|ignored| ignored.id)
        .collect();
    for id in &ids {
        db.ignored_notes.remove_by_id(*id);
    }
    !ids.is_empty()
}

/// Every ignored location, sorted.
pub fn ignored_locations(db: &Database) -> Vec<Location> {
    let mut locations: Vec<Location> = db
        .ignored_notes
        .get_all()
        .map(|ignored| ignored.location.clone())
        .collect();
    locations.sort();
    locations
}

/// Drop every ignore record. Returns how many there were.
pub fn clear_ignored(db: &mut Database) -> usize {
    let count = db.ignored_notes.len();
    if count > 0 {
        db.ignored_notes.clear();
    }
    count
}
