//! Recursive directory scan for notes and project markers.
//!
//! Each root is walked depth-first. Subdirectory expansions run on scoped
//! worker threads while the [`ScanGate`] has permits left; once it is full,
//! further subdirectories are walked inline by the thread that found them.
//! I/O errors are logged and only cost the subtree they happened in, and a
//! cancelled scan returns whatever it had already found.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, Scope};

use tracing::{debug, info, trace, warn};

use crate::io::fs::FileSystem;
use crate::model::{Location, ScanRules};
use crate::ops::cancel::CancellationToken;

/// Folders at most this deep are logged as they are entered.
const MAX_LOGGED_DEPTH: usize = 3;

/// Receives free-text status updates while a scan runs.
pub trait Progress: Sync {
    fn report(&self, message: &str);
}

impl<F: Fn(&str) + Sync> Progress for F {
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Admission control for concurrent directory expansions.
///
/// A soft limit: when no permit is left the caller does the work itself
/// instead of waiting or giving up.
#[derive(Debug)]
pub struct ScanGate {
    active: AtomicUsize,
    limit: usize,
}

impl ScanGate {
    pub fn new(limit: usize) -> Self {
        ScanGate {
            active: AtomicUsize::new(0),
            limit,
        }
    }

    /// Take a permit if fewer than `limit` are out.
    pub fn try_acquire(&self) -> Option<ScanPermit<'_>> {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.limit {
                return None;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(ScanPermit { gate: self }),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Released when dropped.
#[derive(Debug)]
pub struct ScanPermit<'a> {
    gate: &'a ScanGate,
}

impl Drop for ScanPermit<'_> {
    fn drop(&mut self) {
        self.gate.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// What one root yielded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFindings {
    pub root: Location,
    pub notes: BTreeSet<Location>,
    /// Directories holding a project marker
    pub projects: BTreeSet<Location>,
}

impl RootFindings {
    fn new(root: Location) -> Self {
        RootFindings {
            root,
            notes: BTreeSet::new(),
            projects: BTreeSet::new(),
        }
    }
}

/// Result of [`Scanner::scan`]
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub roots: Vec<RootFindings>,
    /// Set when the scan stopped early; findings are then partial.
    pub cancelled: bool,
}

impl ScanReport {
    /// All note locations, across roots, without duplicates.
    pub fn note_locations(&self) -> BTreeSet<Location> {
        self.roots.iter().flat_map(|r| r.notes.iter().cloned()).collect()
    }

    /// All project locations, across roots, without duplicates.
    pub fn project_locations(&self) -> BTreeSet<Location> {
        self.roots
            .iter()
            .flat_map(|r| r.projects.iter().cloned())
            .collect()
    }
}

pub struct Scanner<'a> {
    fs: &'a dyn FileSystem,
    rules: &'a ScanRules,
}

impl<'a> Scanner<'a> {
    pub fn new(fs: &'a dyn FileSystem, rules: &'a ScanRules) -> Self {
        Scanner { fs, rules }
    }

    /// Scan every root for notes and project markers.
    pub fn scan(
        &self,
        roots: &[Location],
        cancel: &CancellationToken,
        progress: Option<&dyn Progress>,
    ) -> ScanReport {
        cancel.on_cancel(|| info!("scan cancelled"));
        if let Some(progress) = progress {
            progress.report("Scanning notes...");
        }

        let gate = ScanGate::new(self.rules.max_concurrency);
        let mut report = ScanReport::default();
        for root in roots {
            if cancel.is_cancelled() {
                break;
            }
            debug!(root = %root, "scanning root");
            report.roots.push(self.scan_root(root, &gate, cancel, progress));
        }
        report.cancelled = cancel.is_cancelled();
        report
    }

    fn scan_root(
        &self,
        root: &Location,
        gate: &ScanGate,
        cancel: &CancellationToken,
        progress: Option<&dyn Progress>,
    ) -> RootFindings {
        let walk = Walk {
            fs: self.fs,
            rules: self.rules,
            gate,
            cancel,
            progress,
            findings: Mutex::new(RootFindings::new(root.clone())),
        };

        match self.fs.stat(root.as_path()) {
            Err(e) => {
                warn!(path = %root, error = %e, "could not stat scan root");
            }
            Ok(stat) if !stat.is_dir => {
                if root.file_name().is_some_and(|n| self.rules.is_note_name(n)) {
                    walk.found_note(root.clone());
                }
            }
            Ok(_) => {
                thread::scope(|scope| walk.expand(scope, root.clone(), 0));
            }
        }

        walk.findings.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared state of one root's traversal.
struct Walk<'a> {
    fs: &'a dyn FileSystem,
    rules: &'a ScanRules,
    gate: &'a ScanGate,
    cancel: &'a CancellationToken,
    progress: Option<&'a dyn Progress>,
    findings: Mutex<RootFindings>,
}

impl Walk<'_> {
    fn expand<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        dir: Location,
        depth: usize,
    ) {
        if self.cancel.is_cancelled() {
            return;
        }

        let name = dir.file_name().unwrap_or("");
        if !self.rules.should_scan_folder(name) {
            debug!(folder = %dir, "skipping folder, name does not match");
            return;
        }
        if depth <= MAX_LOGGED_DEPTH {
            debug!(folder = %dir, depth, "scanning folder");
        }

        let entries = match self.fs.list_directory(dir.as_path()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(folder = %dir, error = %e, "could not list folder");
                return;
            }
        };

        let descend = depth < self.rules.max_recursion_depth;
        let mut subdirs = Vec::new();
        for entry in entries {
            if self.rules.is_project_marker(&entry.name) {
                self.found_project(dir.clone());
            } else if !entry.is_dir && self.rules.is_note_name(&entry.name) {
                self.found_note(dir.join(&entry.name));
            }
            if entry.is_dir && descend {
                subdirs.push(dir.join(&entry.name));
            }
        }

        for child in subdirs {
            if self.cancel.is_cancelled() {
                return;
            }
            match self.gate.try_acquire() {
                Some(permit) => {
                    scope.spawn(move || {
                        let _permit = permit;
                        self.expand(scope, child, depth + 1);
                    });
                }
                None => self.expand(scope, child, depth + 1),
            }
        }
    }

    fn found_note(&self, location: Location) {
        trace!(note = %location, "found note");
        if let Some(progress) = self.progress {
            progress.report(&format!(
                "Found note \"{}\"",
                location.file_name().unwrap_or_default()
            ));
        }
        self.lock().notes.insert(location);
    }

    fn found_project(&self, location: Location) {
        let mut findings = self.lock();
        if findings.projects.insert(location.clone()) {
            drop(findings);
            debug!(project = %location, "found project");
            if let Some(progress) = self.progress {
                progress.report(&format!("Found project \"{}\"", location));
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RootFindings> {
        self.findings.lock().unwrap_or_else(|e| e.into_inner())
    }
}
