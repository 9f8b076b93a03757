use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::model::config::ScanRules;

/// Events sent from the watcher to the caller's loop.
#[derive(Debug)]
pub enum NoteEvent {
    /// Note files were created or written to.
    Touched(Vec<PathBuf>),
}

/// Watches folders for note files being created or saved.
///
/// This stands in for an editor's "document opened" hook: each touched path
/// is a candidate for auto-import.
pub struct NoteWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<NoteEvent>,
}

impl NoteWatcher {
    /// Start watching every root recursively.
    pub fn start(roots: &[PathBuf], rules: &ScanRules) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let rules = rules.clone();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "watch error");
                        return;
                    }
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => {}
                    _ => return,
                }

                let mut touched: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| p.is_file())
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|name| rules.is_note_name(name))
                    })
                    .collect();
                touched.dedup();

                if !touched.is_empty() {
                    let _ = tx.send(NoteEvent::Touched(touched));
                }
            },
            Config::default(),
        )?;

        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }
        Ok(NoteWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending events.
    pub fn poll(&self) -> Vec<NoteEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Block up to `timeout` for the next event.
    pub fn wait(&self, timeout: Duration) -> Option<NoteEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Flatten a batch of events into distinct paths, keeping first-seen order.
pub fn touched_paths(events: Vec<NoteEvent>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for NoteEvent::Touched(batch) in events {
        for path in batch {
            if !paths.iter().any(|p| p == &path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Whether `path` lies under any of `roots`.
pub fn is_under_roots(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touched_paths_are_deduplicated_in_order() {
        let events = vec![
            NoteEvent::Touched(vec![PathBuf::from("/ws/a.md"), PathBuf::from("/ws/b.md")]),
            NoteEvent::Touched(vec![PathBuf::from("/ws/a.md"), PathBuf::from("/ws/c.md")]),
        ];
        assert_eq!(
            touched_paths(events),
            vec![
                PathBuf::from("/ws/a.md"),
                PathBuf::from("/ws/b.md"),
                PathBuf::from("/ws/c.md"),
            ]
        );
    }

    #[test]
    fn root_membership() {
        let roots = vec![PathBuf::from("/ws"), PathBuf::from("/notes")];
        assert!(is_under_roots(Path::new("/ws/deep/a.md"), &roots));
        assert!(!is_under_roots(Path::new("/wsx/a.md"), &roots));
    }
}
