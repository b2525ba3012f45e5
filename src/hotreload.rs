//! Hot-reload watcher
//!
//! We watch **directories** (not individual files) because file replacement on save is often implemented as:
//! write temp → rename/replace → delete old. Directory watching is the most reliable cross-platform approach.
//!
//! The notify callback only maps event paths back to the paths the engine registered and
//! forwards them over a channel. Reading the file and recompiling stay on the render thread.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use shadedit_engine::watch::FileWatch;
use shadedit_engine::{logi, logw};

/// canonical path -> (path as registered with the engine, watch count)
type Registry = Arc<Mutex<BTreeMap<PathBuf, (PathBuf, usize)>>>;

pub struct NotifyWatch {
    watcher: RecommendedWatcher,
    registry: Registry,
    /// Watched parent directories and how many registered files live in each.
    dirs: BTreeMap<PathBuf, usize>,
}

impl NotifyWatch {
    /// Returns the watcher and the receiving end of its change notifications.
    pub fn new() -> anyhow::Result<(Self, Receiver<PathBuf>)> {
        let (tx, rx) = unbounded::<PathBuf>();
        let registry: Registry = Arc::default();
        let lookup = Arc::clone(&registry);

        let watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let Ok(ev) = res else { return };
                // Many editors do "write temp + rename", so creations count as changes too.
                if !matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any) {
                    return;
                }
                let Ok(map) = lookup.lock() else { return };
                for p in ev.paths {
                    if let Some((registered, _)) = map.get(&canonical_key(&p)) {
                        let _ = tx.send(registered.clone());
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_millis(250)),
        )?;

        Ok((Self { watcher, registry, dirs: BTreeMap::new() }, rx))
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.registry
            .lock()
            .map(|m| m.contains_key(&canonical_key(path)))
            .unwrap_or(false)
    }
}

impl FileWatch for NotifyWatch {
    fn watch(&mut self, paths: &[PathBuf]) -> anyhow::Result<()> {
        for path in paths {
            let key = canonical_key(path);
            let dir = parent_dir(&key);
            let fresh = {
                let mut map = self
                    .registry
                    .lock()
                    .map_err(|_| anyhow::anyhow!("watch registry poisoned"))?;
                let slot = map.entry(key).or_insert_with(|| (path.clone(), 0));
                slot.1 += 1;
                slot.1 == 1
            };
            if !fresh {
                continue;
            }
            let count = self.dirs.entry(dir.clone()).or_insert(0);
            if *count == 0 {
                self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
                logi!("WATCH", "watching {}", dir.display());
            }
            *count += 1;
        }
        Ok(())
    }

    fn unwatch(&mut self, paths: &[PathBuf]) -> anyhow::Result<()> {
        for path in paths {
            let key = canonical_key(path);
            // Only the last unwatch of a file releases it.
            let removed = {
                let mut map = self
                    .registry
                    .lock()
                    .map_err(|_| anyhow::anyhow!("watch registry poisoned"))?;
                let left = map.get_mut(&key).map(|slot| {
                    slot.1 -= 1;
                    slot.1
                });
                if left == Some(0) {
                    map.remove(&key);
                }
                left == Some(0)
            };
            if !removed {
                continue;
            }
            let dir = parent_dir(&key);
            if let Some(count) = self.dirs.get_mut(&dir) {
                *count -= 1;
                if *count == 0 {
                    self.dirs.remove(&dir);
                    // The directory may be gone already; nothing left to stop then.
                    if let Err(e) = self.watcher.unwatch(&dir) {
                        logw!("WATCH", "unwatch {}: {e}", dir.display());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Stable identity for a file path: canonical when the file exists, else its
/// canonical parent joined with the file name.
fn canonical_key(path: &Path) -> PathBuf {
    if let Ok(p) = std::fs::canonicalize(path) {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_survives_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("a.frag");
        std::fs::write(&existing, "x").unwrap();
        let missing = dir.path().join("b.frag");

        let base = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(canonical_key(&existing), base.join("a.frag"));
        assert_eq!(canonical_key(&missing), base.join("b.frag"));
    }

    #[test]
    fn watch_and_unwatch_track_registered_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.frag");
        let b = dir.path().join("b.frag");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        let (mut w, _rx) = NotifyWatch::new().unwrap();
        w.watch(&[a.clone(), b.clone()]).unwrap();
        assert!(w.is_watching(&a));
        assert_eq!(w.dirs.len(), 1);

        w.unwatch(&[a.clone()]).unwrap();
        assert!(!w.is_watching(&a));
        assert_eq!(w.dirs.values().copied().collect::<Vec<_>>(), vec![1]);

        w.unwatch(&[b]).unwrap();
        assert!(w.dirs.is_empty());
    }

    #[test]
    fn shared_files_stay_watched_until_the_last_unwatch() {
        let dir = tempfile::tempdir().unwrap();
        let shared = dir.path().join("shared.vert");
        std::fs::write(&shared, "v").unwrap();

        let (mut w, _rx) = NotifyWatch::new().unwrap();
        w.watch(&[shared.clone()]).unwrap();
        w.watch(&[shared.clone()]).unwrap();
        assert_eq!(w.dirs.values().copied().collect::<Vec<_>>(), vec![1]);

        w.unwatch(&[shared.clone()]).unwrap();
        assert!(w.is_watching(&shared));
        assert_eq!(w.dirs.len(), 1);

        w.unwatch(&[shared.clone()]).unwrap();
        assert!(!w.is_watching(&shared));
        assert!(w.dirs.is_empty());
    }

    #[test]
    fn edits_are_reported_with_the_registered_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.frag");
        std::fs::write(&a, "a").unwrap();

        let (mut w, rx) = NotifyWatch::new().unwrap();
        w.watch(&[a.clone()]).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        std::fs::write(&a, "changed").unwrap();

        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got, a);
    }
}
