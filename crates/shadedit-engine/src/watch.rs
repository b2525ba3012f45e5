use std::path::PathBuf;

/// File-watch collaborator.
///
/// Watches are counted: a path watched twice stays watched until it has been
/// unwatched twice. Implementations report changes out of band; the host feeds
/// them back in through `Engine::file_changed` or an `Update_File` message.
pub trait FileWatch {
    fn watch(&mut self, paths: &[PathBuf]) -> anyhow::Result<()>;
    fn unwatch(&mut self, paths: &[PathBuf]) -> anyhow::Result<()>;
}

/// Watches nothing. Used when live reload is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatch;

impl FileWatch for NullWatch {
    fn watch(&mut self, _paths: &[PathBuf]) -> anyhow::Result<()> {
        Ok(())
    }

    fn unwatch(&mut self, _paths: &[PathBuf]) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use super::*;

    /// Keeps every watched path with its watch count, shared with the test.
    #[derive(Debug, Default, Clone)]
    pub struct RecordingWatch {
        pub watched: Rc<RefCell<BTreeMap<PathBuf, usize>>>,
    }

    impl FileWatch for RecordingWatch {
        fn watch(&mut self, paths: &[PathBuf]) -> anyhow::Result<()> {
            let mut w = self.watched.borrow_mut();
            for p in paths {
                *w.entry(p.clone()).or_insert(0) += 1;
            }
            Ok(())
        }

        fn unwatch(&mut self, paths: &[PathBuf]) -> anyhow::Result<()> {
            let mut w = self.watched.borrow_mut();
            for p in paths {
                if let Some(n) = w.get_mut(p) {
                    *n -= 1;
                    if *n == 0 {
                        w.remove(p);
                    }
                }
            }
            Ok(())
        }
    }
}
