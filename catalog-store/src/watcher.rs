//! `notify`-based hot-reload watcher for the file backend (spec.md §4.2,
//! §4.4 "Provider... optionally exposes `Watch(ctx, notify)`"). Grounded in
//! `riptide-persistence`'s use of the `notify` crate for its own
//! filesystem-driven invalidation path.

use std::path::PathBuf;

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Watches `root` for filesystem changes and emits the `(plugin, sourceId)`
/// pair whose `current.yaml` changed, so the Loader can schedule a scoped
/// single-source reload instead of a full plugin reload.
pub struct FileWatcher {
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Spawns the watcher task. Returns a receiver of `(plugin, sourceId)`
    /// change notifications; the task exits when `cancel` fires.
    pub fn start(self, cancel: CancellationToken) -> mpsc::Receiver<(String, String)> {
        let (tx, rx) = mpsc::channel(64);
        let root = self.root;

        tokio::spawn(async move {
            let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
            let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    let _ = raw_tx.send(event);
                }
            }) {
                Ok(w) => w,
                Err(e) => {
                    warn!(error = %e, "failed to start config store file watcher");
                    return;
                }
            };

            if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
                warn!(error = %e, path = %root.display(), "failed to watch config store root");
                return;
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("file watcher shutting down");
                        break;
                    }
                    Some(event) = raw_rx.recv() => {
                        for path in event.paths {
                            if let Some((plugin, source_id)) = parse_source_path(&root, &path) {
                                if tx.send((plugin, source_id)).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        });

        rx
    }
}

/// `<root>/<plugin>/<sourceId>/current.yaml` -> `(plugin, sourceId)`.
fn parse_source_path(root: &std::path::Path, path: &std::path::Path) -> Option<(String, String)> {
    if path.file_name()?.to_str()? != "current.yaml" {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let plugin = components.next()?.as_os_str().to_str()?.to_string();
    let source_id = components.next()?.as_os_str().to_str()?.to_string();
    Some((plugin, source_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_current_yaml_path() {
        let root = std::path::Path::new("/data/sources");
        let path = std::path::Path::new("/data/sources/models/s1/current.yaml");
        assert_eq!(
            parse_source_path(root, path),
            Some(("models".to_string(), "s1".to_string()))
        );
    }

    #[test]
    fn ignores_unrelated_files() {
        let root = std::path::Path::new("/data/sources");
        let path = std::path::Path::new("/data/sources/models/s1/.revision");
        assert_eq!(parse_source_path(root, path), None);
    }
}
