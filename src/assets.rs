use crate::mesh::{load_asset, AssetImport};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetLoadState {
    Loading,
    Ready,
    Failed,
}

impl AssetLoadState {
    pub fn label(self) -> &'static str {
        match self {
            AssetLoadState::Loading => "loading…",
            AssetLoadState::Ready => "loaded",
            AssetLoadState::Failed => "failed",
        }
    }
}

/// One-shot background glTF load. The import runs on its own thread and the
/// app polls once per frame; there is no timeout and no cancellation, so a
/// hung or failed load just leaves the scene without its asset.
pub struct AssetLoader {
    path: PathBuf,
    receiver: Option<Receiver<Result<AssetImport>>>,
    state: AssetLoadState,
}

impl AssetLoader {
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();
        let worker_path = path.clone();
        let spawned = thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || {
                let _ = sender.send(load_asset(&worker_path));
            });
        match spawned {
            Ok(_) => Self { path, receiver: Some(receiver), state: AssetLoadState::Loading },
            Err(err) => {
                log::error!("could not spawn asset loader thread: {err}");
                Self { path, receiver: None, state: AssetLoadState::Failed }
            }
        }
    }

    pub fn state(&self) -> AssetLoadState {
        self.state
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Yields the finished import at most once.
    pub fn poll(&mut self) -> Option<AssetImport> {
        let receiver = self.receiver.as_ref()?;
        match receiver.try_recv() {
            Ok(Ok(import)) => {
                self.state = AssetLoadState::Ready;
                self.receiver = None;
                Some(import)
            }
            Ok(Err(err)) => {
                log::error!("asset load failed for {}: {err:?}", self.path.display());
                self.state = AssetLoadState::Failed;
                self.receiver = None;
                None
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("asset loader thread for {} exited without a result", self.path.display());
                self.state = AssetLoadState::Failed;
                self.receiver = None;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_file_resolves_to_failed_without_panicking() {
        let mut loader = AssetLoader::spawn("definitely/not/here.glb");
        for _ in 0..200 {
            assert!(loader.poll().is_none());
            if loader.state() == AssetLoadState::Failed {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("loader never resolved");
    }
}
