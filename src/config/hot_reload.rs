//! Configuration hot-reload functionality.
//!
//! `notify` delivers events on its own thread. Events naming the config file
//! are forwarded over a channel to a dedicated invalidation thread, which
//! coalesces bursts and starts a new cache epoch.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::cache::ResolutionCache;
use crate::error::WatcherError;
use crate::validation::paths;

/// Default window in which consecutive events collapse into one invalidation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// A burst is cut off after this many debounce windows, even if events keep arriving.
const MAX_BURST_WINDOWS: u32 = 10;

/// Messages consumed by the invalidation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchSignal {
    /// The config file was created, modified or removed.
    Changed,
    /// Stop the thread.
    Shutdown,
}

/// Watches the configuration file and invalidates a cache when it changes.
pub struct ConfigWatcher {
    config_path: PathBuf,
    cache: Arc<ResolutionCache>,
    debounce: Duration,
}

impl ConfigWatcher {
    /// Creates a watcher for `config_path` bound to `cache`.
    pub fn new(config_path: &Path, cache: Arc<ResolutionCache>) -> Self {
        Self {
            config_path: config_path.to_path_buf(),
            cache,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Sets the coalescing window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Starts watching the file's parent directory.
    ///
    /// The file itself need not exist yet; its first creation invalidates the cache.
    pub fn start(self) -> Result<WatcherHandle, WatcherError> {
        let watch_dir = watch_directory(&self.config_path);
        let file_name = self
            .config_path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| WatcherError::WatchFailed {
                path: self.config_path.clone(),
                message: "config path has no file name".to_string(),
            })?;

        let (tx, rx) = mpsc::channel();

        let event_tx = tx.clone();
        let target = file_name.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_config_change(&event, &target) {
                        let _ = event_tx.send(WatchSignal::Changed);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: watch_dir.clone(),
                message: e.to_string(),
            })?;

        let config_path = self.config_path.clone();
        let cache = self.cache;
        let debounce = self.debounce;
        let thread = std::thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || handle_changes(rx, &config_path, &cache, debounce))
            .map_err(|e| WatcherError::WatchFailed {
                path: watch_dir.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(
            path = %self.config_path.display(),
            directory = %watch_dir.display(),
            "Config watcher started"
        );

        Ok(WatcherHandle {
            watcher: Some(watcher),
            tx,
            thread: Some(thread),
        })
    }
}

/// Owns the OS watch and the invalidation thread.
pub struct WatcherHandle {
    watcher: Option<RecommendedWatcher>,
    tx: mpsc::Sender<WatchSignal>,
    thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Releases the OS watch and blocks until the invalidation thread exits.
    pub fn stop(&mut self) {
        // Dropping the watcher releases the inotify/FSEvents handle.
        self.watcher.take();
        let _ = self.tx.send(WatchSignal::Shutdown);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Config watcher thread panicked");
            }
            tracing::info!("Config watcher stopped");
        }
    }

    /// True until [`WatcherHandle::stop`] has run.
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consumes signals until shutdown, invalidating once per burst.
fn handle_changes(
    rx: mpsc::Receiver<WatchSignal>,
    config_path: &Path,
    cache: &ResolutionCache,
    debounce: Duration,
) {
    while let Ok(signal) = rx.recv() {
        if signal == WatchSignal::Shutdown {
            return;
        }

        // Editors emit several events per save.
        let shutdown = drain_burst(&rx, debounce);

        let gate_open = paths::is_usable(config_path);
        let generation = cache.invalidate(gate_open);
        tracing::info!(
            path = %config_path.display(),
            generation,
            gate_open,
            "Config file changed, cache invalidated"
        );

        if shutdown {
            return;
        }
    }
}

/// Swallows the rest of a burst, returning true if shutdown was requested.
///
/// Returns after a quiet `debounce` window or once the burst has lasted
/// `MAX_BURST_WINDOWS` windows.
fn drain_burst(rx: &mpsc::Receiver<WatchSignal>, debounce: Duration) -> bool {
    let deadline = Instant::now() + debounce * MAX_BURST_WINDOWS;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        match rx.recv_timeout(debounce.min(remaining)) {
            Ok(WatchSignal::Changed) => continue,
            Ok(WatchSignal::Shutdown) | Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
        }
    }
}

/// The directory to watch: the file's parent, or `.` for a bare file name.
fn watch_directory(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// True for create/modify/remove events naming the config file.
fn is_config_change(event: &Event, file_name: &OsString) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );

    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
