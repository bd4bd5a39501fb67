//! Output channel watcher using the `notify` crate.
//!
//! Provides:
//! - `OutputWatcher` -- owns one temp file and the watch on it
//! - `WatchSignal` -- content observed / error, delivered over a channel
//!
//! The sandboxed module can only talk to the host through files, so its
//! digest arrives as a write to a pre-created temp file. Each change event
//! triggers a full re-read of the file; a newer event cancels the read of an
//! older one so superseded reads never report.

use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wasihash_types::error::{CleanupError, WatchError};

const READ_CHUNK_SIZE: usize = 8 * 1024;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Outcome observed on the output file.
#[derive(Debug)]
pub enum WatchSignal {
    /// Full file contents after a write.
    Content(Vec<u8>),
    /// Creating, watching or reading the file failed.
    Error(WatchError),
}

/// Receiver side of a started watcher.
pub type WatchSignals = mpsc::UnboundedReceiver<WatchSignal>;

// ---------------------------------------------------------------------------
// ReadTracker
// ---------------------------------------------------------------------------

/// Tracks the single in-flight read of the output file.
///
/// Every change event claims a new generation; completions from older
/// generations are rejected even if their task finished before it could be
/// aborted.
#[derive(Debug, Default)]
struct ReadTracker {
    generation: u64,
    current: Option<JoinHandle<()>>,
}

impl ReadTracker {
    /// Abort the in-flight read, if any, and claim the next generation.
    fn supersede(&mut self) -> u64 {
        if let Some(previous) = self.current.take() {
            previous.abort();
        }
        self.generation += 1;
        self.generation
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.current = Some(handle);
    }

    /// Accept a completed read only if it is the latest one.
    fn complete(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.current = None;
        true
    }

    fn cancel(&mut self) {
        if let Some(current) = self.current.take() {
            current.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// OutputWatcher
// ---------------------------------------------------------------------------

/// Watches one temp file for the sandbox's output.
///
/// `stop()` is idempotent and also runs on drop, so the watch is always
/// closed and the temp file always removed exactly once.
pub struct OutputWatcher {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    cancel: CancellationToken,
    stopped: bool,
}

impl OutputWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watcher: None,
            cancel: CancellationToken::new(),
            stopped: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a filesystem watch is currently registered.
    pub fn is_armed(&self) -> bool {
        self.watcher.is_some()
    }

    /// Create the output file if needed and register the watch.
    ///
    /// The watch is registered before this returns, so anything written
    /// afterwards is observed. Failures are delivered as
    /// [`WatchSignal::Error`] on the returned channel rather than returned.
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> WatchSignals {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        if self.stopped || self.watcher.is_some() {
            tracing::warn!(path = %self.path.display(), "output watcher already started");
            return signal_rx;
        }

        if let Err(err) = ensure_file(&self.path) {
            let _ = signal_tx.send(WatchSignal::Error(err));
            return signal_rx;
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            // Receiver is gone once the pump has stopped.
            let _ = event_tx.send(result);
        })
        .and_then(|mut watcher| {
            watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });

        match watcher {
            Ok(watcher) => {
                self.watcher = Some(watcher);
                tokio::spawn(pump(
                    self.path.clone(),
                    event_rx,
                    signal_tx,
                    self.cancel.clone(),
                ));
                tracing::debug!(path = %self.path.display(), "output watcher armed");
            }
            Err(err) => {
                let _ = signal_tx.send(WatchSignal::Error(WatchError::Watch {
                    path: self.path.display().to_string(),
                    reason: err.to_string(),
                }));
            }
        }

        signal_rx
    }

    /// Cancel any in-flight read, close the watch and delete the temp file.
    ///
    /// Safe to call more than once. Cleanup failures are logged, never
    /// returned, so they cannot mask the request's outcome.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.cancel.cancel();

        if let Some(mut watcher) = self.watcher.take() {
            if let Err(err) = watcher.unwatch(&self.path) {
                log_cleanup(CleanupError::CloseWatch {
                    path: self.path.display().to_string(),
                    reason: err.to_string(),
                });
            }
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "temp file already removed");
            }
            Err(err) => log_cleanup(CleanupError::RemoveTempFile {
                path: self.path.display().to_string(),
                reason: err.to_string(),
            }),
        }

        tracing::debug!(path = %self.path.display(), "output watcher stopped");
    }
}

impl Drop for OutputWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_cleanup(err: CleanupError) {
    tracing::warn!(error = %err, "output watcher cleanup failed");
}

fn ensure_file(path: &Path) -> Result<(), WatchError> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, []).map_err(|e| WatchError::CreateFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Events that mean the file's contents may have changed.
fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

// ---------------------------------------------------------------------------
// Event pump
// ---------------------------------------------------------------------------

/// Turn raw notify events into signals until cancelled.
async fn pump(
    path: PathBuf,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    signals: mpsc::UnboundedSender<WatchSignal>,
    cancel: CancellationToken,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(u64, Result<Vec<u8>, WatchError>)>();
    let mut reads = ReadTracker::default();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            event = events.recv() => match event {
                None => break,
                Some(Ok(event)) if is_change(&event.kind) => {
                    let generation = reads.supersede();
                    let path = path.clone();
                    let done_tx = done_tx.clone();
                    reads.track(tokio::spawn(async move {
                        let _ = done_tx.send((generation, read_output(&path).await));
                    }));
                }
                Some(Ok(event)) if matches!(event.kind, EventKind::Remove(_)) => {
                    let _ = signals.send(WatchSignal::Error(WatchError::Watch {
                        path: path.display().to_string(),
                        reason: "output file was removed while watched".to_string(),
                    }));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(path = %path.display(), error = %err, "output watcher error");
                    let _ = signals.send(WatchSignal::Error(WatchError::Watch {
                        path: path.display().to_string(),
                        reason: err.to_string(),
                    }));
                }
            },

            Some((generation, result)) = done_rx.recv() => {
                if !reads.complete(generation) {
                    tracing::trace!(generation, "discarding superseded read");
                    continue;
                }
                match result {
                    Ok(content) if content.is_empty() => {
                        tracing::trace!(path = %path.display(), "ignoring empty read");
                    }
                    Ok(content) => {
                        let _ = signals.send(WatchSignal::Content(content));
                    }
                    Err(err) => {
                        let _ = signals.send(WatchSignal::Error(err));
                    }
                }
            }
        }
    }

    reads.cancel();
}

/// Read the whole file as a sequence of chunks and join them.
async fn read_output(path: &Path) -> Result<Vec<u8>, WatchError> {
    let read_error = |e: std::io::Error| WatchError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let mut file = tokio::fs::File::open(path).await.map_err(read_error)?;
    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await.map_err(read_error)?;
        if n == 0 {
            break;
        }
        chunks.push(buf[..n].to_vec());
    }
    Ok(chunks.concat())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn next_content(signals: &mut WatchSignals) -> Vec<u8> {
        match timeout(WAIT, signals.recv()).await {
            Ok(Some(WatchSignal::Content(content))) => content,
            other => panic!("expected content signal, got {other:?}"),
        }
    }

    // -------------------------------------------------------------------
    // ReadTracker
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_supersede_aborts_in_flight_read() {
        let mut reads = ReadTracker::default();
        let (alive_tx, alive_rx) = oneshot::channel::<()>();

        reads.supersede();
        reads.track(tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        }));

        reads.supersede();

        // The aborted task drops its sender without sending.
        assert!(timeout(WAIT, alive_rx).await.unwrap().is_err());
    }

    #[test]
    fn test_complete_rejects_stale_generation() {
        let mut reads = ReadTracker::default();
        let first = reads.supersede();
        let second = reads.supersede();

        assert!(!reads.complete(first), "superseded read must be discarded");
        assert!(reads.complete(second));
    }

    // -------------------------------------------------------------------
    // is_change
    // -------------------------------------------------------------------

    #[test]
    fn test_is_change_kinds() {
        use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

        assert!(is_change(&EventKind::Modify(ModifyKind::Data(DataChange::Any))));
        assert!(is_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_change(&EventKind::Access(AccessKind::Close(AccessMode::Write))));
        assert!(!is_change(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))));
        assert!(!is_change(&EventKind::Create(CreateKind::File)));
        assert!(!is_change(&EventKind::Remove(RemoveKind::File)));
    }

    // -------------------------------------------------------------------
    // OutputWatcher lifecycle
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_creates_empty_file_and_arms() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        let mut watcher = OutputWatcher::new(&path);

        let _signals = watcher.start();

        assert!(watcher.is_armed());
        assert_eq!(std::fs::read(&path).unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn test_start_in_missing_dir_reports_create_error() {
        let dir = TempDir::new().unwrap();
        let mut watcher = OutputWatcher::new(dir.path().join("missing/out"));

        let mut signals = watcher.start();

        match signals.recv().await {
            Some(WatchSignal::Error(WatchError::CreateFile { .. })) => {}
            other => panic!("expected CreateFile error, got {other:?}"),
        }
        assert!(!watcher.is_armed());
    }

    #[tokio::test]
    async fn test_write_emits_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        let mut watcher = OutputWatcher::new(&path);
        let mut signals = watcher.start();

        std::fs::write(&path, [0xde, 0xad, 0xbe, 0xef]).unwrap();

        assert_eq!(next_content(&mut signals).await, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[tokio::test]
    async fn test_first_content_is_never_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        let mut watcher = OutputWatcher::new(&path);
        let mut signals = watcher.start();

        // Truncating the already-empty file must not be reported.
        std::fs::File::create(&path).unwrap();
        std::fs::write(&path, b"x").unwrap();

        assert_eq!(next_content(&mut signals).await, b"x".to_vec());
    }

    #[tokio::test]
    async fn test_rapid_double_write_settles_on_last_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        let mut watcher = OutputWatcher::new(&path);
        let mut signals = watcher.start();

        std::fs::write(&path, b"first").unwrap();
        std::fs::write(&path, b"second").unwrap();

        let mut last = Vec::new();
        while last != b"second" {
            last = next_content(&mut signals).await;
        }

        // Nothing observed after the final write may differ from it.
        while let Ok(Some(signal)) = timeout(Duration::from_millis(300), signals.recv()).await {
            match signal {
                WatchSignal::Content(content) => assert_eq!(content, b"second"),
                WatchSignal::Error(err) => panic!("unexpected error: {err}"),
            }
        }
    }

    #[tokio::test]
    async fn test_removed_file_reports_watch_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        let mut watcher = OutputWatcher::new(&path);
        let mut signals = watcher.start();

        std::fs::remove_file(&path).unwrap();

        loop {
            match timeout(WAIT, signals.recv()).await {
                Ok(Some(WatchSignal::Error(WatchError::Watch { .. }))) => break,
                Ok(Some(WatchSignal::Content(_))) => continue,
                other => panic!("expected watch error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_stop_removes_file_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        let mut watcher = OutputWatcher::new(&path);
        let _signals = watcher.start();
        assert!(path.exists());

        watcher.stop();
        assert!(!path.exists());
        assert!(!watcher.is_armed());

        watcher.stop();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stop_closes_signal_channel() {
        let dir = TempDir::new().unwrap();
        let mut watcher = OutputWatcher::new(dir.path().join("out"));
        let mut signals = watcher.start();

        watcher.stop();

        assert!(matches!(timeout(WAIT, signals.recv()).await, Ok(None)));
    }

    #[tokio::test]
    async fn test_drop_stops_watcher() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        {
            let mut watcher = OutputWatcher::new(&path);
            let _signals = watcher.start();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_start_after_stop_is_inert() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        let mut watcher = OutputWatcher::new(&path);
        watcher.stop();

        let mut signals = watcher.start();

        assert!(!watcher.is_armed());
        assert!(!path.exists());
        assert!(signals.recv().await.is_none());
    }
}
