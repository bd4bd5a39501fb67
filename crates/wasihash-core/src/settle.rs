//! One-shot, first-writer-wins settlement of a pending request.
//!
//! A request races several producers (output watcher, sandbox failure,
//! timeout). Each holds a [`Settler`]; the first call to [`Settler::settle`]
//! delivers its value to the single [`Settlement`] receiver and every later
//! call is a no-op returning `false`. The `settled` flag makes double
//! settlement structurally impossible rather than a calling convention.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

struct Inner<T> {
    settled: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

/// Producer handle. Cheap to clone; all clones share one settled flag.
pub struct Settler<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Settler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Settler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settler")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T> Settler<T> {
    /// Deliver `value` if nothing has settled yet.
    ///
    /// Returns `true` only for the call that won the race.
    pub fn settle(&self, value: T) -> bool {
        if self
            .inner
            .settled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let tx = self
            .inner
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(tx) = tx {
            // Receiver may already be gone (request dropped); the race is still won.
            let _ = tx.send(value);
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.inner.settled.load(Ordering::SeqCst)
    }
}

/// Consumer side: resolves with the winning value.
#[derive(Debug)]
pub struct Settlement<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Settlement<T> {
    /// Create a linked settler/settlement pair.
    pub fn channel() -> (Settler<T>, Self) {
        let (tx, rx) = oneshot::channel();
        let settler = Settler {
            inner: Arc::new(Inner {
                settled: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
            }),
        };
        (settler, Self { rx })
    }

    /// Wait for the winning value.
    ///
    /// Returns `None` if every settler was dropped without settling.
    pub async fn wait(self) -> Option<T> {
        self.rx.await.ok()
    }
}
