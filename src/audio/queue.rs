//! Unbounded inbound playback queue with atomic clear.
//!
//! The receive task pushes model audio without ever blocking; the playback
//! task awaits [`PlaybackQueue::pop`].  On every turn completion the receive
//! task calls [`PlaybackQueue::clear`], which empties the queue under the
//! same lock that `push` takes, so no chunk buffered before the clear can be
//! played after it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

struct Inner {
    items: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
}

/// Cloneable handle to the shared playback queue.
#[derive(Clone)]
pub struct PlaybackQueue {
    inner: Arc<Inner>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
            }),
        }
    }

    /// Append a chunk of PCM16 audio.  Never blocks.
    pub fn push(&self, chunk: Vec<u8>) {
        self.lock().push_back(chunk);
        self.inner.notify.notify_one();
    }

    /// Wait for the next chunk in FIFO order.
    pub async fn pop(&self) -> Vec<u8> {
        loop {
            if let Some(chunk) = self.try_pop() {
                return chunk;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Take the next chunk if one is buffered.
    pub fn try_pop(&self) -> Option<Vec<u8>> {
        self.lock().pop_front()
    }

    /// Discard every buffered chunk and return how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
