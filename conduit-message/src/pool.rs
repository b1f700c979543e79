use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use crate::envelope::{EnvelopeCell, EnvelopeState, MessageEnvelope};
use crate::message::Message;

pub(crate) struct PoolInner {
    slots: Vec<Mutex<EnvelopeState>>,
    free: Mutex<VecDeque<usize>>,
    semaphore: Semaphore,
}

impl PoolInner {
    pub(crate) fn reset_and_free(&self, slot: usize) {
        {
            let mut state = self.slots[slot].lock().unwrap();
            state.reset();
        }
        self.free.lock().unwrap().push_back(slot);
        self.semaphore.add_permits(1);
    }

    pub(crate) fn with_state<R>(&self, slot: usize, f: impl FnOnce(&EnvelopeState) -> R) -> R {
        f(&self.slots[slot].lock().unwrap())
    }

    pub(crate) fn with_state_mut<R>(
        &self,
        slot: usize,
        f: impl FnOnce(&mut EnvelopeState) -> R,
    ) -> R {
        f(&mut self.slots[slot].lock().unwrap())
    }
}

/// A fixed-size pool of reusable message envelopes.
///
/// Envelopes are handed out via [`MessagePool::acquire`], which blocks (by
/// waiting on an internal semaphore) when the pool is exhausted. An envelope
/// returns to the pool automatically once its last clone is dropped — the
/// [`MessageEnvelope`] handle is reference-counted the way `Arc` is, so
/// there is no separate `release` call a caller could mistakenly make twice:
/// a double-release is unrepresentable rather than a bug to detect, since
/// the zero-transition is `Drop`, which Rust guarantees runs at most once
/// per handle.
#[derive(Clone)]
pub struct MessagePool {
    inner: Arc<PoolInner>,
}

impl MessagePool {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "message pool capacity must be non-zero");
        let mut slots = Vec::with_capacity(capacity);
        let mut free = VecDeque::with_capacity(capacity);
        for i in 0..capacity {
            slots.push(Mutex::new(EnvelopeState::empty(Message::new("", ""))));
            free.push_back(i);
        }
        MessagePool {
            inner: Arc::new(PoolInner {
                slots,
                free: Mutex::new(free),
                semaphore: Semaphore::new(capacity),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    /// Number of envelopes currently checked out.
    pub fn in_use(&self) -> usize {
        self.capacity() - self.inner.free.lock().unwrap().len()
    }

    /// Acquires an envelope, blocking until one is free.
    pub async fn acquire(&self) -> MessageEnvelope {
        let permit = self
            .inner
            .semaphore
            .acquire()
            .await
            .expect("pool semaphore is never closed while the pool is alive");
        permit.forget();
        let slot = self
            .inner
            .free
            .lock()
            .unwrap()
            .pop_front()
            .expect("a free permit implies a free slot");
        MessageEnvelope::from_cell(EnvelopeCell { pool: self.inner.clone(), slot })
    }

    /// Acquires an envelope without blocking, returning `None` if the pool is exhausted.
    pub fn try_acquire(&self) -> Option<MessageEnvelope> {
        let permit = self.inner.semaphore.try_acquire().ok()?;
        permit.forget();
        let slot = self
            .inner
            .free
            .lock()
            .unwrap()
            .pop_front()
            .expect("a free permit implies a free slot");
        Some(MessageEnvelope::from_cell(EnvelopeCell { pool: self.inner.clone(), slot }))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_blocks_when_pool_is_exhausted() {
        let pool = MessagePool::new(1);
        let first = pool.acquire().await;
        assert!(pool.try_acquire().is_none());
        drop(first);
        assert!(pool.try_acquire().is_some());
    }

    #[tokio::test]
    async fn release_resets_mutable_state_but_keeps_the_slot() {
        let pool = MessagePool::new(1);
        {
            let env = pool.acquire().await;
            env.with_message_mut(|m| m.payload = "dirty".into());
            env.set_hop_count(3);
        }
        let env = pool.acquire().await;
        assert_eq!(env.hop_count(), 0);
        env.with_message(|m| assert_eq!(m.payload, ""));
    }

    #[tokio::test]
    async fn refcount_reaching_zero_returns_envelope_to_free_list() {
        let pool = MessagePool::new(1);
        let env = pool.acquire().await;
        let clone_a = env.clone();
        let clone_b = env.clone();
        assert_eq!(env.refcount(), 3);
        drop(env);
        drop(clone_a);
        assert!(pool.try_acquire().is_none());
        drop(clone_b);
        assert!(pool.try_acquire().is_some());
    }
}
