use std::sync::Arc;

use bytes::Bytes;

use crate::message::Message;
use crate::pool::PoolInner;

/// The mutable state held in a pool slot. Everything here except the
/// message body's allocations is reset to its default when the envelope's
/// last reference is dropped.
pub(crate) struct EnvelopeState {
    pub message: Message,
    pub hop_count: u32,
    pub decoded: bool,
    pub signer_id: Option<String>,
    pub cursor: Option<Bytes>,
    pub trust_serialized: bool,
    pub cached_bytes: Option<Bytes>,
}

impl EnvelopeState {
    pub(crate) fn empty(message: Message) -> Self {
        EnvelopeState {
            message,
            hop_count: 0,
            decoded: false,
            signer_id: None,
            cursor: None,
            trust_serialized: false,
            cached_bytes: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.hop_count = 0;
        self.decoded = false;
        self.signer_id = None;
        self.cursor = None;
        self.trust_serialized = false;
        self.cached_bytes = None;
        // message body is left as-is; the next acquirer overwrites its
        // fields via `with_message_mut` instead of paying for a fresh
        // allocation on every round trip through the pool
        self.message.payload.clear();
        self.message.fields.clear();
    }
}

pub(crate) struct EnvelopeCell {
    pub(crate) pool: Arc<PoolInner>,
    pub(crate) slot: usize,
}

impl Drop for EnvelopeCell {
    fn drop(&mut self) {
        self.pool.reset_and_free(self.slot);
    }
}

/// A handle to a pooled [`Message`] plus the bookkeeping conduit's router
/// and supervisors need to move it through the pipeline.
///
/// Cloning a `MessageEnvelope` is how the router performs fan-out: each
/// clone is a new reference to the same slot, so the underlying message is
/// never copied on delivery to multiple consumers. The slot returns to its
/// pool automatically when the last clone is dropped, exactly mirroring
/// `Arc`'s strong-count semantics — because it *is* built on `Arc`.
#[derive(Clone)]
pub struct MessageEnvelope {
    inner: Arc<EnvelopeCell>,
}

impl MessageEnvelope {
    pub(crate) fn from_cell(cell: EnvelopeCell) -> Self {
        MessageEnvelope { inner: Arc::new(cell) }
    }

    /// Number of live handles referencing this envelope's slot, i.e. the
    /// number of consumers the router has fanned this message out to.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn with_message<R>(&self, f: impl FnOnce(&Message) -> R) -> R {
        self.inner.pool.with_state(self.inner.slot, |s| f(&s.message))
    }

    /// Mutates the message body. Callers must only do this while holding
    /// the sole reference to the envelope (refcount 1) — once the router
    /// has fanned an envelope out, its message is shared and read-only.
    pub fn with_message_mut<R>(&self, f: impl FnOnce(&mut Message) -> R) -> R {
        self.inner.pool.with_state_mut(self.inner.slot, |s| {
            s.trust_serialized = false;
            s.cached_bytes = None;
            f(&mut s.message)
        })
    }

    pub fn hop_count(&self) -> u32 {
        self.inner.pool.with_state(self.inner.slot, |s| s.hop_count)
    }

    pub fn set_hop_count(&self, hops: u32) {
        self.inner.pool.with_state_mut(self.inner.slot, |s| s.hop_count = hops);
    }

    /// Increments the hop counter and returns the new value.
    pub fn increment_hop_count(&self) -> u32 {
        self.inner.pool.with_state_mut(self.inner.slot, |s| {
            s.hop_count += 1;
            s.hop_count
        })
    }

    pub fn decoded(&self) -> bool {
        self.inner.pool.with_state(self.inner.slot, |s| s.decoded)
    }

    pub fn set_decoded(&self, decoded: bool) {
        self.inner.pool.with_state_mut(self.inner.slot, |s| s.decoded = decoded);
    }

    pub fn signer_id(&self) -> Option<String> {
        self.inner.pool.with_state(self.inner.slot, |s| s.signer_id.clone())
    }

    pub fn set_signer_id(&self, signer_id: Option<String>) {
        self.inner.pool.with_state_mut(self.inner.slot, |s| s.signer_id = signer_id);
    }

    pub fn cursor(&self) -> Option<Bytes> {
        self.inner.pool.with_state(self.inner.slot, |s| s.cursor.clone())
    }

    pub fn set_cursor(&self, cursor: Option<Bytes>) {
        self.inner.pool.with_state_mut(self.inner.slot, |s| s.cursor = cursor);
    }

    /// Returns the cached serialized form if the message hasn't been
    /// mutated since it was last serialized.
    pub fn cached_bytes(&self) -> Option<Bytes> {
        self.inner.pool.with_state(self.inner.slot, |s| {
            if s.trust_serialized {
                s.cached_bytes.clone()
            } else {
                None
            }
        })
    }

    pub fn cache_serialized(&self, bytes: Bytes) {
        self.inner.pool.with_state_mut(self.inner.slot, |s| {
            s.cached_bytes = Some(bytes);
            s.trust_serialized = true;
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::MessagePool;

    #[tokio::test]
    async fn mutation_invalidates_the_cached_serialized_form() {
        let pool = MessagePool::new(1);
        let env = pool.acquire().await;
        env.cache_serialized(bytes::Bytes::from_static(b"stale"));
        assert!(env.cached_bytes().is_some());
        env.with_message_mut(|m| m.payload = "changed".into());
        assert!(env.cached_bytes().is_none());
    }
}
