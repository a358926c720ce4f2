//! Lock-free single-producer single-consumer sample ring.
//!
//! The consumer is the hardware audio callback, which must never
//! block, allocate, or contend on a lock — so the ring is index-based:
//! the producer advances only the write index, the consumer only the
//! read index, and one slot is sacrificed to disambiguate a full ring
//! from an empty one. When the ring is full the producer drops the
//! excess rather than overwrite unread samples.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared {
    slots: Box<[UnsafeCell<f32>]>,
    /// Next slot the consumer will read. Written only by the consumer.
    read: AtomicUsize,
    /// Next slot the producer will write. Written only by the producer.
    write: AtomicUsize,
}

// Safety: slots between `read` and `write` are owned by the consumer,
// the rest by the producer; the acquire/release pairs on the indices
// publish slot contents before the other side may touch them.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

/// Create a ring able to hold `capacity` unread samples.
///
/// Allocates `capacity + 1` slots; the extra slot is the full/empty
/// disambiguator.
pub fn audio_ring(capacity: usize) -> (Producer, Consumer) {
    assert!(capacity > 0, "ring capacity must be nonzero");
    let slots: Box<[UnsafeCell<f32>]> =
        (0..capacity + 1).map(|_| UnsafeCell::new(0.0)).collect();
    let shared = Arc::new(Shared {
        slots,
        read: AtomicUsize::new(0),
        write: AtomicUsize::new(0),
    });
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

/// Write half. Held by the decode/network path.
pub struct Producer {
    shared: Arc<Shared>,
}

/// Read half. Held by the real-time audio callback.
pub struct Consumer {
    shared: Arc<Shared>,
}

impl Producer {
    /// Unread samples the ring can still accept.
    pub fn free(&self) -> usize {
        let cap = self.shared.slots.len();
        let read = self.shared.read.load(Ordering::Acquire);
        let write = self.shared.write.load(Ordering::Relaxed);
        (read + cap - write - 1) % cap
    }

    /// Maximum number of unread samples the ring can hold.
    pub fn capacity(&self) -> usize {
        self.shared.slots.len() - 1
    }

    /// Copy as many samples as fit, returning how many were accepted.
    /// Never blocks; the remainder is the caller's to drop or count.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        let cap = self.shared.slots.len();
        let write = self.shared.write.load(Ordering::Relaxed);

        let n = samples.len().min(self.free());

        for (i, &sample) in samples[..n].iter().enumerate() {
            let idx = (write + i) % cap;
            unsafe { *self.shared.slots[idx].get() = sample };
        }

        self.shared.write.store((write + n) % cap, Ordering::Release);
        n
    }
}

impl Consumer {
    /// Unread samples currently available.
    pub fn available(&self) -> usize {
        let cap = self.shared.slots.len();
        let write = self.shared.write.load(Ordering::Acquire);
        let read = self.shared.read.load(Ordering::Relaxed);
        (write + cap - read) % cap
    }

    /// Copy up to `out.len()` samples, returning how many were read.
    /// Never blocks; on underrun the caller substitutes silence.
    pub fn pop_slice(&mut self, out: &mut [f32]) -> usize {
        let cap = self.shared.slots.len();
        let read = self.shared.read.load(Ordering::Relaxed);

        let n = out.len().min(self.available());

        for (i, slot) in out[..n].iter_mut().enumerate() {
            let idx = (read + i) % cap;
            *slot = unsafe { *self.shared.slots[idx].get() };
        }

        self.shared.read.store((read + n) % cap, Ordering::Release);
        n
    }

    /// Discard everything currently buffered (consumer-side flush).
    pub fn clear(&mut self) {
        let write = self.shared.write.load(Ordering::Acquire);
        self.shared.read.store(write, Ordering::Release);
    }
}

// ── Tests ────────────────────────────────────────────────────────
