//! Fixed-capacity circular record of call outcomes as bits (C1).
//!
//! Backing storage is a packed bitset (`u64` words) rather than one `bool`
//! per slot, guarded by a single mutex. Contention is low in practice: one
//! `record` per user call.

use parking_lot::Mutex;

const WORD_BITS: usize = u64::BITS as usize;

struct RawState {
    words: Vec<u64>,
    capacity: usize,
    write_index: usize,
    num_failed: usize,
    num_recorded: usize,
}

impl RawState {
    fn new(capacity: usize) -> Self {
        let words = vec![0u64; capacity.div_ceil(WORD_BITS).max(1)];
        Self {
            words,
            capacity,
            write_index: 0,
            num_failed: 0,
            num_recorded: 0,
        }
    }

    #[inline]
    fn get(&self, index: usize) -> bool {
        let word = index / WORD_BITS;
        let offset = index % WORD_BITS;
        (self.words[word] >> offset) & 1 == 1
    }

    #[inline]
    fn set(&mut self, index: usize, value: bool) {
        let word = index / WORD_BITS;
        let offset = index % WORD_BITS;
        if value {
            self.words[word] |= 1 << offset;
        } else {
            self.words[word] &= !(1 << offset);
        }
    }

    fn record(&mut self, failed: bool) -> f64 {
        let was_full = self.num_recorded == self.capacity;
        let slot = self.write_index % self.capacity;

        if was_full {
            let displaced = self.get(slot);
            if displaced {
                self.num_failed -= 1;
            }
        }

        self.set(slot, failed);
        if failed {
            self.num_failed += 1;
        }

        self.write_index += 1;
        self.num_recorded = self.write_index.min(self.capacity);

        self.failure_rate()
    }

    fn failure_rate(&self) -> f64 {
        if self.num_recorded < self.capacity {
            -1.0
        } else {
            100.0 * self.num_failed as f64 / self.capacity as f64
        }
    }

    fn reset(&mut self) {
        for word in &mut self.words {
            *word = 0;
        }
        self.write_index = 0;
        self.num_failed = 0;
        self.num_recorded = 0;
    }
}

/// A read-only projection of a [`RingBitBuffer`]'s state at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingBitBufferSnapshot {
    pub capacity: usize,
    pub number_of_recorded_calls: usize,
    pub number_of_failed_calls: usize,
    pub number_of_successful_calls: usize,
    pub failure_rate: f64,
}

/// Fixed-size circular record of recent call outcomes with O(1) update and
/// O(1) failure-rate query. See spec §4.1.
pub struct RingBitBuffer {
    state: Mutex<RawState>,
}

impl RingBitBuffer {
    /// Create a new buffer with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`. Callers are internal: [`crate::circuit_breaker::config::CircuitBreakerConfig`]
    /// already validates buffer sizes to be `>= 1` before one of these is
    /// ever constructed.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring bit buffer capacity must be > 0");
        Self {
            state: Mutex::new(RawState::new(capacity)),
        }
    }

    /// Record a single outcome (`true` = failure, `false` = success) and
    /// return the resulting failure rate (`-1.0` while the buffer is not yet
    /// full).
    pub fn record(&self, failed: bool) -> f64 {
        self.state.lock().record(failed)
    }

    /// Reset all counters and bits to zero.
    pub fn reset(&self) {
        self.state.lock().reset();
    }

    /// The buffer's fixed capacity (`N`).
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// `true` once `number_of_recorded_calls == capacity`.
    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        state.num_recorded == state.capacity
    }

    /// Read accessors bundled into a single immutable snapshot.
    pub fn snapshot(&self) -> RingBitBufferSnapshot {
        let state = self.state.lock();
        RingBitBufferSnapshot {
            capacity: state.capacity,
            number_of_recorded_calls: state.num_recorded,
            number_of_failed_calls: state.num_failed,
            number_of_successful_calls: state.num_recorded - state.num_failed,
            failure_rate: state.failure_rate(),
        }
    }
}
