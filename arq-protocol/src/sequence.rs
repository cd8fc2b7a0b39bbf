//! Sequence Id Pool
//!
//! Sequence ids come from a bounded pool `[0, POOL_SIZE)` and are reused once
//! acknowledged. Ids are issued in cyclic order so that the order in which the
//! sender numbers fragments is the order in which the receiver consumes them,
//! including after the pool wraps around.
//!
//! The span from the oldest outstanding id to the next id to issue is capped
//! at half the pool (the selective-repeat window). This keeps "ahead of the
//! receiver cursor" and "behind the receiver cursor" distinguishable for every
//! id that can still be on the wire.

use thiserror::Error;

/// Number of sequence ids in the pool
pub const POOL_SIZE: u32 = 2000;

/// Largest pool size for which id arithmetic stays within `u32`
pub const MAX_POOL_SIZE: u32 = 1 << 31;

/// Sequence pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Sequence pool exhausted ({outstanding} ids outstanding, window {window})")]
    PoolExhausted { outstanding: u32, window: u32 },

    #[error("Sequence id {0} is not outstanding")]
    NotOutstanding(u32),

    #[error("Sequence id {id} out of range (pool size {capacity})")]
    OutOfRange { id: u32, capacity: u32 },
}

/// Half the pool: the largest span of ids that may be outstanding at once
#[inline]
pub fn window_for(capacity: u32) -> u32 {
    capacity / 2
}

/// Forward distance from `from` to `to` on a ring of `capacity` ids
#[inline]
pub fn forward_distance(from: u32, to: u32, capacity: u32) -> u32 {
    ((u64::from(to) + u64::from(capacity) - u64::from(from)) % u64::from(capacity)) as u32
}

/// Bounded pool of reusable sequence ids
#[derive(Debug, Clone)]
pub struct SeqPool {
    /// Outstanding flag per id
    outstanding: Vec<bool>,
    /// Next id to issue
    next: u32,
    /// Oldest outstanding id (equals `next` when nothing is outstanding)
    oldest: u32,
    /// Ids from `oldest` up to (not including) `next`
    span: u32,
    /// Number of ids currently outstanding
    in_flight: u32,
    /// Maximum span
    window: u32,
}

impl SeqPool {
    /// Create a pool of `capacity` ids
    ///
    /// # Panics
    /// Panics if capacity is less than 2 or above [`MAX_POOL_SIZE`]
    pub fn new(capacity: u32) -> Self {
        assert!(capacity >= 2, "Sequence pool needs at least 2 ids, got {}", capacity);
        assert!(
            capacity <= MAX_POOL_SIZE,
            "Sequence pool holds at most {} ids, got {}",
            MAX_POOL_SIZE,
            capacity
        );

        SeqPool {
            outstanding: vec![false; capacity as usize],
            next: 0,
            oldest: 0,
            span: 0,
            in_flight: 0,
            window: window_for(capacity),
        }
    }

    /// Take the next free id
    pub fn acquire(&mut self) -> Result<u32, SequenceError> {
        if self.span >= self.window {
            return Err(SequenceError::PoolExhausted {
                outstanding: self.in_flight,
                window: self.window,
            });
        }

        let id = self.next;
        debug_assert!(!self.outstanding[id as usize]);

        self.outstanding[id as usize] = true;
        self.in_flight += 1;
        self.span += 1;
        self.next = (id + 1) % self.capacity();

        Ok(id)
    }

    /// Return an outstanding id to the pool
    pub fn release(&mut self, id: u32) -> Result<(), SequenceError> {
        if id >= self.capacity() {
            return Err(SequenceError::OutOfRange {
                id,
                capacity: self.capacity(),
            });
        }
        if !self.outstanding[id as usize] {
            return Err(SequenceError::NotOutstanding(id));
        }

        self.outstanding[id as usize] = false;
        self.in_flight -= 1;

        // Slide the window past everything that has been released
        while self.span > 0 && !self.outstanding[self.oldest as usize] {
            self.oldest = (self.oldest + 1) % self.capacity();
            self.span -= 1;
        }

        Ok(())
    }

    /// Number of ids that can be acquired right now
    pub fn available(&self) -> u32 {
        self.window - self.span
    }

    /// Number of ids currently outstanding
    pub fn outstanding(&self) -> u32 {
        self.in_flight
    }

    /// Check whether `id` is currently outstanding
    pub fn is_outstanding(&self, id: u32) -> bool {
        self.outstanding.get(id as usize).copied().unwrap_or(false)
    }

    /// Ids currently outstanding, ascending
    pub fn outstanding_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.outstanding
            .iter()
            .enumerate()
            .filter(|(_, used)| **used)
            .map(|(id, _)| id as u32)
    }

    /// Ids currently free, ascending
    pub fn free_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.outstanding
            .iter()
            .enumerate()
            .filter(|(_, used)| !**used)
            .map(|(id, _)| id as u32)
    }

    /// Total number of ids in the pool
    pub fn capacity(&self) -> u32 {
        self.outstanding.len() as u32
    }

    /// Maximum span of outstanding ids
    pub fn window(&self) -> u32 {
        self.window
    }

    /// Next id that [`acquire`](Self::acquire) would return
    pub fn next_id(&self) -> u32 {
        self.next
    }
}

impl Default for SeqPool {
    fn default() -> Self {
        SeqPool::new(POOL_SIZE)
    }
}
