//! Fixed-capacity sample ring with a running sum.

use crate::error::ConfigError;

/// A circular buffer of `u32` samples that keeps the sum of its contents.
///
/// Storage is allocated once in [`new`](Self::new) and never grows. Pushing
/// into a full buffer overwrites the oldest sample, and the evicted value is
/// subtracted from the sum before the new one is added, so [`average`]
/// is always O(1).
///
/// [`average`]: Self::average
#[derive(Debug, Clone)]
pub struct MovingAverageBuffer {
    data: Box<[u32]>,
    head: usize,
    tail: usize,
    size: usize,
    sum: u64,
}

impl MovingAverageBuffer {
    /// Create an empty buffer holding at most `capacity` samples.
    ///
    /// # Errors
    /// Returns [`ConfigError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            data: vec![0; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            size: 0,
            sum: 0,
        })
    }

    /// Append a sample, evicting the oldest one if the buffer is full.
    ///
    /// Returns the evicted sample, if any.
    pub fn push(&mut self, value: u32) -> Option<u32> {
        let evicted = if self.is_full() {
            let old = self.data[self.tail];
            self.sum -= u64::from(old);
            self.tail = self.advance(self.tail);
            Some(old)
        } else {
            self.size += 1;
            None
        };

        self.data[self.head] = value;
        self.sum += u64::from(value);
        self.head = self.advance(self.head);
        evicted
    }

    /// Remove and return the oldest sample, or `None` if empty.
    pub fn pop(&mut self) -> Option<u32> {
        if self.is_empty() {
            return None;
        }
        let value = self.data[self.tail];
        self.tail = self.advance(self.tail);
        self.size -= 1;
        self.sum -= u64::from(value);
        Some(value)
    }

    /// Push `capacity` copies of `value`, replacing whatever was held.
    pub fn fill(&mut self, value: u32) {
        for _ in 0..self.capacity() {
            self.push(value);
        }
    }

    /// Number of samples currently held.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Maximum number of samples.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whether no samples are held.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether the next push will evict.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    /// Sum of the held samples.
    pub fn sum(&self) -> u64 {
        self.sum
    }

    /// Truncating mean of the held samples, or `None` if empty.
    pub fn average(&self) -> Option<u32> {
        if self.is_empty() {
            return None;
        }
        // The mean of u32 samples always fits in u32.
        Some((self.sum / self.size as u64) as u32)
    }

    /// Iterate over the held samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.size).map(move |i| self.data[(self.tail + i) % self.capacity()])
    }

    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }
}
