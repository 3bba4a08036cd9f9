//! Fixed capacity first-in first-out buffer
//!
//! Storage is allocated inline, so the buffer can live in a `static` and be used where heap is not
//! available (like ISRs). The buffer itself is not synchronized: wrap it in a
//! [`Mutex`](crate::mutex::Mutex) when it is shared between contexts.

/// FIFO buffer holding up to `N` items
#[derive(Debug)]
pub struct RingBuffer<T: Copy, const N: usize> {
    items: [Option<T>; N],
    head: usize,
    len: usize,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Create an empty buffer
    ///
    /// # Examples
    ///
    /// ```
    /// use timg_events::utils::ring_buffer::RingBuffer;
    ///
    /// let mut buffer = RingBuffer::<u8, 2>::new();
    /// assert!(buffer.push(1));
    /// assert!(buffer.push(2));
    /// assert!(!buffer.push(3));
    /// assert_eq!(buffer.pop(), Some(1));
    /// ```
    pub const fn new() -> Self {
        Self {
            items: [None; N],
            head: 0,
            len: 0,
        }
    }

    /// Append `item` at the tail
    ///
    /// Returns `false` and leaves the buffer untouched if it is full.
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }

        let tail = (self.head + self.len) % N;
        self.items[tail] = Some(item);
        self.len += 1;
        true
    }

    /// Remove the oldest item
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.items[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;
        item
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if no item is stored
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks if a push would fail
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Maximal number of stored items
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop all items
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T: Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let mut buffer = RingBuffer::<u32, 4>::new();

        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_fifo_order_when_filled_completely() {
        let mut buffer = RingBuffer::<u32, 4>::new();

        for i in 0..4 {
            assert!(buffer.push(i));
        }
        assert!(buffer.is_full());
        assert!(!buffer.push(4));

        for i in 0..4 {
            assert_eq!(buffer.pop(), Some(i));
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_wrap_around() {
        let mut buffer = RingBuffer::<u32, 3>::new();

        for i in 0..100 {
            assert!(buffer.push(i));
            assert!(buffer.push(i + 1000));
            assert_eq!(buffer.pop(), Some(i));
            assert_eq!(buffer.pop(), Some(i + 1000));
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffer = RingBuffer::<u32, 3>::new();
        buffer.push(1);
        buffer.push(2);

        buffer.clear();

        assert!(buffer.is_empty());
        assert!(buffer.push(3));
        assert_eq!(buffer.pop(), Some(3));
    }
}
