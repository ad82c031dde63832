use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A thread-safe pool of packet buffers.
///
/// Queued packets are copied into buffers taken from the pool, and returned
/// once decoded, so a steady stream of equally sized packets stops
/// allocating after the first few frames.
#[derive(Debug, Clone)]
pub struct BufferPool {
    pool: Arc<Mutex<VecDeque<Vec<u8>>>>,
    max_size: usize,
    buffer_capacity: usize,
}

impl BufferPool {
    /// Creates a new buffer pool with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `max_size` - Maximum number of buffers to keep in the pool
    /// * `buffer_capacity` - Initial capacity for each buffer
    pub fn new(max_size: usize, buffer_capacity: usize) -> Self {
        Self {
            pool: Arc::new(Mutex::new(VecDeque::with_capacity(max_size))),
            max_size,
            buffer_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        // The queue holds plain byte buffers; a panic elsewhere cannot leave it inconsistent.
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Acquires a buffer from the pool or creates a new one if none available.
    pub fn acquire(&self) -> Vec<u8> {
        self.lock()
            .pop_front()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_capacity))
    }

    /// Acquires a buffer holding a copy of `bytes`.
    pub fn acquire_copy(&self, bytes: &[u8]) -> Vec<u8> {
        let mut buffer = self.acquire();
        buffer.extend_from_slice(bytes);
        buffer
    }

    /// Returns a buffer to the pool for reuse.
    pub fn release(&self, mut buffer: Vec<u8>) {
        buffer.clear();

        let mut pool = self.lock();
        if pool.len() < self.max_size {
            pool.push_back(buffer);
        }
    }

    pub fn available(&self) -> usize {
        self.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(16, 4 * 1024)
    }
}

#[test]
fn buffers_are_reused_up_to_max_size() {
    let pool = BufferPool::new(2, 32);
    let a = pool.acquire_copy(&[1, 2, 3]);
    assert_eq!(a, [1, 2, 3]);
    let ptr = a.as_ptr();

    pool.release(a);
    assert_eq!(pool.available(), 1);

    let b = pool.acquire();
    assert!(b.is_empty());
    assert_eq!(b.as_ptr(), ptr);

    pool.release(b);
    pool.release(Vec::new());
    pool.release(Vec::new());
    assert_eq!(pool.available(), 2);
}
