//! Shared byte-buffer pool for frame assembly on the write path.
//!
//! Buffers come back cleared and are returned on drop, so release happens
//! on every exit path including unwinds. Retention is bounded; surplus
//! buffers are simply freed.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

const MAX_POOLED_BUFFERS: usize = 64;

/// Thread-safe pool of reusable `Vec<u8>` buffers.
#[derive(Clone, Default)]
pub struct BufferPool {
    inner: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BufferPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a cleared buffer out of the pool, allocating if empty.
    #[must_use]
    pub fn acquire(&self) -> PooledBuf {
        let mut buf = {
            let mut bufs = lock(&self.inner);
            bufs.pop().unwrap_or_default()
        };
        buf.clear();
        PooledBuf {
            buf,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of buffers currently idle in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        lock(&self.inner).len()
    }
}

fn lock(inner: &Mutex<Vec<Vec<u8>>>) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
    inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// RAII guard over a pooled buffer.
pub struct PooledBuf {
    buf: Vec<u8>,
    pool: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        let mut bufs = lock(&self.pool);
        if bufs.len() < MAX_POOLED_BUFFERS {
            bufs.push(buf);
        }
    }
}

impl Deref for PooledBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_returns_cleared_buffer() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"leftover");
        }
        let buf = pool.acquire();
        assert!(buf.is_empty());
    }

    #[test]
    fn buffers_are_reused() {
        let pool = BufferPool::new();
        let capacity = {
            let mut buf = pool.acquire();
            buf.extend_from_slice(&[0u8; 1024]);
            buf.capacity()
        };
        assert_eq!(pool.idle(), 1);
        let buf = pool.acquire();
        assert_eq!(buf.capacity(), capacity);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn released_on_panic() {
        let pool = BufferPool::new();
        let cloned = pool.clone();
        let result = std::panic::catch_unwind(move || {
            let _buf = cloned.acquire();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn retention_is_bounded() {
        let pool = BufferPool::new();
        let guards: Vec<_> = (0..MAX_POOLED_BUFFERS + 8).map(|_| pool.acquire()).collect();
        drop(guards);
        assert_eq!(pool.idle(), MAX_POOLED_BUFFERS);
    }
}
