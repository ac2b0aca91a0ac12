//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared stop request polled between meshing passes.
///
/// Clones share the same flag, so a caller can keep one handle and pass
/// another to the mesher. Work in progress is never interrupted mid-element.
///
/// # Example
///
/// ```
/// use mesh_types::CancelFlag;
///
/// let flag = CancelFlag::new();
/// let handle = flag.clone();
/// assert!(!flag.is_cancelled());
/// handle.cancel();
/// assert!(flag.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create a flag that is not set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](Self::cancel) has been called.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_sticky() {
        let flag = CancelFlag::new();
        flag.cancel();
        flag.cancel();
        assert!(flag.is_cancelled());
        assert!(flag.clone().is_cancelled());
    }

    #[test]
    fn visible_across_threads() {
        let flag = CancelFlag::new();
        let remote = flag.clone();
        std::thread::spawn(move || remote.cancel())
            .join()
            .unwrap();
        assert!(flag.is_cancelled());
    }
}
