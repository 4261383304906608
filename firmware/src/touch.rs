//! One-shot touch flag raised from the sensor's touch interrupt.
use core::sync::atomic::{AtomicBool, Ordering};

/// Set from interrupt context, consumed by the main loop.
#[derive(Debug, Default)]
pub struct TouchFlag {
    touched: AtomicBool,
}

impl TouchFlag {
    pub const fn new() -> Self {
        Self {
            touched: AtomicBool::new(false),
        }
    }

    /// Record a touch. Safe to call from an interrupt handler.
    pub fn signal(&self) {
        self.touched.store(true, Ordering::Release);
    }

    /// `true` exactly once per touch.
    pub fn take(&self) -> bool {
        self.touched.swap(false, Ordering::AcqRel)
    }

    /// Drop a pending touch, e.g. on a mode change.
    pub fn clear(&self) {
        self.touched.store(false, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.touched.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static FLAG: TouchFlag = TouchFlag::new();

    #[test]
    fn touch_is_reported_once() {
        FLAG.signal();
        assert!(FLAG.is_pending());
        assert!(FLAG.take());
        assert!(!FLAG.take());
    }

    #[test]
    fn clear_discards_pending_touch() {
        let flag = TouchFlag::new();
        flag.signal();
        flag.clear();
        assert!(!flag.take());
    }
}
