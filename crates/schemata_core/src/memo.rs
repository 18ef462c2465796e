//! Single-assignment memoization without locks.
//!
//! Concurrent callers of [`Memoized::get_or_compute`] may each run the
//! computation; one compare-and-swap publishes the first result and every
//! caller, including those whose result was discarded, observes that value.
//! Only use this for pure computations whose result depends solely on
//! inputs fixed before the first call.

use once_cell::race::OnceBox;
use std::fmt;

/// Lazily computed, write-once value
pub struct Memoized<T> {
    cell: OnceBox<T>,
}

impl<T> Memoized<T> {
    /// Create an empty cell
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceBox::new(),
        }
    }

    /// Get the value if it has been computed
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Get the value, computing it if no caller has published one yet
    pub fn get_or_compute<F>(&self, compute: F) -> &T
    where
        F: FnOnce() -> T,
    {
        self.cell.get_or_init(|| Box::new(compute()))
    }

    /// Whether a value has been published
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for Memoized<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Memoized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Memoized").field(value).finish(),
            None => f.write_str("Memoized(<pending>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_memoized_computes_once_sequentially() {
        let memo = Memoized::new();
        let calls = AtomicUsize::new(0);
        let first = *memo.get_or_compute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        });
        let second = *memo.get_or_compute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            8
        });
        assert_eq!(first, 7);
        assert_eq!(second, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memo.is_computed());
    }

    #[test]
    fn test_memoized_concurrent_callers_agree() {
        const CALLERS: usize = 16;
        let memo: Arc<Memoized<Vec<u32>>> = Arc::new(Memoized::new());
        let computations = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let memo = Arc::clone(&memo);
                let computations = Arc::clone(&computations);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let value = memo.get_or_compute(|| {
                        computations.fetch_add(1, Ordering::SeqCst);
                        (1..=4).collect()
                    });
                    value as *const Vec<u32> as usize
                })
            })
            .collect();

        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(memo.get(), Some(&vec![1, 2, 3, 4]));
        let runs = computations.load(Ordering::SeqCst);
        assert!(runs >= 1 && runs <= CALLERS);
    }

    #[test]
    fn test_memoized_debug() {
        let memo: Memoized<u8> = Memoized::default();
        assert_eq!(format!("{:?}", memo), "Memoized(<pending>)");
        memo.get_or_compute(|| 3);
        assert_eq!(format!("{:?}", memo), "Memoized(3)");
    }
}
