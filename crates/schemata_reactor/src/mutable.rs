//! Mutable statements.
//!
//! Some effective statements accumulate state while other roots are still
//! being built. Each such artifact is registered with the build and sealed
//! exactly once, after every root has been assembled.

use crate::error::{SourceError, SourceResult};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// State that is frozen once the whole build has finished
pub trait MutableStatement: Send + Sync + fmt::Debug {
    /// Freeze the accumulated state
    fn seal(&self);

    /// Whether [`seal`](Self::seal) has run
    fn is_sealed(&self) -> bool;
}

/// Append-only list that rejects writes once sealed
pub struct SealableList<T> {
    items: RwLock<Vec<T>>,
    sealed: AtomicBool,
}

impl<T> SealableList<T> {
    /// Create an empty open list
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Append an item
    ///
    /// # Errors
    ///
    /// Returns error if the list has been sealed
    pub fn push(&self, item: T) -> SourceResult<()> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        if self.sealed.load(Ordering::Acquire) {
            return Err(SourceError::internal("Cannot modify a sealed statement"));
        }
        items.push(item);
        Ok(())
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no item was appended
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> SealableList<T> {
    /// Copy of the current items
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl<T> Default for SealableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lists compare by identity
impl<T> PartialEq for SealableList<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<T> Eq for SealableList<T> {}

impl<T: fmt::Debug> fmt::Debug for SealableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("SealableList")
            .field("items", &*items)
            .field("sealed", &self.sealed.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: Send + Sync + fmt::Debug> MutableStatement for SealableList<T> {
    fn seal(&self) {
        // Taking the write lock orders sealing after in-flight pushes
        let _items = self.items.write().unwrap_or_else(|e| e.into_inner());
        self.sealed.store(true, Ordering::Release);
    }

    fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

/// Mutable statements awaiting the end of the build
#[derive(Debug, Default)]
pub(crate) struct MutableRegistry {
    pending: Vec<Arc<dyn MutableStatement>>,
}

impl MutableRegistry {
    pub(crate) fn register(&mut self, statement: Arc<dyn MutableStatement>) {
        self.pending.push(statement);
    }

    /// Seal everything in registration order and forget it
    pub(crate) fn seal_all(&mut self) -> usize {
        let count = self.pending.len();
        for statement in self.pending.drain(..) {
            statement.seal();
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
