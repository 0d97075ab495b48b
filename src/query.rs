//! Tracks whether the current thread is serving a live query.
//!
//! Metadata fetch failures are fatal for a query that needs a correct answer, but are only worth
//! a log line during background work such as warm-ups or health checks.  Code that runs a query
//! enters a [`QueryScope`] for its duration:
//!
//! ```
//! use webdisk::query::{is_attached, QueryScope};
//!
//! assert!(!is_attached());
//! {
//!     let _scope = QueryScope::enter();
//!     assert!(is_attached());
//! }
//! assert!(!is_attached());
//! ```

use std::{cell::Cell, marker::PhantomData};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as attached to a query until dropped.  Scopes may be nested.
#[derive(Debug)]
#[must_use = "the query scope ends when this guard is dropped"]
pub struct QueryScope {
    // The scope belongs to the thread that entered it.
    _not_send: PhantomData<*const ()>,
}

impl QueryScope {
    pub fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for QueryScope {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Whether a [`QueryScope`] is active on the current thread.
pub fn is_attached() -> bool {
    DEPTH.with(|depth| depth.get() > 0)
}
