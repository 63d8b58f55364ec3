//! # Scoped providers
//!
//! Binding layers need "the store of the current subtree" without threading it
//! through every call. `provide` pushes a frame holding one value for the
//! duration of a closure; `consume` walks the frames innermost first:
//!
//! ```rust
//! use nucleon_core::*;
//!
//! let store = Store::new();
//! let counter = store.state_atom(0);
//!
//! with_store(&store, || {
//!     let store = use_store().unwrap();
//!     store.set(&counter, 1_i32).unwrap();
//! });
//!
//! assert!(use_store().is_err());
//! ```
//!
//! Frames are thread-local and popped on unwind.

use std::any::{Any, TypeId};
use std::cell::RefCell;

use crate::{ContextError, Store};

thread_local! {
    static PROVIDERS: RefCell<Vec<(TypeId, Box<dyn Any>)>> = const { RefCell::new(Vec::new()) };
}

/// Runs `f` with `value` visible to [`consume`].
pub fn provide<T: Clone + 'static, R>(value: T, f: impl FnOnce() -> R) -> R {
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            PROVIDERS.with(|p| {
                p.borrow_mut().pop();
            });
        }
    }

    PROVIDERS.with(|p| {
        p.borrow_mut().push((TypeId::of::<T>(), Box::new(value)));
    });
    let _guard = Guard;
    f()
}

/// Innermost provided value of type `T`, if any.
pub fn consume<T: Clone + 'static>() -> Option<T> {
    PROVIDERS.with(|p| {
        p.borrow()
            .iter()
            .rev()
            .filter(|(id, _)| *id == TypeId::of::<T>())
            .find_map(|(_, v)| v.downcast_ref::<T>().cloned())
    })
}

pub fn with_store<R>(store: &Store, f: impl FnOnce() -> R) -> R {
    provide(store.clone(), f)
}

pub fn use_store() -> Result<Store, ContextError> {
    consume::<Store>().ok_or(ContextError("store hooks"))
}
