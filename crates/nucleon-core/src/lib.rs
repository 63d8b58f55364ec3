//! # Atoms, Nuclei, and the Store
//!
//! Nucleon keeps observable state in a [`Store`]. The store hands out
//! [`Atom`] handles; each atom names one nucleus (state + reducer +
//! listeners) living inside that store and nowhere else.
//!
//! - `state_atom`: the action *is* the next state; write with `set`.
//! - `reducer_atom`: arbitrary actions folded by a reducer; write with `dispatch`.
//!
//! ```rust
//! use std::rc::Rc;
//! use nucleon_core::*;
//!
//! enum Counter {
//!     Add(i32),
//!     Reset,
//! }
//!
//! let store = Store::new();
//! let count = store.reducer_atom(
//!     |n: &Rc<i32>, action: Counter| match action {
//!         Counter::Add(0) => n.clone(),
//!         Counter::Add(by) => Rc::new(**n + by),
//!         Counter::Reset => Rc::new(0),
//!     },
//!     0,
//! );
//!
//! let sub = store
//!     .add_change_listener(&count, |n| println!("count = {n}"))
//!     .unwrap();
//! store.dispatch(&count, Counter::Add(2)).unwrap();
//! assert_eq!(*store.state(&count).unwrap(), 2);
//! sub.unsubscribe();
//! ```
//!
//! ## Change notification
//!
//! Listeners run synchronously, in registration order, inside the `dispatch`
//! that changed the state. A reducer that hands back the very same `Rc` is a
//! no-op: nothing is stored and nobody is notified.
//!
//! A dispatch on an atom whose listeners are currently running is reduced
//! immediately (so `state` reads see it), but its notification is queued
//! until that round completes. Listeners therefore see states in reducer
//! order, one round at a time.
//!
//! ## Ownership
//!
//! Atoms carry the [`StoreId`] of their store. Passing an atom to another
//! store yields [`StoreError::NotAnAtom`] rather than touching unrelated state.

pub mod atom;
pub mod context;
pub mod error;
mod nucleus;
pub mod prelude;
pub mod store;
pub mod subscription;

pub use atom::*;
pub use context::*;
pub use error::*;
pub use store::*;
pub use subscription::*;
