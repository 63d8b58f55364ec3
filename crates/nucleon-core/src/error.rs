use thiserror::Error;

/// Misuse of an atom handle against a [`Store`](crate::Store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The atom was created by another store.
    #[error("atom does not belong to this store")]
    NotAnAtom,
    #[error("dispatch must be called with a reducer atom")]
    NotAReducerAtom,
    #[error("set must be called with a state atom")]
    NotAStateAtom,
}

/// A scoped lookup found no provider for the requested value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("can't use {0} outside of a scope that provides it")]
pub struct ContextError(pub &'static str);
