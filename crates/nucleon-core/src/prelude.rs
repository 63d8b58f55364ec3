pub use crate::atom::{Atom, AtomKind, StateAtom, StoreId};
pub use crate::context::{use_store, with_store};
pub use crate::error::{ContextError, StoreError};
pub use crate::store::{Set, Store};
pub use crate::subscription::{ListenerId, Subscription};
