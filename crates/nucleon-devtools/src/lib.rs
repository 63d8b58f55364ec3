//! Transition recorder for atoms and cache entries.
//!
//! ```rust
//! use nucleon_core::Store;
//! use nucleon_devtools::TransitionLog;
//!
//! let store = Store::new();
//! let count = store.state_atom(0_u32);
//! let log = TransitionLog::attach_atom(&store, &count, "count").unwrap();
//!
//! store.set(&count, 1_u32).unwrap();
//! store.set(&count, 2_u32).unwrap();
//! assert_eq!(log.len(), 2);
//! assert_eq!(log.transitions()[1].summary, "2");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;
use std::time::Duration;

use web_time::Instant;

use nucleon_cache::{CacheError, Entry, Status};
use nucleon_core::{Atom, Store, StoreError, Subscription};

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub seq: u64,
    /// Time since the log was attached.
    pub elapsed: Duration,
    /// Only set for cache entries.
    pub status: Option<Status>,
    pub timestamp: Option<i64>,
    pub summary: String,
}

struct Recorder {
    name: String,
    started: Instant,
    enabled: Cell<bool>,
    seq: Cell<u64>,
    records: RefCell<Vec<Transition>>,
}

impl Recorder {
    fn push(&self, status: Option<Status>, timestamp: Option<i64>, summary: String) {
        if !self.enabled.get() {
            return;
        }
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        log::debug!("[{}] #{seq} {summary}", self.name);
        self.records.borrow_mut().push(Transition {
            seq,
            elapsed: self.started.elapsed(),
            status,
            timestamp,
            summary,
        });
    }
}

pub struct TransitionLog {
    recorder: Rc<Recorder>,
    subscription: Subscription,
}

impl TransitionLog {
    fn recorder(name: &str) -> Rc<Recorder> {
        Rc::new(Recorder {
            name: name.to_owned(),
            started: Instant::now(),
            enabled: Cell::new(true),
            seq: Cell::new(0),
            records: RefCell::new(Vec::new()),
        })
    }

    pub fn attach_atom<S: Debug + 'static, A: 'static>(
        store: &Store,
        atom: &Atom<S, A>,
        name: &str,
    ) -> Result<Self, StoreError> {
        let recorder = Self::recorder(name);
        let sink = recorder.clone();
        let subscription =
            store.add_change_listener(atom, move |state| sink.push(None, None, format!("{state:?}")))?;
        Ok(Self {
            recorder,
            subscription,
        })
    }

    /// Starving entries have nothing to observe; the log stays empty.
    pub fn attach_entry<E: 'static, D: Clone + 'static>(
        entry: &Entry<E, D>,
        name: &str,
    ) -> Result<Self, CacheError> {
        let recorder = Self::recorder(name);
        let sink = recorder.clone();
        let subscription = entry.add_change_listener(move |state| {
            let summary = format!("{:?} @{}", state.status(), state.timestamp);
            sink.push(Some(state.status()), Some(state.timestamp), summary);
        })?;
        Ok(Self {
            recorder,
            subscription,
        })
    }

    pub fn name(&self) -> &str {
        &self.recorder.name
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.recorder.enabled.set(enabled);
    }

    pub fn toggle(&self) {
        self.set_enabled(!self.recorder.enabled.get());
    }

    pub fn len(&self) -> usize {
        self.recorder.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.recorder.records.borrow().clone()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.recorder
            .records
            .borrow()
            .iter()
            .filter_map(|t| t.status)
            .collect()
    }

    /// Forgets what was recorded; numbering continues.
    pub fn clear(&self) {
        self.recorder.records.borrow_mut().clear();
    }

    /// Stops recording. What was recorded so far stays readable.
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_active()
    }
}
