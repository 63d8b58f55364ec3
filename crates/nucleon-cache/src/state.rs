use std::rc::Rc;

/// Timestamp of an entry that was never requested (or was voided).
pub const NEVER: i64 = -1;

/// User-visible status of a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// The key is not ready; nothing is stored or fetched.
    Starving,
    Pristine,
    Pending,
    Failure,
    Success,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Phase<E, D> {
    Pristine,
    /// A request is outstanding; `data` is whatever was known before it.
    Pending { data: Option<D> },
    /// The last request failed; `data` is the last known good value.
    Failure { error: E, data: Option<D> },
    Success { data: D },
}

/// State stored in an entry's nucleus.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryState<E, D> {
    /// Fencing timestamp of the latest request, or [`NEVER`].
    pub timestamp: i64,
    pub phase: Phase<E, D>,
}

impl<E, D> Default for EntryState<E, D> {
    fn default() -> Self {
        Self::pristine()
    }
}

impl<E, D> EntryState<E, D> {
    pub fn pristine() -> Self {
        Self {
            timestamp: NEVER,
            phase: Phase::Pristine,
        }
    }

    pub fn status(&self) -> Status {
        match self.phase {
            Phase::Pristine => Status::Pristine,
            Phase::Pending { .. } => Status::Pending,
            Phase::Failure { .. } => Status::Failure,
            Phase::Success { .. } => Status::Success,
        }
    }

    pub fn data(&self) -> Option<&D> {
        match &self.phase {
            Phase::Pristine => None,
            Phase::Pending { data } | Phase::Failure { data, .. } => data.as_ref(),
            Phase::Success { data } => Some(data),
        }
    }

    pub fn error(&self) -> Option<&E> {
        match &self.phase {
            Phase::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// What a caller gets back from an entry.
#[derive(Debug, PartialEq)]
pub enum Snapshot<E, D> {
    Starving,
    Ready(Rc<EntryState<E, D>>),
}

impl<E, D> Clone for Snapshot<E, D> {
    fn clone(&self) -> Self {
        match self {
            Snapshot::Starving => Snapshot::Starving,
            Snapshot::Ready(state) => Snapshot::Ready(state.clone()),
        }
    }
}

impl<E, D> Snapshot<E, D> {
    pub fn status(&self) -> Status {
        match self {
            Snapshot::Starving => Status::Starving,
            Snapshot::Ready(state) => state.status(),
        }
    }

    pub fn data(&self) -> Option<&D> {
        match self {
            Snapshot::Starving => None,
            Snapshot::Ready(state) => state.data(),
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Snapshot::Starving => None,
            Snapshot::Ready(state) => state.error(),
        }
    }

    /// `None` while starving.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Snapshot::Starving => None,
            Snapshot::Ready(state) => Some(state.timestamp),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Action<E, D> {
    Request { timestamp: i64 },
    Success { data: D, timestamp: i64 },
    Failure { error: E, timestamp: i64 },
    Void,
    Mutate { data: D },
    /// The request stamped `timestamp` will never answer; put back the state
    /// it replaced.
    Abort {
        timestamp: i64,
        previous: Rc<EntryState<E, D>>,
    },
}

impl<E, D> Action<E, D> {
    fn name(&self) -> &'static str {
        match self {
            Action::Request { .. } => "REQUEST",
            Action::Success { .. } => "SUCCESS",
            Action::Failure { .. } => "FAILURE",
            Action::Void => "VOID",
            Action::Mutate { .. } => "MUTATE",
            Action::Abort { .. } => "ABORT",
        }
    }
}

/// Entry state machine.
///
/// SUCCESS and FAILURE carrying a timestamp older than the entry's are
/// dropped: a response may only land if no request was issued after its own.
/// MUTATE keeps the timestamp so in-flight responses are judged against the
/// last real request.
pub(crate) fn reduce<E, D: Clone>(
    state: &Rc<EntryState<E, D>>,
    action: Action<E, D>,
) -> Rc<EntryState<E, D>> {
    log::trace!(
        "cache: {} on {:?}@{}",
        action.name(),
        state.status(),
        state.timestamp
    );
    match action {
        Action::Request { timestamp } => Rc::new(EntryState {
            timestamp,
            phase: Phase::Pending {
                data: state.data().cloned(),
            },
        }),
        Action::Success { timestamp, .. } | Action::Failure { timestamp, .. }
            if timestamp < state.timestamp =>
        {
            log::debug!(
                "cache: discarding stale response @{timestamp} (entry @{})",
                state.timestamp
            );
            state.clone()
        }
        Action::Success { data, .. } => Rc::new(EntryState {
            timestamp: state.timestamp,
            phase: Phase::Success { data },
        }),
        Action::Failure { error, .. } => Rc::new(EntryState {
            timestamp: state.timestamp,
            phase: Phase::Failure {
                error,
                data: state.data().cloned(),
            },
        }),
        Action::Void => Rc::new(EntryState::pristine()),
        Action::Mutate { data } => Rc::new(EntryState {
            timestamp: state.timestamp,
            phase: Phase::Success { data },
        }),
        Action::Abort {
            timestamp,
            previous,
        } => {
            if timestamp == state.timestamp && state.status() == Status::Pending {
                previous
            } else {
                state.clone()
            }
        }
    }
}
