use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use web_time::{SystemTime, UNIX_EPOCH};

/// Source of fencing timestamps, in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Wall clock (milliseconds since the unix epoch). Works on wasm too.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(millis)
            .unwrap_or_default()
    }
}

/// Saturates instead of wrapping.
fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Hand-driven clock for deterministic tests and simulations. Clones share
/// the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Rc<Cell<i64>>);

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self(Rc::new(Cell::new(start_ms)))
    }

    pub fn set(&self, ms: i64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: i64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.get()
    }
}
