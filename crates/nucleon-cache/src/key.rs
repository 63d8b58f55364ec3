use std::fmt;
use std::rc::Rc;

/// Separator used to flatten tuple keys into one slot name.
pub const KEY_SEPARATOR: &str = ":";

/// A resolved cache key, handed verbatim to the fetcher.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StaticKey {
    Single(String),
    Tuple(Vec<String>),
}

impl StaticKey {
    /// Slot name inside the cache. Tuple parts are joined with `:`, so
    /// `["user", "42"]` and `"user:42"` share a slot.
    pub fn dedupe_key(&self) -> String {
        match self {
            StaticKey::Single(s) => s.clone(),
            StaticKey::Tuple(parts) => parts.join(KEY_SEPARATOR),
        }
    }

    /// The key itself, or the first element of a tuple (empty if none).
    pub fn first(&self) -> &str {
        match self {
            StaticKey::Single(s) => s,
            StaticKey::Tuple(parts) => parts.first().map(String::as_str).unwrap_or(""),
        }
    }
}

impl fmt::Display for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dedupe_key())
    }
}

impl From<&str> for StaticKey {
    fn from(s: &str) -> Self {
        StaticKey::Single(s.to_owned())
    }
}

impl From<String> for StaticKey {
    fn from(s: String) -> Self {
        StaticKey::Single(s)
    }
}

impl From<Vec<String>> for StaticKey {
    fn from(parts: Vec<String>) -> Self {
        StaticKey::Tuple(parts)
    }
}

impl From<Vec<&str>> for StaticKey {
    fn from(parts: Vec<&str>) -> Self {
        StaticKey::Tuple(parts.into_iter().map(str::to_owned).collect())
    }
}

impl<const N: usize> From<[&str; N]> for StaticKey {
    fn from(parts: [&str; N]) -> Self {
        StaticKey::Tuple(parts.iter().map(|p| (*p).to_owned()).collect())
    }
}

/// Either a fixed key or one computed on every lookup.
///
/// A lazy key returning `None` marks the entry as not ready (starving): it is
/// never fetched and never touches the cache's store.
#[derive(Clone)]
pub enum Key {
    Static(StaticKey),
    Lazy(Rc<dyn Fn() -> Option<StaticKey>>),
}

impl Key {
    pub fn lazy(f: impl Fn() -> Option<StaticKey> + 'static) -> Self {
        Key::Lazy(Rc::new(f))
    }

    pub fn resolve(&self) -> Option<StaticKey> {
        match self {
            Key::Static(key) => Some(key.clone()),
            Key::Lazy(f) => f(),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Static(key) => f.debug_tuple("Static").field(key).finish(),
            Key::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<StaticKey> for Key {
    fn from(key: StaticKey) -> Self {
        Key::Static(key)
    }
}

macro_rules! static_key_into_key {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(key: $ty) -> Self {
                Key::Static(key.into())
            }
        })*
    };
}

static_key_into_key!(&str, String, Vec<String>, Vec<&str>);

impl<const N: usize> From<[&str; N]> for Key {
    fn from(parts: [&str; N]) -> Self {
        Key::Static(parts.into())
    }
}
