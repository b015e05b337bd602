use crate::registry::{ContextKey, ContextValue};
use std::collections::hash_map;
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable key/value context passed along a reactive pipeline.
///
/// Every "modification" returns a new carrier; existing handles never
/// observe a change.
///
/// # Examples
///
/// ```
/// use carryover::carrier::Carrier;
/// use carryover::registry::ContextValue;
///
/// let base = Carrier::empty();
/// let traced = base.put("trace-id", ContextValue::new("abc".to_string()));
///
/// assert!(base.is_empty());
/// assert_eq!(traced.get_as::<String>(&"trace-id".into()).as_deref(), Some("abc"));
/// ```
#[derive(Default)]
pub struct Carrier {
    values: Arc<HashMap<ContextKey, ContextValue>>,
}

impl Carrier {
    /// A carrier with no values.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A carrier holding a single value.
    pub fn of(key: impl Into<ContextKey>, value: ContextValue) -> Self {
        Self::empty().put(key, value)
    }

    /// A new carrier with `key` set to `value`.
    pub fn put(&self, key: impl Into<ContextKey>, value: ContextValue) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value);
        Self {
            values: Arc::new(values),
        }
    }

    /// A new carrier with every entry of `entries` added.
    pub fn put_all<I>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (ContextKey, ContextValue)>,
    {
        let mut values = (*self.values).clone();
        values.extend(entries);
        Self {
            values: Arc::new(values),
        }
    }

    /// A new carrier without `key`.
    pub fn delete(&self, key: &ContextKey) -> Self {
        if !self.values.contains_key(key) {
            return self.clone();
        }
        let mut values = (*self.values).clone();
        values.remove(key);
        Self {
            values: Arc::new(values),
        }
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &ContextKey) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// The value stored under `key`, cloned out as `T`.
    pub fn get_as<T: Clone + 'static>(&self, key: &ContextKey) -> Option<T> {
        self.get(key).and_then(|value| value.get::<T>())
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &ContextKey) -> bool {
        self.values.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the carrier holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all entries, in no particular order.
    pub fn iter(&self) -> hash_map::Iter<'_, ContextKey, ContextValue> {
        self.values.iter()
    }
}

impl Clone for Carrier {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl FromIterator<(ContextKey, ContextValue)> for Carrier {
    fn from_iter<I: IntoIterator<Item = (ContextKey, ContextValue)>>(iter: I) -> Self {
        Self {
            values: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl<'a> IntoIterator for &'a Carrier {
    type Item = (&'a ContextKey, &'a ContextValue);
    type IntoIter = hash_map::Iter<'a, ContextKey, ContextValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}
