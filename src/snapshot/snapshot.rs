use super::scope::{Prior, Scope};
use crate::carrier::Carrier;
use crate::config::{BridgeConfig, CapturePolicy};
use crate::error::Result;
use crate::registry::{ContextKey, ContextRegistry, ContextValue, ThreadLocalAccessor};
use std::sync::Arc;

pub(crate) struct Entry {
    pub(crate) key: ContextKey,
    pub(crate) value: Option<ContextValue>,
    pub(crate) accessor: Arc<dyn ThreadLocalAccessor>,
}

/// Write `value` through `accessor`, clearing the slot for `None`.
pub(crate) fn apply(accessor: &dyn ThreadLocalAccessor, value: Option<&ContextValue>) -> Result<()> {
    match value {
        Some(value) => accessor.set_value(value.clone()),
        None => accessor.reset(),
    }
}

/// An immutable copy of ambient context values, taken once.
///
/// Each captured key maps to a value or to "absent". Cloning a snapshot is
/// cheap and shares the captured data.
///
/// # Examples
///
/// ```
/// use carryover::registry::ContextRegistry;
/// use carryover::snapshot::ContextSnapshot;
///
/// let registry = ContextRegistry::new();
/// let user = registry.register_slot("user");
///
/// user.set("alice".to_string()).unwrap();
/// let snapshot = ContextSnapshot::capture(&registry);
/// user.set("bob".to_string()).unwrap();
///
/// snapshot
///     .scope(|| assert_eq!(user.get::<String>().as_deref(), Some("alice")))
///     .unwrap();
/// assert_eq!(user.get::<String>().as_deref(), Some("bob"));
/// ```
#[derive(Clone)]
pub struct ContextSnapshot {
    entries: Arc<[Entry]>,
}

impl ContextSnapshot {
    /// Capture every registered key from the current thread.
    pub fn capture(registry: &ContextRegistry) -> Self {
        Self::capture_from(registry, None)
    }

    /// Capture from `carrier` if it is supplied and non-empty, otherwise from
    /// the current thread.
    pub fn capture_from(registry: &ContextRegistry, carrier: Option<&Carrier>) -> Self {
        Self::capture_with(registry, carrier, &BridgeConfig::default())
    }

    /// Capture according to `config`.
    ///
    /// With a carrier in play only the registered keys the carrier exposes
    /// are captured, unless `config.clear_missing` is set, in which case the
    /// remaining registered keys are captured as absent.
    pub fn capture_with(
        registry: &ContextRegistry,
        carrier: Option<&Carrier>,
        config: &BridgeConfig,
    ) -> Self {
        let accessors = registry.accessors();
        let carrier = match config.capture_policy {
            CapturePolicy::CarrierFirst => carrier.filter(|carrier| !carrier.is_empty()),
            CapturePolicy::ThreadLocalOnly => None,
        };

        let entries: Vec<Entry> = match carrier {
            Some(carrier) => {
                let mut values = registry.values_in(carrier);
                accessors
                    .into_iter()
                    .filter_map(|(key, accessor)| {
                        let value = values.remove(&key);
                        if value.is_none() && !config.clear_missing {
                            return None;
                        }
                        Some(Entry {
                            key,
                            value,
                            accessor,
                        })
                    })
                    .collect()
            }
            None => accessors
                .into_iter()
                .map(|(key, accessor)| Entry {
                    value: accessor.get_value(),
                    key,
                    accessor,
                })
                .collect(),
        };

        let source = if carrier.is_some() { "carrier" } else { "thread_local" };
        tracing::debug!(source, keys = entries.len(), "captured context snapshot");

        Self {
            entries: entries.into(),
        }
    }

    /// Install the captured values on the current thread.
    ///
    /// Returns a [`Scope`] holding the values that were there before. If an
    /// accessor fails, the keys already written are put back and the error is
    /// returned unchanged.
    pub fn install(&self) -> Result<Scope> {
        let mut priors = Vec::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            priors.push(Prior {
                key: entry.key.clone(),
                value: entry.accessor.get_value(),
                accessor: Arc::clone(&entry.accessor),
            });
            if let Err(err) = apply(&*entry.accessor, entry.value.as_ref()) {
                tracing::debug!(key = %entry.key, error = %err, "install failed, rolling back");
                Scope::new(self.clone(), priors).discard();
                return Err(err);
            }
        }
        tracing::trace!(keys = priors.len(), "installed context snapshot");
        Ok(Scope::new(self.clone(), priors))
    }

    /// Run `f` with this snapshot installed, restoring the previous values
    /// afterwards even if `f` panics.
    pub fn scope<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        let scope = self.install()?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        let closed = scope.close();

        match result {
            Ok(r) => closed.map(|()| r),
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Wrap `f` so it runs inside this snapshot on whichever thread calls it.
    pub fn wrap<F, R>(&self, f: F) -> impl FnOnce() -> Result<R>
    where
        F: FnOnce() -> R,
    {
        let snapshot = self.clone();
        move || snapshot.scope(f)
    }

    /// The captured value for `key`.
    ///
    /// `None` if the key was not captured, `Some(None)` if it was captured as
    /// absent.
    pub fn get(&self, key: &ContextKey) -> Option<Option<&ContextValue>> {
        self.entries
            .iter()
            .find(|entry| &entry.key == key)
            .map(|entry| entry.value.as_ref())
    }

    /// Whether `key` was captured, present or absent.
    pub fn contains_key(&self, key: &ContextKey) -> bool {
        self.get(key).is_some()
    }

    /// Captured keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &ContextKey> {
        self.entries.iter().map(|entry| &entry.key)
    }

    /// Number of captured keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key was captured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A carrier holding the captured values that are present.
    pub fn to_carrier(&self) -> Carrier {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .value
                    .as_ref()
                    .map(|value| (entry.key.clone(), value.clone()))
            })
            .collect()
    }
}

impl std::fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|entry| (&entry.key, &entry.value)))
            .finish()
    }
}
