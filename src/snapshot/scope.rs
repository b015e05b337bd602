use super::snapshot::apply;
use super::ContextSnapshot;
use crate::error::Result;
use crate::registry::{ContextKey, ContextValue, ThreadLocalAccessor};
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) struct Prior {
    pub(crate) key: ContextKey,
    pub(crate) value: Option<ContextValue>,
    pub(crate) accessor: Arc<dyn ThreadLocalAccessor>,
}

/// A snapshot installed on the current thread.
///
/// Holds, for every key of the originating snapshot, the value that was on
/// this thread right before installation. [`Scope::close`] writes those
/// values back; dropping an unclosed scope does the same. Restoration
/// overwrites whatever is in the slot at that moment.
///
/// A scope is bound to the thread that created it and is not `Send`.
///
/// # Examples
///
/// ```
/// use carryover::registry::ContextRegistry;
/// use carryover::snapshot::ContextSnapshot;
///
/// let registry = ContextRegistry::new();
/// let span = registry.register_slot("span");
/// span.set(1_u64).unwrap();
/// let snapshot = ContextSnapshot::capture(&registry);
///
/// span.set(2_u64).unwrap();
/// let scope = snapshot.install().unwrap();
/// assert_eq!(span.get::<u64>(), Some(1));
///
/// scope.close().unwrap();
/// assert_eq!(span.get::<u64>(), Some(2));
/// ```
#[must_use = "dropping a Scope immediately restores the previous context"]
pub struct Scope {
    snapshot: ContextSnapshot,
    priors: Vec<Prior>,
    closed: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl Scope {
    pub(crate) fn new(snapshot: ContextSnapshot, priors: Vec<Prior>) -> Self {
        Self {
            snapshot,
            priors,
            closed: false,
            _thread_bound: PhantomData,
        }
    }

    /// Restore the values displaced by installation.
    ///
    /// Every key is written back even if an accessor fails; the first
    /// failure is returned.
    pub fn close(mut self) -> Result<()> {
        self.restore()
    }

    /// The value that was on this thread for `key` before installation.
    ///
    /// `None` if the key is not part of this scope, `Some(None)` if it was
    /// absent.
    pub fn prior(&self, key: &ContextKey) -> Option<Option<&ContextValue>> {
        self.priors
            .iter()
            .find(|prior| &prior.key == key)
            .map(|prior| prior.value.as_ref())
    }

    /// All displaced values, in installation order.
    pub fn priors(&self) -> impl Iterator<Item = (&ContextKey, Option<&ContextValue>)> {
        self.priors
            .iter()
            .map(|prior| (&prior.key, prior.value.as_ref()))
    }

    /// The snapshot this scope installed.
    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    /// Restore after a failed installation, logging rather than returning
    /// secondary failures.
    pub(crate) fn discard(mut self) {
        if let Err(err) = self.restore() {
            tracing::warn!(error = %err, "rollback of partial install failed");
        }
    }

    fn restore(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_err = None;
        for prior in self.priors.iter().rev() {
            if let Err(err) = apply(&*prior.accessor, prior.value.as_ref()) {
                tracing::debug!(key = %prior.key, error = %err, "restore failed");
                first_err.get_or_insert(err);
            }
        }
        tracing::trace!(keys = self.priors.len(), "closed context scope");

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            tracing::warn!(error = %err, "scope dropped without close failed to restore context");
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("keys", &self.priors.len())
            .field("closed", &self.closed)
            .finish()
    }
}
