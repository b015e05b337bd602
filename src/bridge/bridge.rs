use super::Propagated;
use crate::carrier::Carrier;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::registry::ContextRegistry;
use crate::snapshot::{ContextSnapshot, Scope};
use std::borrow::Cow;
use std::future::Future;

/// Per-resume metadata a scheduler may pass to the hooks.
///
/// It never influences what gets installed; it only labels log records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub(super) label: Option<Cow<'static, str>>,
    pub(super) poll: u64,
}

impl CallSite {
    /// An unlabeled call site.
    pub fn new() -> Self {
        Self::default()
    }

    /// A call site carrying a task label.
    pub fn labeled(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: Some(label.into()),
            poll: 0,
        }
    }

    /// Set the resumption counter.
    #[must_use]
    pub fn with_poll(mut self, poll: u64) -> Self {
        self.poll = poll;
        self
    }

    /// The task label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// How many times the task has been resumed, counting this one.
    pub fn poll(&self) -> u64 {
        self.poll
    }
}

/// Carries one task's captured context across its suspension points.
///
/// The snapshot is captured once, when the bridge is created. After that
/// the scheduler calls [`on_resume`](Self::on_resume) whenever the task
/// starts running on some thread and [`on_suspend`](Self::on_suspend) with
/// the returned [`Scope`] when it stops. The two calls must strictly
/// alternate; the bridge trusts the scheduler on this and does not check.
///
/// # Examples
///
/// ```
/// use carryover::bridge::{CallSite, SuspensionBridge};
/// use carryover::registry::ContextRegistry;
///
/// let registry = ContextRegistry::new();
/// let trace = registry.register_slot("trace-id");
/// trace.set("t-1".to_string()).unwrap();
///
/// let bridge = SuspensionBridge::new(&registry, None);
/// let worker = std::thread::spawn(move || {
///     let call_site = CallSite::labeled("job");
///     let scope = bridge.on_resume(&call_site).unwrap();
///     let seen = trace.get::<String>();
///     bridge.on_suspend(&call_site, scope).unwrap();
///     (seen, trace.get::<String>())
/// });
///
/// let (during, after) = worker.join().unwrap();
/// assert_eq!(during.as_deref(), Some("t-1"));
/// assert_eq!(after, None);
/// ```
#[derive(Clone, Debug)]
pub struct SuspensionBridge {
    snapshot: ContextSnapshot,
}

impl SuspensionBridge {
    /// Capture from `carrier` if supplied and non-empty, otherwise from the
    /// current thread.
    pub fn new(registry: &ContextRegistry, carrier: Option<&Carrier>) -> Self {
        Self::with_config(registry, carrier, &BridgeConfig::default())
    }

    /// Capture according to `config`.
    pub fn with_config(
        registry: &ContextRegistry,
        carrier: Option<&Carrier>,
        config: &BridgeConfig,
    ) -> Self {
        Self::from_snapshot(ContextSnapshot::capture_with(registry, carrier, config))
    }

    /// Capture the current thread's values using the current registry.
    pub fn current() -> Self {
        let registry = ContextRegistry::current();
        Self::new(&registry, None)
    }

    /// Use an already captured snapshot.
    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        Self { snapshot }
    }

    /// The snapshot this bridge installs.
    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    /// The task is about to run on the current thread.
    ///
    /// Installs the captured snapshot and returns the scope to hand back to
    /// [`on_suspend`](Self::on_suspend). The call site is only used for
    /// logging; nothing is re-captured.
    pub fn on_resume(&self, call_site: &CallSite) -> Result<Scope> {
        tracing::trace!(
            task = call_site.label().unwrap_or("-"),
            poll = call_site.poll(),
            "resuming task"
        );
        self.snapshot.install()
    }

    /// The task stopped running on the current thread.
    ///
    /// Restores whatever was installed before the matching
    /// [`on_resume`](Self::on_resume). Must be called exactly once per
    /// resume, on every exit path of the execution window.
    pub fn on_suspend(&self, call_site: &CallSite, scope: Scope) -> Result<()> {
        tracing::trace!(
            task = call_site.label().unwrap_or("-"),
            poll = call_site.poll(),
            "suspending task"
        );
        scope.close()
    }

    /// Wrap `future` so each of its polls runs inside this bridge.
    pub fn wrap<F: Future>(self, future: F) -> Propagated<F> {
        Propagated::new(self, future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ContextValue;

    #[test]
    fn capture_happens_once_at_creation() {
        let registry = ContextRegistry::new();
        let slot = registry.register_slot("bridge_once");
        slot.set(1_u32).unwrap();

        let bridge = SuspensionBridge::new(&registry, None);
        slot.set(2_u32).unwrap();

        for poll in 1..=3 {
            let call_site = CallSite::new().with_poll(poll);
            let scope = bridge.on_resume(&call_site).unwrap();
            assert_eq!(slot.get::<u32>(), Some(1));
            slot.set(100_u32).unwrap();
            bridge.on_suspend(&call_site, scope).unwrap();
            assert_eq!(slot.get::<u32>(), Some(2));
        }
    }

    #[test]
    fn carrier_wins_over_thread_local() {
        let registry = ContextRegistry::new();
        let slot = registry.register_slot("bridge_carrier");
        slot.set("thread".to_string()).unwrap();

        let carrier = Carrier::of("bridge_carrier", ContextValue::new("carrier".to_string()));
        let bridge = SuspensionBridge::new(&registry, Some(&carrier));

        let call_site = CallSite::new();
        let scope = bridge.on_resume(&call_site).unwrap();
        assert_eq!(slot.get::<String>().as_deref(), Some("carrier"));
        bridge.on_suspend(&call_site, scope).unwrap();
        assert_eq!(slot.get::<String>().as_deref(), Some("thread"));
    }

    #[test]
    fn current_uses_scoped_registry() {
        ContextRegistry::scope(|| {
            let slot = ContextRegistry::current().register_slot("bridge_current");
            slot.set(5_u8).unwrap();
            let bridge = SuspensionBridge::current();
            assert_eq!(bridge.snapshot().len(), 1);
        });
    }

    #[test]
    fn call_site_accessors() {
        let call_site = CallSite::labeled("worker").with_poll(3);
        assert_eq!(call_site.label(), Some("worker"));
        assert_eq!(call_site.poll(), 3);
        assert_eq!(CallSite::new().label(), None);
    }
}
