use super::{CallSite, SuspensionBridge};
use crate::error::{ContextError, Result};
use crate::snapshot::Scope;
use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future whose every poll runs with its bridge's snapshot installed.
///
/// Each `poll` is one execution window: the snapshot is installed before the
/// inner future is polled and the previous context is restored afterwards,
/// including when the inner poll panics. No scope outlives a poll, so the
/// future can move between worker threads and be dropped at any time.
///
/// Resolves to `Err` if installing or restoring the context fails. A
/// restore failure on the poll that completed the inner future discards its
/// output; the loss is logged at `warn`.
#[pin_project::pin_project]
#[must_use = "futures do nothing unless polled"]
pub struct Propagated<F> {
    #[pin]
    inner: F,
    bridge: SuspensionBridge,
    label: Option<Cow<'static, str>>,
    polls: u64,
}

impl<F> Propagated<F> {
    /// Wrap `inner` in `bridge`.
    pub fn new(bridge: SuspensionBridge, inner: F) -> Self {
        Self {
            inner,
            bridge,
            label: None,
            polls: 0,
        }
    }

    /// Attach a task label used in log records.
    pub fn labeled(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Number of times this future has been polled.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// The bridge driving this future.
    pub fn bridge(&self) -> &SuspensionBridge {
        &self.bridge
    }
}

/// Hands the scope back to the bridge on every exit path of a poll.
struct SuspendGuard<'a> {
    bridge: &'a SuspensionBridge,
    call_site: &'a CallSite,
    scope: Option<Scope>,
}

impl SuspendGuard<'_> {
    fn finish(mut self) -> Result<()> {
        match self.scope.take() {
            Some(scope) => self.bridge.on_suspend(self.call_site, scope),
            None => Ok(()),
        }
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            if let Err(err) = self.bridge.on_suspend(self.call_site, scope) {
                tracing::warn!(error = %err, "failed to restore context while unwinding");
            }
        }
    }
}

impl<F: Future> Future for Propagated<F> {
    type Output = Result<F::Output, ContextError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        *this.polls += 1;
        let call_site = CallSite {
            label: this.label.clone(),
            poll: *this.polls,
        };

        let scope = match this.bridge.on_resume(&call_site) {
            Ok(scope) => scope,
            Err(err) => return Poll::Ready(Err(err)),
        };
        let guard = SuspendGuard {
            bridge: this.bridge,
            call_site: &call_site,
            scope: Some(scope),
        };

        let poll = this.inner.poll(cx);

        if let Err(err) = guard.finish() {
            if poll.is_ready() {
                tracing::warn!(
                    task = call_site.label().unwrap_or("-"),
                    poll = call_site.poll(),
                    error = %err,
                    "discarding completed output: context restore failed"
                );
            }
            return Poll::Ready(Err(err));
        }
        poll.map(Ok)
    }
}

/// Wrap `future` in a bridge capturing the current thread's context from
/// the current registry.
///
/// # Examples
///
/// ```
/// use carryover::bridge::propagate;
/// use carryover::registry::ContextRegistry;
///
/// let user = ContextRegistry::global().register_slot("doc-propagate-user");
/// user.set("alice".to_string()).unwrap();
///
/// let task = propagate(async move { user.get::<String>() });
/// let seen = std::thread::spawn(move || futures_lite::future::block_on(task))
///     .join()
///     .unwrap()
///     .unwrap();
/// assert_eq!(seen.as_deref(), Some("alice"));
/// ```
pub fn propagate<F: Future>(future: F) -> Propagated<F> {
    SuspensionBridge::current().wrap(future)
}
