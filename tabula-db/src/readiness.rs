//! One-shot readiness gate shared by tables and databases.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tabula_core::{HandleKind, TabulaError, TabulaResult};
use tokio::sync::OnceCell;

/// Lifecycle state of a table or database handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyState {
    /// Initialisation has not finished (or not started).
    Uninitialized,
    Ready,
    /// Initialisation failed; every waiter sees this error.
    Failed(TabulaError),
    /// Terminal.
    Disconnected,
}

impl ReadyState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadyState::Ready)
    }
}

/// `Uninitialized -> Ready | Failed`, then `-> Disconnected` exactly once.
///
/// The initialiser runs at most once; concurrent waiters park on the same
/// cell and all observe its single outcome.
pub(crate) struct Readiness {
    kind: HandleKind,
    name: String,
    outcome: OnceCell<TabulaResult<()>>,
    disconnected: AtomicBool,
}

impl Readiness {
    pub(crate) fn new(kind: HandleKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            outcome: OnceCell::new(),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Fail with `Disconnected` once the handle is torn down.
    pub(crate) fn check(&self) -> TabulaResult<()> {
        if self.disconnected.load(Ordering::Acquire) {
            return Err(TabulaError::disconnected(self.kind, &self.name));
        }
        Ok(())
    }

    /// Wait for readiness, running `init` if nobody has yet.
    pub(crate) async fn wait_with<F, Fut>(&self, init: F) -> TabulaResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TabulaResult<()>>,
    {
        self.check()?;
        let outcome = self.outcome.get_or_init(init).await.clone();
        // Torn down while parked.
        self.check()?;
        outcome
    }

    /// Flip to `Disconnected`. A second call fails and changes nothing.
    pub(crate) fn disconnect(&self) -> TabulaResult<()> {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return Err(TabulaError::disconnected(self.kind, &self.name));
        }
        Ok(())
    }

    /// Whether initialisation succeeded, even if torn down since.
    pub(crate) fn is_initialised(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(())))
    }

    pub(crate) fn state(&self) -> ReadyState {
        if self.disconnected.load(Ordering::Acquire) {
            return ReadyState::Disconnected;
        }
        match self.outcome.get() {
            None => ReadyState::Uninitialized,
            Some(Ok(())) => ReadyState::Ready,
            Some(Err(e)) => ReadyState::Failed(e.clone()),
        }
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
