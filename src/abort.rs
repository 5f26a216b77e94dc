//! Cooperative cancellation signal threaded through a turn.
//!
//! One writer trips the token; any number of readers observe it at the
//! well-defined suspension points the turn loop, stream processor, and
//! tool executor check between units of work. Tripping never interrupts
//! code that is already running — it only changes what happens at the
//! next checkpoint.

use tokio_util::sync::CancellationToken;

/// A monotonic, single-writer/many-reader abort signal. Cloning shares the
/// same underlying token; `child()` derives a token that trips when either
/// it or its parent trips, but tripping the child never trips the parent.
#[derive(Debug, Clone)]
pub struct AbortToken {
    inner: CancellationToken,
}

impl AbortToken {
    pub fn new() -> Self {
        AbortToken {
            inner: CancellationToken::new(),
        }
    }

    /// Trip the token. Idempotent — tripping an already-tripped token is a no-op.
    pub fn trip(&self) {
        self.inner.cancel();
    }

    pub fn is_tripped(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once this token (or any ancestor) is tripped.
    pub async fn tripped(&self) {
        self.inner.cancelled().await;
    }

    /// A derived token scoped to one sub-operation (e.g. a single tool call).
    /// Tripping the child has no effect on `self`.
    pub fn child(&self) -> AbortToken {
        AbortToken {
            inner: self.inner.child_token(),
        }
    }
}

impl Default for AbortToken {
    fn default() -> Self {
        Self::new()
    }
}
