//! Cooperative cancellation with a recorded reason
//!
//! A [`Cancellation`] is cheap to clone and is shared by every task of a run.
//! Children observe their parent: cancelling a parent cancels all children,
//! cancelling a child leaves the parent untouched.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Why a fetch was asked to stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// The process is shutting down
    Shutdown,
    /// A run exceeded its deadline
    Deadline,
    /// A run was aborted after a failure elsewhere
    Aborted(String),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Shutdown => write!(f, "shutdown"),
            CancelReason::Deadline => write!(f, "deadline exceeded"),
            CancelReason::Aborted(why) => write!(f, "aborted: {}", why),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
    parent: Option<Arc<Cancellation>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a signal that is cancelled with this one, or on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::new(OnceLock::new()),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Cancel with `reason`; the first reason recorded wins
    pub fn cancel(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason of the cancellation, if cancelled
    pub fn reason(&self) -> Option<CancelReason> {
        if !self.is_cancelled() {
            return None;
        }

        self.reason
            .get()
            .cloned()
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.reason()))
    }

    /// Wait until cancelled and return the reason
    pub async fn cancelled(&self) -> CancelReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(CancelReason::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_child_inherits_parent_reason() {
        let root = Cancellation::new();
        let run = root.child();

        assert_eq!(run.reason(), None);
        root.cancel(CancelReason::Shutdown);

        assert!(run.is_cancelled());
        assert_eq!(run.reason(), Some(CancelReason::Shutdown));
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let root = Cancellation::new();
        let run = root.child();

        run.cancel(CancelReason::Aborted("store failed".into()));

        assert!(!root.is_cancelled());
        assert_eq!(run.reason(), Some(CancelReason::Aborted("store failed".into())));
    }

    #[test]
    fn test_first_reason_wins() {
        let signal = Cancellation::new();
        signal.cancel(CancelReason::Deadline);
        signal.cancel(CancelReason::Shutdown);

        assert_eq!(signal.reason(), Some(CancelReason::Deadline));
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let signal = Cancellation::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel(CancelReason::Deadline);

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, CancelReason::Deadline);
    }
}
