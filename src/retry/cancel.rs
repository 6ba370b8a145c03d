//! Per-call cancellation signal.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// A caller-owned cancellation signal.
///
/// Every operation takes one explicitly. Callers with nothing to cancel pass
/// [`Cancellation::NEVER`], which costs no allocation and never fires.
/// Deadlines are expressed by cancelling the wrapped token from a timer.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Option<CancellationToken>);

impl Cancellation {
    /// A signal that never fires.
    pub const NEVER: Self = Self(None);

    pub fn new(token: CancellationToken) -> Self {
        Self(Some(token))
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Resolves once the signal fires. Pending forever for [`Cancellation::NEVER`].
    pub async fn cancelled(&self) {
        match &self.0 {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// Drives `future` to completion unless the signal fires first, in which
    /// case the future is dropped and `None` is returned.
    pub async fn run_until_cancelled<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = future => Some(output),
        }
    }
}

impl From<CancellationToken> for Cancellation {
    fn from(token: CancellationToken) -> Self {
        Self::new(token)
    }
}
