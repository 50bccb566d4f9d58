use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::Dispatch;
use tracing::instrument::{WithDispatch, WithSubscriber};

/// Per-invocation handle threaded through every engine and driver call.
///
/// Carries the cancellation signal and the log sink. The default logs
/// nowhere (`Dispatch::none()`), so nothing depends on a process-wide
/// subscriber and tests can run side by side with their own sinks.
#[derive(Debug, Clone)]
pub struct Context {
    cancel: CancellationToken,
    log: Dispatch,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Dispatch::none())
    }
}

impl Context {
    pub fn new(log: Dispatch) -> Self {
        Self {
            cancel: CancellationToken::new(),
            log,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn log(&self) -> &Dispatch {
        &self.log
    }

    /// Run synchronous work with this context's log sink active.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.log, f)
    }

    /// Attach this context's log sink to a future.
    pub fn instrument<F: Future>(&self, fut: F) -> WithDispatch<F> {
        fut.with_subscriber(self.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let ctx = Context::default();
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn external_token_drives_cancellation() {
        let token = CancellationToken::new();
        let ctx = Context::default().with_cancellation(token.clone());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn default_log_sink_is_disabled() {
        let ctx = Context::default();
        let enabled = ctx.in_scope(|| tracing::enabled!(tracing::Level::ERROR));
        assert!(!enabled);
    }

    fn info_context() -> Context {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .finish();
        Context::new(Dispatch::new(subscriber))
    }

    #[test]
    fn in_scope_uses_the_context_sink() {
        let ctx = info_context();
        assert!(ctx.in_scope(|| tracing::enabled!(tracing::Level::INFO)));
        assert!(!ctx.in_scope(|| tracing::enabled!(tracing::Level::DEBUG)));
    }

    #[tokio::test]
    async fn instrumented_futures_use_the_context_sink() {
        let ctx = info_context();
        let enabled = ctx
            .instrument(async { tracing::enabled!(tracing::Level::INFO) })
            .await;
        assert!(enabled);
    }
}
