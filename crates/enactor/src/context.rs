//! Call context and progress traits
//!
//! These let plugins stop cooperatively and let callers watch a run
//! without the engine depending on any particular terminal UI.

use crate::record::{Phase, RecordEntry};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared flag used to cancel a run from another thread
///
/// Cancelling suppresses new waves. Instructions already dispatched are
/// allowed to finish and are recorded before rollback starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Context passed to every plugin call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// When the instruction times out, if a timeout is configured
    pub deadline: Option<Instant>,
    /// Cancellation flag of the run
    pub cancel: CancelToken,
}

impl CallContext {
    pub fn new(deadline: Option<Instant>, cancel: CancelToken) -> Self {
        Self { deadline, cancel }
    }

    /// Context with a deadline `timeout` from now
    pub fn with_timeout(timeout: Duration, cancel: CancelToken) -> Self {
        Self::new(Some(Instant::now() + timeout), cancel)
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Whether a long-running plugin should give up now
    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.expired()
    }
}

/// Progress callback for a run
///
/// Called from the coordinating thread only, after the engine's own
/// bookkeeping for the event is done.
pub trait ProgressCallback: Send {
    /// A wave of `count` instructions is about to be dispatched
    fn on_wave_start(&mut self, phase: Phase, wave: usize, count: usize);

    /// An instruction outcome was appended to the execution record
    fn on_instruction_complete(&mut self, entry: &RecordEntry);

    /// All instructions of a wave have resolved
    fn on_wave_complete(&mut self, phase: Phase, wave: usize);

    /// The forward pass stopped; `actions` compensating actions follow
    fn on_rollback_start(&mut self, actions: usize);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_wave_start(&mut self, _phase: Phase, _wave: usize, _count: usize) {}
    fn on_instruction_complete(&mut self, _entry: &RecordEntry) {}
    fn on_wave_complete(&mut self, _phase: Phase, _wave: usize) {}
    fn on_rollback_start(&mut self, _actions: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_call_context_deadline() {
        let ctx = CallContext::default();
        assert!(ctx.remaining().is_none());
        assert!(!ctx.should_stop());

        let ctx = CallContext::new(Some(Instant::now()), CancelToken::new());
        assert!(ctx.expired());
        assert!(ctx.should_stop());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));

        let ctx = CallContext::with_timeout(Duration::from_secs(60), CancelToken::new());
        assert!(!ctx.expired());
        assert!(ctx.remaining().unwrap() > Duration::from_secs(50));
    }

    #[test]
    fn test_call_context_cancelled() {
        let cancel = CancelToken::new();
        let ctx = CallContext::new(None, cancel.clone());
        cancel.cancel();
        assert!(ctx.should_stop());
    }
}
