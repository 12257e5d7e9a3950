//! Request context: optional deadline plus a cooperative cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{Code, DriverError};

/// Clones share the cancellation flag, so cancelling any clone cancels all of them.
#[derive(Clone, Debug, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// Context with no deadline that is cancelled only explicitly
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline), cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Derive a context sharing this one's cancellation flag. The earlier of the
    /// two deadlines wins.
    pub fn timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, candidate) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self { deadline, cancelled: Arc::clone(&self.cancelled) }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Called by drivers before doing any work on behalf of this context.
    pub fn check(&self) -> Result<(), DriverError> {
        if self.is_cancelled() {
            return Err(DriverError::new(Code::Cancelled, "context cancelled"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(DriverError::new(Code::DeadlineExceeded, "context deadline exceeded"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_expires() {
        assert!(Context::background().check().is_ok());
    }

    #[test]
    fn elapsed_deadline_reports_deadline_exceeded() {
        let ctx = Context::with_deadline(Instant::now());
        assert_eq!(ctx.check().unwrap_err().code, Code::DeadlineExceeded);
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let ctx = Context::background();
        let derived = ctx.timeout(Duration::from_secs(60));
        ctx.cancel();
        assert_eq!(derived.check().unwrap_err().code, Code::Cancelled);
    }

    #[test]
    fn derived_timeout_keeps_earlier_deadline() {
        let parent = Context::with_timeout(Duration::from_millis(10));
        let child = parent.timeout(Duration::from_secs(3600));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
