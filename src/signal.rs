//! Termination signal supervision
//!
//! SIGINT and SIGTERM flip a cooperative run flag that the session loop
//! observes on its next tick; teardown ordering stays with the loop. The
//! originating signal is kept so shutdown can log whether the user or the
//! system asked for it.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

const CAUSE_NONE: u8 = 0;
const CAUSE_USER: u8 = 1;
const CAUSE_SYSTEM: u8 = 2;

/// Who requested termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermCause {
    /// SIGINT (^C)
    User,
    /// SIGTERM (service manager)
    System,
}

/// Shared shutdown state
#[derive(Default)]
pub struct ShutdownFlag {
    stop: AtomicBool,
    cause: AtomicU8,
}

impl ShutdownFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn should_run(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
    }

    pub fn trigger(&self, cause: TermCause) {
        let code = match cause {
            TermCause::User => CAUSE_USER,
            TermCause::System => CAUSE_SYSTEM,
        };
        self.cause.store(code, Ordering::SeqCst);
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn cause(&self) -> Option<TermCause> {
        match self.cause.load(Ordering::SeqCst) {
            CAUSE_USER => Some(TermCause::User),
            CAUSE_SYSTEM => Some(TermCause::System),
            _ => None,
        }
    }
}

/// Install the SIGINT/SIGTERM listeners on the current runtime
pub fn spawn_handler(flag: Arc<ShutdownFlag>) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut sigint = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()) {
            Ok(s) => s,
            Err(_) => return,
        };
        let cause = tokio::select! {
            _ = sigterm.recv() => TermCause::System,
            _ = sigint.recv() => TermCause::User,
        };
        debug!(?cause, "Termination signal received");
        flag.trigger(cause);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_running_without_cause() {
        let flag = ShutdownFlag::new();
        assert!(flag.should_run());
        assert_eq!(flag.cause(), None);
    }

    #[test]
    fn test_trigger_records_cause() {
        let flag = ShutdownFlag::new();
        flag.trigger(TermCause::System);
        assert!(!flag.should_run());
        assert_eq!(flag.cause(), Some(TermCause::System));
    }
}
