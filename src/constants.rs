//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

use std::time::Duration;

// =============================================================================
// Network
// =============================================================================

/// Default TCP port for the control channel
pub const DEFAULT_PORT: u16 = 7130;

/// Default bind address (dual-stack loopback)
pub const DEFAULT_BIND: &str = "::1";

/// Client socket receive buffer size
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Idle timeout on the peer socket before the session is torn down
pub const SOCK_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Timing - Session Loop
// =============================================================================

/// Readiness-wait tick of the session loop
pub const SELECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Total deadline for flushing queued outbound bytes to the client
pub const TIMEOUT_RT: Duration = Duration::from_secs(10);

/// Backoff between partial-write retries on the client socket
pub const SEND_RETRY_DELAY: Duration = Duration::from_millis(10);

// =============================================================================
// Timing - Admission
// =============================================================================

/// How long a displaced-peer probe waits for a reply-alive answer
pub const ASK_ALIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll cadence while waiting for the reply-alive flag
pub const ASK_ALIVE_POLL: Duration = Duration::from_millis(10);

// =============================================================================
// Timing - MJPG helper
// =============================================================================

/// Survival window after spawning the helper before reporting success
pub const WAIT_START_MJPG: Duration = Duration::from_millis(100);

/// Grace period between SIGINT and SIGKILL when stopping the helper
pub const WAIT_STOP_MJPG: Duration = Duration::from_millis(2200);

// =============================================================================
// Logging
// =============================================================================

/// Default numeric log level (0=FATAL .. 5=TRACE)
pub const DEFAULT_LOG_LEVEL: u8 = 3;

/// How many characters of a text-enter burst are echoed in the response detail
pub const MAX_TEXT_PREVIEW: usize = 20;
