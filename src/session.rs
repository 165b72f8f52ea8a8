//! Per-session cancellation and the session state machine.
//!
//! Each extract + import attempt owns a [`SessionToken`]. Work checks the
//! token at fixed checkpoints (before and after every remote call) instead
//! of being aborted, so an abandoned session can still finish its current
//! request but never proceeds past the next checkpoint once cancelled.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

pub type SessionId = u64;

/// Cooperative cancellation handle shared by every step of one session
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    inner: CancellationToken,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Checkpoint: fails with [`Cancelled`] once the session was cancelled
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.inner.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the session is cancelled; used to cut backoff sleeps short
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}

/// Lifecycle of a session
///
/// `Idle -> Extracting -> Importing -> Complete`, with `Error` and
/// `Cancelled` reachable from any state that has not finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Extracting,
    Importing,
    Complete,
    Error,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Complete | SessionState::Error | SessionState::Cancelled
        )
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Extracting) => true,
            (Extracting, Importing) => true,
            (Importing, Complete) => true,
            (Idle | Extracting | Importing, Error | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Extracting => "extracting",
            SessionState::Importing => "importing",
            SessionState::Complete => "complete",
            SessionState::Error => "error",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Mutable job state of one session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
    pub token: SessionToken,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            state: SessionState::Idle,
            token: SessionToken::new(),
        }
    }

    /// Move to `next`; returns false and leaves the state alone if the
    /// transition is not allowed
    pub fn advance(&mut self, next: SessionState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}
