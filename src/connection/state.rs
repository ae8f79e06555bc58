//! Connection lifecycle state machine

/// Lifecycle of one session
///
/// ```text
/// Unopened -> Opening -> Open -> Closed
///                     \-> Failed
/// ```
///
/// `Failed` and `Closed` are terminal; reopening takes a new `acquire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing attempted yet
    Unopened,

    /// Connect, startup and authentication in progress
    Opening,

    /// Session established and usable
    Open,

    /// Opening did not succeed; no handle is exposed
    Failed,

    /// Released
    Closed,
}

/// Rejected state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid connection state transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// State before the attempted transition
    pub from: ConnectionState,
    /// Requested state
    pub to: ConnectionState,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Unopened, Opening) | (Opening, Open) | (Opening, Failed) | (Open, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    /// Transition the caller has already established as valid
    pub(crate) fn advance(&mut self, next: ConnectionState) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid connection state transition: {} -> {}",
            self,
            next
        );
        *self = next;
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unopened => write!(f, "unopened"),
            Self::Opening => write!(f, "opening"),
            Self::Open => write!(f, "open"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
