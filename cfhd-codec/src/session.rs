//! Lifecycle shared by decoder and encoder sessions.

use cfhd_core::{Error, Result};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Opened, waiting for prepare.
    #[default]
    Created,
    /// Prepared, no sample processed yet.
    Prepared,
    /// At least one sample processed.
    Active,
    /// Closed; every further call fails.
    Closed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Prepared => "prepared",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
        }
    }

    /// Fail if the session is closed.
    pub(crate) fn check_open(&self) -> Result<()> {
        if *self == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    /// Fail unless the session is open and prepared.
    pub(crate) fn check_ready(&self, operation: &'static str) -> Result<()> {
        match self {
            SessionState::Prepared | SessionState::Active => Ok(()),
            SessionState::Closed => Err(Error::SessionClosed),
            SessionState::Created => Err(Error::InvalidState {
                operation,
                state: self.name(),
            }),
        }
    }
}
