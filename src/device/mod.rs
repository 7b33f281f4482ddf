//! Device agent.
//!
//! The device boots locked, asks every authority for its share, rebuilds the
//! key, opens its protected payload and reports each outcome back. All
//! failures end in a terminal [`DeviceState`]; none escape as panics.
//!
//! # Components
//! - `state_machine`: the explicit LOCKED → AUTHORIZING → terminal machine.
//! - `client`: the [`AuthorityClient`] capability, written once and used for
//!   every authority.
//! - `agent`: orchestration of boot, authorization and mount.

pub mod agent;
pub mod client;
#[cfg(feature = "client")]
pub mod http_client;
pub mod state_machine;

pub use agent::DeviceAgent;
pub use client::{AuthorityClient, ClientError, LocalAuthority};
#[cfg(feature = "client")]
pub use http_client::HttpAuthorityClient;
pub use state_machine::{DeviceState, StateMachine, StateObserver};

use std::fmt;

use crate::payload::PayloadError;
use crate::sharing::SharingError;
use crate::storage::StorageError;

/// Errors surfaced by the device agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// At least one authority refused, timed out or returned no share.
    AuthorizationFailure,
    /// The two shares have different lengths.
    LengthMismatch,
    /// The reconstructed key did not open the payload.
    AuthenticationFailure,
    /// The protected blob could not be read.
    Io(StorageError),
    /// Operation not allowed in the current state.
    InvalidState,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::AuthorizationFailure => write!(f, "Authorization failed"),
            DeviceError::LengthMismatch => write!(f, "Shares length mismatch"),
            DeviceError::AuthenticationFailure => write!(f, "Payload authentication failed"),
            DeviceError::Io(e) => write!(f, "Cannot read protected payload: {}", e),
            DeviceError::InvalidState => write!(f, "Operation not allowed in current state"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<SharingError> for DeviceError {
    fn from(_: SharingError) -> Self {
        DeviceError::LengthMismatch
    }
}

impl From<PayloadError> for DeviceError {
    fn from(_: PayloadError) -> Self {
        DeviceError::AuthenticationFailure
    }
}

impl From<StorageError> for DeviceError {
    fn from(err: StorageError) -> Self {
        DeviceError::Io(err)
    }
}
