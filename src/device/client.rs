//! The authority client capability.
//!
//! The protocol is written once against [`AuthorityClient`] and the agent
//! holds one instance per authority, each bound to its own site identity.

use std::fmt;
use std::sync::Arc;

use crate::gateway::Gateway;
use crate::protocol::{AuthorizationRequest, AuthorizationResponse, EventAck, EventNotification};

/// Transport-level failures talking to one authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// No answer within the request timeout.
    Timeout,
    /// Connection or I/O failure.
    Transport,
    /// The authority refused the request.
    Rejected,
    /// The answer could not be parsed.
    InvalidResponse,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Timeout => write!(f, "Request timed out"),
            ClientError::Transport => write!(f, "Transport failure"),
            ClientError::Rejected => write!(f, "Request rejected"),
            ClientError::InvalidResponse => write!(f, "Invalid response"),
        }
    }
}

impl std::error::Error for ClientError {}

/// One authority as seen from the device.
pub trait AuthorityClient: Send + Sync {
    /// The site identity requests must be signed for.
    fn site_id(&self) -> &str;

    fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse, ClientError>;

    fn send_event(&self, event: &EventNotification) -> Result<EventAck, ClientError>;
}

impl<T: AuthorityClient + ?Sized> AuthorityClient for Arc<T> {
    fn site_id(&self) -> &str {
        (**self).site_id()
    }

    fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse, ClientError> {
        (**self).authorize(request)
    }

    fn send_event(&self, event: &EventNotification) -> Result<EventAck, ClientError> {
        (**self).send_event(event)
    }
}

/// An in-process authority: calls a [`Gateway`] directly.
#[derive(Debug, Clone)]
pub struct LocalAuthority {
    gateway: Arc<Gateway>,
}

impl LocalAuthority {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

impl AuthorityClient for LocalAuthority {
    fn site_id(&self) -> &str {
        self.gateway.site_id()
    }

    fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse, ClientError> {
        self.gateway.authorize(request).map_err(|_| ClientError::Rejected)
    }

    fn send_event(&self, event: &EventNotification) -> Result<EventAck, ClientError> {
        self.gateway.record_event(event).map_err(|_| ClientError::Rejected)
    }
}
