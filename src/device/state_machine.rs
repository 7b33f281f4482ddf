//! Device state machine.
//!
//! # States
//! - **Locked**: initial state on every boot; payload sealed.
//! - **Authorizing**: share requests in flight, or shares held and the
//!   payload being opened.
//! - **Mounted**: payload decrypted and exposed (terminal).
//! - **AuthFailed**: an authority refused or timed out (terminal).
//! - **MountFailed**: shares obtained but the payload did not open (terminal).
//!
//! Transitions are the only mutation path. Terminal states are left only by
//! booting again.

use std::fmt;

use super::DeviceError;

/// Possible states of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Locked,
    Authorizing,
    Mounted,
    AuthFailed,
    MountFailed,
}

impl DeviceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeviceState::Mounted | DeviceState::AuthFailed | DeviceState::MountFailed)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Locked => "LOCKED",
            DeviceState::Authorizing => "AUTHORIZING",
            DeviceState::Mounted => "MOUNTED",
            DeviceState::AuthFailed => "AUTH_FAILED",
            DeviceState::MountFailed => "MOUNT_FAILED",
        };
        f.write_str(name)
    }
}

/// Observer trait for state changes.
pub trait StateObserver: Send + Sync {
    fn on_state_change(&self, from: DeviceState, to: DeviceState);
}

/// The device state machine.
pub struct StateMachine {
    current_state: DeviceState,
    observers: Vec<Box<dyn StateObserver>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Creates a new state machine in the Locked state.
    pub fn new() -> Self {
        Self {
            current_state: DeviceState::Locked,
            observers: Vec::new(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> DeviceState {
        self.current_state
    }

    /// Adds a state observer.
    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    fn transition(&mut self, new_state: DeviceState) {
        let from = self.current_state;
        log::info!("State transition: {} -> {}", from, new_state);
        self.current_state = new_state;
        for obs in &self.observers {
            obs.on_state_change(from, new_state);
        }
    }

    /// Boot: any state -> Locked.
    pub fn boot(&mut self) {
        self.transition(DeviceState::Locked);
    }

    /// Locked -> Authorizing.
    pub fn begin_authorizing(&mut self) -> Result<(), DeviceError> {
        match self.current_state {
            DeviceState::Locked => {
                self.transition(DeviceState::Authorizing);
                Ok(())
            }
            _ => Err(DeviceError::InvalidState),
        }
    }

    /// Authorizing -> Mounted.
    pub fn mounted(&mut self) -> Result<(), DeviceError> {
        self.finish(DeviceState::Mounted)
    }

    /// Authorizing -> AuthFailed.
    pub fn auth_failed(&mut self) -> Result<(), DeviceError> {
        self.finish(DeviceState::AuthFailed)
    }

    /// Authorizing -> MountFailed.
    pub fn mount_failed(&mut self) -> Result<(), DeviceError> {
        self.finish(DeviceState::MountFailed)
    }

    fn finish(&mut self, terminal: DeviceState) -> Result<(), DeviceError> {
        if self.current_state != DeviceState::Authorizing {
            return Err(DeviceError::InvalidState);
        }
        self.transition(terminal);
        Ok(())
    }
}
