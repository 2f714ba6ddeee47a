//! # Device Session
//!
//! Owns the one virtual controller registration for the life of the process.
//!
//! ```text
//! Unattached --attach()--> Attached --detach()--> Detached
//! ```
//!
//! There is no way back from `Attached` to `Unattached`, and `Detached` is
//! terminal. Pushes are only valid while `Attached`.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::injector::{DeviceInfo, HdlsState, InjectorError, InputInjector};
use crate::controller::ControllerState;

/// Lifecycle of the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unattached,
    Attached,
    Detached,
}

/// Opaque token for an attached virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle {
    session_id: u64,
    device_id: u64,
}

impl SessionHandle {
    /// Platform session id of the work buffer.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }
}

/// Registration failure. Always fatal to the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("session is already attached")]
    AlreadyAttached,

    #[error("session has been detached")]
    Detached,

    #[error("work buffer allocation rejected: {0}")]
    WorkBuffer(#[source] InjectorError),

    #[error("virtual device registration failed: {0}")]
    Device(#[source] InjectorError),
}

/// Push failure. The caller logs it and skips the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("push while session is {0:?}")]
    NotAttached(SessionState),

    #[error("push with a handle that does not belong to this session")]
    StaleHandle,

    #[error(transparent)]
    Platform(#[from] InjectorError),
}

/// The single virtual controller registration.
pub struct DeviceSession<I: InputInjector> {
    injector: I,
    info: DeviceInfo,
    battery_level: u8,
    state: SessionState,
    handle: Option<SessionHandle>,
}

impl<I: InputInjector> std::fmt::Debug for DeviceSession<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("info", &self.info)
            .field("state", &self.state)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<I: InputInjector> DeviceSession<I> {
    /// Creates an unattached session.
    pub fn new(injector: I, info: DeviceInfo, battery_level: u8) -> Self {
        Self {
            injector,
            info,
            battery_level,
            state: SessionState::Unattached,
            handle: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Register the virtual controller with the platform
    ///
    /// Acquires the work buffer, then registers the device. If registration
    /// fails the work buffer is released again before returning.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The session was already attached or detached
    /// - The platform rejects the work buffer
    /// - The platform refuses the device registration
    pub fn attach(&mut self) -> Result<SessionHandle, AttachError> {
        match self.state {
            SessionState::Unattached => {}
            SessionState::Attached => return Err(AttachError::AlreadyAttached),
            SessionState::Detached => return Err(AttachError::Detached),
        }

        let session_id = self
            .injector
            .attach_work_buffer()
            .map_err(AttachError::WorkBuffer)?;
        debug!("Work buffer attached, session id {}", session_id);

        let device_id = match self.injector.attach_device(&self.info) {
            Ok(id) => id,
            Err(e) => {
                if let Err(release) = self.injector.release_work_buffer(session_id) {
                    warn!("Failed to release work buffer after attach failure: {}", release);
                }
                return Err(AttachError::Device(e));
            }
        };

        let handle = SessionHandle {
            session_id,
            device_id,
        };
        self.handle = Some(handle);
        self.state = SessionState::Attached;
        info!(
            "Virtual {:?} attached (session {}, device {:#x})",
            self.info.kind, session_id, device_id
        );
        Ok(handle)
    }

    /// Transmit one state snapshot to the platform
    ///
    /// # Errors
    ///
    /// Returns error if the session is not attached, the handle is not this
    /// session's, or the platform rejects the state.
    pub fn push(&mut self, handle: SessionHandle, state: &ControllerState) -> Result<(), PushError> {
        if self.state != SessionState::Attached {
            error!("Push attempted while session is {:?}", self.state);
            return Err(PushError::NotAttached(self.state));
        }
        if self.handle != Some(handle) {
            return Err(PushError::StaleHandle);
        }

        let hdls = HdlsState::from_controller(state, self.battery_level);
        self.injector.set_state(handle.device_id, &hdls)?;
        Ok(())
    }

    /// Release the registration
    ///
    /// Idempotent: a handle that is not (or no longer) attached is ignored.
    /// Platform errors during teardown are logged, not returned.
    pub fn detach(&mut self, handle: SessionHandle) {
        if self.state != SessionState::Attached || self.handle != Some(handle) {
            debug!("Detach ignored, session is {:?}", self.state);
            return;
        }

        if let Err(e) = self.injector.detach_device(handle.device_id) {
            warn!("Failed to detach virtual device: {}", e);
        }
        if let Err(e) = self.injector.release_work_buffer(handle.session_id) {
            warn!("Failed to release work buffer: {}", e);
        }

        self.handle = None;
        self.state = SessionState::Detached;
        info!("Virtual controller detached (session {})", handle.session_id);
    }
}
