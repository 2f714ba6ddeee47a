//! # Device Module
//!
//! The virtual controller as seen by the platform.
//!
//! This module handles:
//! - The privileged input-injection boundary and its host simulation
//! - The attach / push / detach lifecycle of the single device session

pub mod injector;
pub mod session;

pub use injector::{
    DeviceInfo, DeviceKind, HdlsState, InjectorError, InputInjector, SimulatedInjector,
};
pub use session::{AttachError, DeviceSession, PushError, SessionHandle, SessionState};
