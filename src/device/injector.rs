//! # Input Injector Boundary
//!
//! The privileged platform interface that lets software register a virtual
//! controller (an "HDLS" device) and feed it state. The service only needs five
//! calls from it; [`InputInjector`] names exactly those.
//!
//! ## Platform State Encoding
//!
//! The platform takes sticks as signed integers in `-32767..=32767` and a
//! battery level in `0..=4`. [`HdlsState::from_controller`] converts the
//! normalized [`ControllerState`] into that form.
//!
//! [`SimulatedInjector`] is the host backend: it tracks registrations and the
//! last pushed state in memory, which is also what the end-to-end tests observe.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::controller::{ControllerState, StickPosition};

/// Platform stick magnitude at full deflection.
pub const JOYSTICK_MAX: i32 = 32767;

/// Highest reportable battery level.
pub const BATTERY_LEVEL_MAX: u8 = 4;

/// Platform-side failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectorError {
    #[error("privileged input service unavailable: {0}")]
    Unavailable(String),

    #[error("work buffer rejected: {0}")]
    WorkBufferRejected(String),

    #[error("unknown device handle {0:#x}")]
    UnknownDevice(u64),

    #[error("platform call failed with result {0:#x}")]
    Platform(u32),
}

/// Which physical controller the virtual device presents as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    ProController,
    JoyconLeft,
    JoyconRight,
}

/// Registration descriptor for the virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub kind: DeviceKind,
    /// Body colour, 0xRRGGBB
    pub body_color: u32,
    /// Button colour, 0xRRGGBB
    pub buttons_color: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            kind: DeviceKind::ProController,
            body_color: 0x2D2D2D,
            buttons_color: 0xE6E6E6,
        }
    }
}

/// Platform stick value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalogStick {
    pub x: i32,
    pub y: i32,
}

impl From<StickPosition> for AnalogStick {
    fn from(pos: StickPosition) -> Self {
        Self {
            x: scale_axis(pos.x),
            y: scale_axis(pos.y),
        }
    }
}

fn scale_axis(value: f32) -> i32 {
    (value.clamp(-1.0, 1.0) * JOYSTICK_MAX as f32).round() as i32
}

/// State block handed to the platform on each push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HdlsState {
    pub buttons: u64,
    pub analog_stick_l: AnalogStick,
    pub analog_stick_r: AnalogStick,
    pub battery_level: u8,
}

impl HdlsState {
    /// Converts a normalized controller state into the platform encoding.
    pub fn from_controller(state: &ControllerState, battery_level: u8) -> Self {
        Self {
            buttons: state.buttons(),
            analog_stick_l: state.left_stick().into(),
            analog_stick_r: state.right_stick().into(),
            battery_level: battery_level.min(BATTERY_LEVEL_MAX),
        }
    }
}

/// Privileged virtual-controller interface of the platform.
///
/// Calls are made from one owner at a time; implementations need not be
/// reentrant.
#[cfg_attr(test, mockall::automock)]
pub trait InputInjector: Send {
    /// Acquire the backing work buffer; returns the platform session id.
    fn attach_work_buffer(&mut self) -> Result<u64, InjectorError>;

    /// Register one virtual device; returns its device handle.
    fn attach_device(&mut self, info: &DeviceInfo) -> Result<u64, InjectorError>;

    /// Set the device's current state.
    fn set_state(&mut self, device: u64, state: &HdlsState) -> Result<(), InjectorError>;

    /// Unregister the device.
    fn detach_device(&mut self, device: u64) -> Result<(), InjectorError>;

    /// Release the work buffer.
    fn release_work_buffer(&mut self, session: u64) -> Result<(), InjectorError>;
}

#[derive(Debug, Default)]
struct SimulatedDevice {
    next_id: u64,
    session: Option<u64>,
    device: Option<(u64, DeviceInfo)>,
    last_state: Option<HdlsState>,
    pushes: u64,
}

/// In-memory injector for hosts without the privileged platform service.
///
/// Clones share one simulated device, so a clone kept aside observes what the
/// service pushed.
///
/// # Examples
///
/// ```
/// use hidplus_bridge::device::{DeviceInfo, InputInjector, SimulatedInjector};
///
/// let mut injector = SimulatedInjector::new();
/// let observer = injector.clone();
///
/// injector.attach_work_buffer().unwrap();
/// injector.attach_device(&DeviceInfo::default()).unwrap();
/// assert!(observer.is_attached());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimulatedInjector {
    inner: Arc<Mutex<SimulatedDevice>>,
}

impl SimulatedInjector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedDevice> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a device is currently registered.
    pub fn is_attached(&self) -> bool {
        self.lock().device.is_some()
    }

    /// The registered device's descriptor, if any.
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.lock().device.map(|(_, info)| info)
    }

    /// Last state the platform accepted.
    pub fn last_state(&self) -> Option<HdlsState> {
        self.lock().last_state
    }

    /// Number of accepted pushes.
    pub fn push_count(&self) -> u64 {
        self.lock().pushes
    }
}

impl InputInjector for SimulatedInjector {
    fn attach_work_buffer(&mut self) -> Result<u64, InjectorError> {
        let mut sim = self.lock();
        if sim.session.is_some() {
            return Err(InjectorError::WorkBufferRejected(
                "work buffer already attached".to_string(),
            ));
        }
        sim.next_id += 1;
        let id = sim.next_id;
        sim.session = Some(id);
        debug!("Simulated work buffer attached (session {})", id);
        Ok(id)
    }

    fn attach_device(&mut self, info: &DeviceInfo) -> Result<u64, InjectorError> {
        let mut sim = self.lock();
        if sim.session.is_none() {
            return Err(InjectorError::Unavailable("no work buffer".to_string()));
        }
        sim.next_id += 1;
        let id = sim.next_id;
        sim.device = Some((id, *info));
        debug!("Simulated {:?} attached (device {:#x})", info.kind, id);
        Ok(id)
    }

    fn set_state(&mut self, device: u64, state: &HdlsState) -> Result<(), InjectorError> {
        let mut sim = self.lock();
        match sim.device {
            Some((id, _)) if id == device => {
                trace!("Simulated state: {:?}", state);
                sim.last_state = Some(*state);
                sim.pushes += 1;
                Ok(())
            }
            _ => Err(InjectorError::UnknownDevice(device)),
        }
    }

    fn detach_device(&mut self, device: u64) -> Result<(), InjectorError> {
        let mut sim = self.lock();
        match sim.device {
            Some((id, _)) if id == device => {
                sim.device = None;
                Ok(())
            }
            _ => Err(InjectorError::UnknownDevice(device)),
        }
    }

    fn release_work_buffer(&mut self, session: u64) -> Result<(), InjectorError> {
        let mut sim = self.lock();
        if sim.session == Some(session) {
            sim.session = None;
            Ok(())
        } else {
            Err(InjectorError::Platform(0xCA01))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Stick, BUTTON_A, BUTTON_ZL};

    #[test]
    fn test_scale_axis() {
        assert_eq!(scale_axis(0.0), 0);
        assert_eq!(scale_axis(1.0), JOYSTICK_MAX);
        assert_eq!(scale_axis(-1.0), -JOYSTICK_MAX);
        assert_eq!(scale_axis(0.5), 16384);
        assert_eq!(scale_axis(4.0), JOYSTICK_MAX);
    }

    #[test]
    fn test_hdls_state_from_controller() {
        let mut state = ControllerState::default();
        state.set_buttons(BUTTON_A | BUTTON_ZL);
        state.set_stick(Stick::Left, StickPosition::new(1.0, 0.0));
        state.set_stick(Stick::Right, StickPosition::new(0.0, -1.0));

        let hdls = HdlsState::from_controller(&state, 3);
        assert_eq!(hdls.buttons, BUTTON_A | BUTTON_ZL);
        assert_eq!(hdls.analog_stick_l, AnalogStick { x: JOYSTICK_MAX, y: 0 });
        assert_eq!(hdls.analog_stick_r, AnalogStick { x: 0, y: -JOYSTICK_MAX });
        assert_eq!(hdls.battery_level, 3);
    }

    #[test]
    fn test_battery_level_is_capped() {
        let hdls = HdlsState::from_controller(&ControllerState::default(), 200);
        assert_eq!(hdls.battery_level, BATTERY_LEVEL_MAX);
    }

    #[test]
    fn test_simulated_lifecycle() {
        let mut injector = SimulatedInjector::new();
        let observer = injector.clone();

        let session = injector.attach_work_buffer().unwrap();
        let device = injector.attach_device(&DeviceInfo::default()).unwrap();
        assert!(observer.is_attached());
        assert_eq!(observer.device_info(), Some(DeviceInfo::default()));

        let hdls = HdlsState {
            buttons: BUTTON_A,
            ..HdlsState::default()
        };
        injector.set_state(device, &hdls).unwrap();
        assert_eq!(observer.last_state(), Some(hdls));
        assert_eq!(observer.push_count(), 1);

        injector.detach_device(device).unwrap();
        injector.release_work_buffer(session).unwrap();
        assert!(!observer.is_attached());
    }

    #[test]
    fn test_simulated_rejects_unknown_device() {
        let mut injector = SimulatedInjector::new();
        assert_eq!(
            injector.set_state(42, &HdlsState::default()),
            Err(InjectorError::UnknownDevice(42))
        );
        assert!(injector.detach_device(42).is_err());
    }

    #[test]
    fn test_simulated_device_requires_work_buffer() {
        let mut injector = SimulatedInjector::new();
        assert!(matches!(
            injector.attach_device(&DeviceInfo::default()),
            Err(InjectorError::Unavailable(_))
        ));
    }

    #[test]
    fn test_simulated_single_work_buffer() {
        let mut injector = SimulatedInjector::new();
        injector.attach_work_buffer().unwrap();
        assert!(matches!(
            injector.attach_work_buffer(),
            Err(InjectorError::WorkBufferRejected(_))
        ));
    }

    #[test]
    fn test_device_kind_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: DeviceKind,
        }
        let w: Wrapper = toml::from_str("kind = \"joycon-left\"").unwrap();
        assert_eq!(w.kind, DeviceKind::JoyconLeft);
        assert!(toml::from_str::<Wrapper>("kind = \"gamecube\"").is_err());
    }
}
