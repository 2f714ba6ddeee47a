//! # Controller State Module
//!
//! The canonical in-memory value of the virtual controller: one button bit-set and
//! two analog sticks. Every field is kept within its valid range at all times; the
//! only ways to change a [`ControllerState`] are the setters here, which mask
//! reserved button bits and clamp stick components.
//!
//! ## Button Bits
//!
//! | Bit | Button | Bit | Button |
//! |-----|--------|-----|--------|
//! | 0 | A | 8 | ZL |
//! | 1 | B | 9 | ZR |
//! | 2 | X | 10 | Plus |
//! | 3 | Y | 11 | Minus |
//! | 4 | Left stick click | 12 | D-Pad left |
//! | 5 | Right stick click | 13 | D-Pad up |
//! | 6 | L | 14 | D-Pad right |
//! | 7 | R | 15 | D-Pad down |
//!
//! Bits 24-27 are the Joy-Con rail buttons (SL/SR on either side). Bits 16-23 are
//! derived by the platform from stick positions and, like every bit above 27, are
//! reserved: they are always zero in a stored state.

pub const BUTTON_A: u64 = 1 << 0;
pub const BUTTON_B: u64 = 1 << 1;
pub const BUTTON_X: u64 = 1 << 2;
pub const BUTTON_Y: u64 = 1 << 3;
pub const BUTTON_STICK_L: u64 = 1 << 4;
pub const BUTTON_STICK_R: u64 = 1 << 5;
pub const BUTTON_L: u64 = 1 << 6;
pub const BUTTON_R: u64 = 1 << 7;
pub const BUTTON_ZL: u64 = 1 << 8;
pub const BUTTON_ZR: u64 = 1 << 9;
pub const BUTTON_PLUS: u64 = 1 << 10;
pub const BUTTON_MINUS: u64 = 1 << 11;
pub const BUTTON_DPAD_LEFT: u64 = 1 << 12;
pub const BUTTON_DPAD_UP: u64 = 1 << 13;
pub const BUTTON_DPAD_RIGHT: u64 = 1 << 14;
pub const BUTTON_DPAD_DOWN: u64 = 1 << 15;
pub const BUTTON_LEFT_SL: u64 = 1 << 24;
pub const BUTTON_LEFT_SR: u64 = 1 << 25;
pub const BUTTON_RIGHT_SL: u64 = 1 << 26;
pub const BUTTON_RIGHT_SR: u64 = 1 << 27;

/// Every named button. Bits outside this mask are reserved.
pub const BUTTON_MASK: u64 = 0x0000_0000_0F00_FFFF;

/// Lower bound of a normalized stick component.
pub const AXIS_MIN: f32 = -1.0;
/// Upper bound of a normalized stick component.
pub const AXIS_MAX: f32 = 1.0;

/// Stick selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    /// Wire selector byte for this stick.
    pub fn selector(self) -> u8 {
        match self {
            Stick::Left => 0,
            Stick::Right => 1,
        }
    }

    /// Parse a wire selector byte.
    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            0 => Some(Stick::Left),
            1 => Some(Stick::Right),
            _ => None,
        }
    }
}

/// A 2D stick deflection, each component in `AXIS_MIN..=AXIS_MAX`.
///
/// # Examples
///
/// ```
/// use hidplus_bridge::controller::StickPosition;
///
/// let pos = StickPosition::new(1.7, -0.25);
/// assert_eq!(pos.x, 1.0); // clamped
/// assert_eq!(pos.y, -0.25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickPosition {
    pub x: f32,
    pub y: f32,
}

impl StickPosition {
    /// Centered stick.
    pub const CENTER: StickPosition = StickPosition { x: 0.0, y: 0.0 };

    /// Creates a position, clamping both components into range.
    ///
    /// NaN components are mapped to center; the decoder rejects them before they
    /// get this far, so this only guards direct library callers.
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: clamp_axis(x),
            y: clamp_axis(y),
        }
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(AXIS_MIN, AXIS_MAX)
    }
}

/// Complete state of the virtual controller.
///
/// This is a small `Copy` value; it crosses execution contexts only as a whole
/// (see [`shared_state`](super::shared_state)).
///
/// # Examples
///
/// ```
/// use hidplus_bridge::controller::{ControllerState, Stick, StickPosition, BUTTON_A};
///
/// let mut state = ControllerState::default();
/// state.set_buttons(BUTTON_A);
/// state.set_stick(Stick::Left, StickPosition::new(1.0, 0.0));
/// assert_eq!(state.buttons(), BUTTON_A);
/// assert_eq!(state.right_stick(), StickPosition::CENTER);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    buttons: u64,
    left_stick: StickPosition,
    right_stick: StickPosition,
}

impl ControllerState {
    /// Neutral state: no buttons pressed, both sticks centered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pressed-button bit-set.
    pub fn buttons(&self) -> u64 {
        self.buttons
    }

    /// Left stick deflection.
    pub fn left_stick(&self) -> StickPosition {
        self.left_stick
    }

    /// Right stick deflection.
    pub fn right_stick(&self) -> StickPosition {
        self.right_stick
    }

    /// Deflection of the selected stick.
    pub fn stick(&self, stick: Stick) -> StickPosition {
        match stick {
            Stick::Left => self.left_stick,
            Stick::Right => self.right_stick,
        }
    }

    /// Replaces the whole button bit-set. Reserved bits are cleared.
    pub fn set_buttons(&mut self, buttons: u64) {
        self.buttons = buttons & BUTTON_MASK;
    }

    /// Replaces one stick, leaving the other stick and the buttons untouched.
    pub fn set_stick(&mut self, stick: Stick, position: StickPosition) {
        let position = StickPosition::new(position.x, position.y);
        match stick {
            Stick::Left => self.left_stick = position,
            Stick::Right => self.right_stick = position,
        }
    }

    /// Returns true if `button` (one or more bits) is fully pressed.
    pub fn is_pressed(&self, button: u64) -> bool {
        button != 0 && self.buttons & button == button
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_neutral() {
        let state = ControllerState::default();
        assert_eq!(state.buttons(), 0);
        assert_eq!(state.left_stick(), StickPosition::CENTER);
        assert_eq!(state.right_stick(), StickPosition::CENTER);
        assert_eq!(state, ControllerState::new());
    }

    #[test]
    fn test_button_mask_covers_named_buttons() {
        let named = [
            BUTTON_A, BUTTON_B, BUTTON_X, BUTTON_Y, BUTTON_STICK_L, BUTTON_STICK_R,
            BUTTON_L, BUTTON_R, BUTTON_ZL, BUTTON_ZR, BUTTON_PLUS, BUTTON_MINUS,
            BUTTON_DPAD_LEFT, BUTTON_DPAD_UP, BUTTON_DPAD_RIGHT, BUTTON_DPAD_DOWN,
            BUTTON_LEFT_SL, BUTTON_LEFT_SR, BUTTON_RIGHT_SL, BUTTON_RIGHT_SR,
        ];
        let all = named.iter().fold(0u64, |acc, b| acc | b);
        assert_eq!(all, BUTTON_MASK);
    }

    #[test]
    fn test_set_buttons_replaces_not_merges() {
        let mut state = ControllerState::default();
        state.set_buttons(BUTTON_A | BUTTON_B);
        state.set_buttons(BUTTON_X);
        assert_eq!(state.buttons(), BUTTON_X);
        assert!(!state.is_pressed(BUTTON_A));
    }

    #[test]
    fn test_set_buttons_clears_reserved_bits() {
        let mut state = ControllerState::default();
        state.set_buttons(u64::MAX);
        assert_eq!(state.buttons(), BUTTON_MASK);

        state.set_buttons(1 << 16 | 1 << 40);
        assert_eq!(state.buttons(), 0);
    }

    #[test]
    fn test_set_stick_is_independent() {
        let mut state = ControllerState::default();
        state.set_buttons(BUTTON_ZR);
        state.set_stick(Stick::Right, StickPosition::new(-0.5, 0.5));
        state.set_stick(Stick::Left, StickPosition::new(1.0, 0.0));

        assert_eq!(state.buttons(), BUTTON_ZR);
        assert_eq!(state.left_stick(), StickPosition { x: 1.0, y: 0.0 });
        assert_eq!(state.right_stick(), StickPosition { x: -0.5, y: 0.5 });
    }

    #[test]
    fn test_stick_position_clamps() {
        assert_eq!(StickPosition::new(2.0, -3.0), StickPosition { x: 1.0, y: -1.0 });
        assert_eq!(StickPosition::new(f32::INFINITY, f32::NEG_INFINITY), StickPosition { x: 1.0, y: -1.0 });
        assert_eq!(StickPosition::new(f32::NAN, 0.3), StickPosition { x: 0.0, y: 0.3 });
    }

    #[test]
    fn test_set_stick_clamps_literal_positions() {
        let mut state = ControllerState::default();
        state.set_stick(Stick::Left, StickPosition { x: 5.0, y: -5.0 });
        assert_eq!(state.stick(Stick::Left), StickPosition { x: 1.0, y: -1.0 });
    }

    #[test]
    fn test_stick_selector_round_trip() {
        assert_eq!(Stick::from_selector(Stick::Left.selector()), Some(Stick::Left));
        assert_eq!(Stick::from_selector(Stick::Right.selector()), Some(Stick::Right));
        assert_eq!(Stick::from_selector(2), None);
    }

    #[test]
    fn test_is_pressed() {
        let mut state = ControllerState::default();
        state.set_buttons(BUTTON_L | BUTTON_R);
        assert!(state.is_pressed(BUTTON_L));
        assert!(state.is_pressed(BUTTON_L | BUTTON_R));
        assert!(!state.is_pressed(BUTTON_L | BUTTON_ZL));
        assert!(!state.is_pressed(0));
    }
}
