//! Host to canonical input translation
//!
//! This module translates backend modifier and button layouts (from
//! [`crate::host_event`]) to the canonical bit layouts (from `input_types`).
//!
//! ## Philosophy
//!
//! - **Deterministic mapping**: Same host bits always produce the same canonical bits
//! - **Order-independent**: Modifier translation is an OR over matching flags
//! - **Stateful only where the host is stateless**: Button press/release events
//!   carry a single button, so an accumulator rebuilds the full mask

use input_types::{ButtonState, KeyModifiers};

use crate::host_event::{HostButtonMask, HostKeyMod};

/// Backend modifier flag to canonical modifier bit
const MODIFIER_MAP: [(HostKeyMod, KeyModifiers); 10] = [
    (HostKeyMod::LSHIFT, KeyModifiers::LSHIFT),
    (HostKeyMod::LCTRL, KeyModifiers::LCTRL),
    (HostKeyMod::LALT, KeyModifiers::LALT),
    (HostKeyMod::LGUI, KeyModifiers::LMETA),
    (HostKeyMod::RSHIFT, KeyModifiers::RSHIFT),
    (HostKeyMod::RCTRL, KeyModifiers::RCTRL),
    (HostKeyMod::RALT, KeyModifiers::RALT),
    (HostKeyMod::RGUI, KeyModifiers::RMETA),
    (HostKeyMod::NUM, KeyModifiers::NUM_LOCK),
    (HostKeyMod::CAPS, KeyModifiers::CAPS_LOCK),
];

/// Backend button index (1-based, minus one) to canonical button bit
///
/// The backend numbers buttons left, middle, right, then 4-8.
pub const BUTTON_MAP: [ButtonState; 8] = [
    ButtonState::LEFT,
    ButtonState::MIDDLE,
    ButtonState::RIGHT,
    ButtonState::BUTTON4,
    ButtonState::BUTTON5,
    ButtonState::BUTTON6,
    ButtonState::BUTTON7,
    ButtonState::BUTTON8,
];

/// Translates backend modifier flags to the canonical HID modifier mask
///
/// `MODE` (AltGr on some backends) has no canonical bit and is dropped.
pub fn hid_modifiers(mods: HostKeyMod) -> KeyModifiers {
    MODIFIER_MAP
        .iter()
        .filter(|(host, _)| mods.contains(*host))
        .fold(KeyModifiers::empty(), |acc, (_, hid)| acc | *hid)
}

/// Translates a backend button mask to the canonical layout
///
/// Left and buttons 4-8 keep their positions; middle and right swap.
pub fn hid_buttons(mask: HostButtonMask) -> ButtonState {
    let b = mask.bits();
    let swapped = (b & 0x01) | ((b & 0x04) >> 1) | ((b & 0x02) << 1) | (b & 0xF8);
    ButtonState::from_bits_truncate(swapped as u16)
}

/// Looks up the canonical bit for a 1-based backend button number
pub fn button_bit(button: u8) -> ButtonState {
    BUTTON_MAP[(button.wrapping_sub(1) & 7) as usize]
}

/// Pointer button accumulator
///
/// Button press/release notifications carry one button; this tracks the full
/// mask so every canonical pointer record reports all held buttons.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerTranslator {
    buttons: ButtonState,
}

impl PointerTranslator {
    /// Creates an accumulator with no buttons held
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buttons currently held
    pub fn buttons(&self) -> ButtonState {
        self.buttons
    }

    /// Records a press and returns the updated mask
    pub fn press(&mut self, button: u8) -> ButtonState {
        self.buttons |= button_bit(button);
        self.buttons
    }

    /// Records a release and returns the updated mask
    pub fn release(&mut self, button: u8) -> ButtonState {
        self.buttons &= !button_bit(button);
        self.buttons
    }

    /// Resynchronizes from a motion event's full mask
    pub fn sync(&mut self, mask: HostButtonMask) -> ButtonState {
        self.buttons = hid_buttons(mask);
        self.buttons
    }

    /// Forgets all held buttons
    pub fn reset(&mut self) {
        self.buttons = ButtonState::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_lshift_rctrl() {
        let mods = hid_modifiers(HostKeyMod::LSHIFT | HostKeyMod::RCTRL);
        assert_eq!(mods.bits(), 18);
        assert_eq!(mods, KeyModifiers::LSHIFT | KeyModifiers::RCTRL);
    }

    #[test]
    fn test_modifiers_each_flag() {
        assert_eq!(hid_modifiers(HostKeyMod::LCTRL), KeyModifiers::LCTRL);
        assert_eq!(hid_modifiers(HostKeyMod::LGUI), KeyModifiers::LMETA);
        assert_eq!(hid_modifiers(HostKeyMod::RGUI), KeyModifiers::RMETA);
        assert_eq!(hid_modifiers(HostKeyMod::RALT), KeyModifiers::RALT);
        assert_eq!(hid_modifiers(HostKeyMod::CAPS), KeyModifiers::CAPS_LOCK);
        assert_eq!(hid_modifiers(HostKeyMod::NUM), KeyModifiers::NUM_LOCK);
        assert_eq!(hid_modifiers(HostKeyMod::MODE), KeyModifiers::empty());
        assert_eq!(hid_modifiers(HostKeyMod::empty()), KeyModifiers::empty());
    }

    #[test]
    fn test_modifiers_all() {
        let mods = hid_modifiers(HostKeyMod::all());
        assert_eq!(mods.bits() & 0xFF, 0xFF);
        assert!(mods.contains(KeyModifiers::NUM_LOCK | KeyModifiers::CAPS_LOCK));
    }

    #[test]
    fn test_buttons_middle_right_swap() {
        let canonical = hid_buttons(HostButtonMask::MIDDLE | HostButtonMask::RIGHT);
        assert_eq!(canonical.bits(), 6);
        assert_eq!(hid_buttons(HostButtonMask::MIDDLE), ButtonState::MIDDLE);
        assert_eq!(hid_buttons(HostButtonMask::RIGHT), ButtonState::RIGHT);
    }

    #[test]
    fn test_buttons_left_and_high_unchanged() {
        assert_eq!(hid_buttons(HostButtonMask::LEFT), ButtonState::LEFT);
        assert_eq!(hid_buttons(HostButtonMask::X1).bits(), 8);
        assert_eq!(hid_buttons(HostButtonMask::X5).bits(), 128);
        assert_eq!(hid_buttons(HostButtonMask::empty()), ButtonState::empty());
    }

    #[test]
    fn test_button_index_table() {
        assert_eq!(button_bit(1), ButtonState::LEFT);
        assert_eq!(button_bit(2), ButtonState::MIDDLE);
        assert_eq!(button_bit(3), ButtonState::RIGHT);
        assert_eq!(button_bit(4), ButtonState::BUTTON4);
        assert_eq!(button_bit(8), ButtonState::BUTTON8);
        // index wraps into the table
        assert_eq!(button_bit(9), ButtonState::LEFT);
    }

    #[test]
    fn test_button_table_agrees_with_mask_swap() {
        for button in 1..=8u8 {
            let mask = HostButtonMask::from_bits_truncate(1 << (button - 1));
            assert_eq!(button_bit(button), hid_buttons(mask));
        }
    }

    #[test]
    fn test_pointer_accumulator() {
        let mut pointer = PointerTranslator::new();
        assert_eq!(pointer.press(1), ButtonState::LEFT);
        assert_eq!(pointer.press(3), ButtonState::LEFT | ButtonState::RIGHT);
        assert_eq!(pointer.release(1), ButtonState::RIGHT);
        assert_eq!(pointer.release(1), ButtonState::RIGHT);
        assert_eq!(pointer.release(3), ButtonState::empty());
    }

    #[test]
    fn test_pointer_sync_and_reset() {
        let mut pointer = PointerTranslator::new();
        pointer.sync(HostButtonMask::MIDDLE);
        assert_eq!(pointer.buttons(), ButtonState::MIDDLE);
        pointer.reset();
        assert_eq!(pointer.buttons(), ButtonState::empty());
    }
}
