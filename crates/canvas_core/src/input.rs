//! Pointer input flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Mouse buttons held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MouseButtons: u8 {
        const LEFT = 0b0000_0001;
        const RIGHT = 0b0000_0010;
        const MIDDLE = 0b0000_0100;
        const BACK = 0b0000_1000;
        const FORWARD = 0b0001_0000;
    }
}

bitflags! {
    /// Keyboard modifiers held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const CTRL = 0b0000_0010;
        const ALT = 0b0000_0100;
    }
}

impl Modifiers {
    /// The modifier that toggles membership instead of replacing the selection.
    pub const MULTI_SELECT: Modifiers = Modifiers::CTRL;

    pub fn is_multi_select(self) -> bool {
        self.contains(Self::MULTI_SELECT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_empty() {
        assert!(MouseButtons::empty().is_empty());
        assert_eq!(MouseButtons::default(), MouseButtons::empty());
    }

    #[test]
    fn test_multi_select_modifier() {
        assert!((Modifiers::CTRL | Modifiers::SHIFT).is_multi_select());
        assert!(!Modifiers::SHIFT.is_multi_select());
    }
}
