// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

/// The number of distinct [`Button`] values, for sizing lookup tables indexed
/// by `button as usize`.
pub const BUTTON_MAX: usize = 128;

/// Raw keys, gamepad buttons and mouse buttons reported by the platform's
/// input event source.
///
/// Keyboard discriminants follow USB HID usage ids (what most windowing
/// libraries report as "scancodes"), so a platform implementation can usually
/// translate with a bounds check and a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Button {
    Invalid = 0,

    KeyA = 4,
    KeyB = 5,
    KeyC = 6,
    KeyD = 7,
    KeyE = 8,
    KeyF = 9,
    KeyG = 10,
    KeyH = 11,
    KeyI = 12,
    KeyJ = 13,
    KeyK = 14,
    KeyL = 15,
    KeyM = 16,
    KeyN = 17,
    KeyO = 18,
    KeyP = 19,
    KeyQ = 20,
    KeyR = 21,
    KeyS = 22,
    KeyT = 23,
    KeyU = 24,
    KeyV = 25,
    KeyW = 26,
    KeyX = 27,
    KeyY = 28,
    KeyZ = 29,
    Key1 = 30,
    Key2 = 31,
    Key3 = 32,
    Key4 = 33,
    Key5 = 34,
    Key6 = 35,
    Key7 = 36,
    Key8 = 37,
    Key9 = 38,
    Key0 = 39,
    KeyReturn = 40,
    KeyEscape = 41,
    KeyBackspace = 42,
    KeyTab = 43,
    KeySpace = 44,
    KeyMinus = 45,
    KeyEquals = 46,
    KeyComma = 54,
    KeyPeriod = 55,
    KeyF1 = 58,
    KeyF2 = 59,
    KeyF3 = 60,
    KeyF4 = 61,
    KeyF5 = 62,
    KeyF6 = 63,
    KeyF7 = 64,
    KeyF8 = 65,
    KeyF9 = 66,
    KeyF10 = 67,
    KeyF11 = 68,
    KeyF12 = 69,
    KeyRight = 79,
    KeyLeft = 80,
    KeyDown = 81,
    KeyUp = 82,
    KeyLCtrl = 84,
    KeyLShift = 85,
    KeyLAlt = 86,
    KeyRCtrl = 87,
    KeyRShift = 88,
    KeyRAlt = 89,

    GamepadA = 96,
    GamepadY = 97,
    GamepadB = 98,
    GamepadX = 99,
    GamepadLShoulder = 100,
    GamepadRShoulder = 101,
    GamepadLTrigger = 102,
    GamepadRTrigger = 103,
    GamepadSelect = 104,
    GamepadStart = 105,
    GamepadLStickPress = 106,
    GamepadRStickPress = 107,
    GamepadDpadUp = 108,
    GamepadDpadDown = 109,
    GamepadDpadLeft = 110,
    GamepadDpadRight = 111,
    GamepadHome = 112,
    GamepadLStickUp = 113,
    GamepadLStickDown = 114,
    GamepadLStickLeft = 115,
    GamepadLStickRight = 116,
    GamepadRStickUp = 117,
    GamepadRStickDown = 118,
    GamepadRStickLeft = 119,
    GamepadRStickRight = 120,

    MouseLeft = 121,
    MouseMiddle = 122,
    MouseRight = 123,
    MouseWheelUp = 124,
    MouseWheelDown = 125,
}

impl Button {
    /// Returns the name of this button, as used in config files.
    pub const fn name(self) -> &'static str {
        use Button::*;
        match self {
            Invalid => "invalid",
            KeyA => "a",
            KeyB => "b",
            KeyC => "c",
            KeyD => "d",
            KeyE => "e",
            KeyF => "f",
            KeyG => "g",
            KeyH => "h",
            KeyI => "i",
            KeyJ => "j",
            KeyK => "k",
            KeyL => "l",
            KeyM => "m",
            KeyN => "n",
            KeyO => "o",
            KeyP => "p",
            KeyQ => "q",
            KeyR => "r",
            KeyS => "s",
            KeyT => "t",
            KeyU => "u",
            KeyV => "v",
            KeyW => "w",
            KeyX => "x",
            KeyY => "y",
            KeyZ => "z",
            Key1 => "1",
            Key2 => "2",
            Key3 => "3",
            Key4 => "4",
            Key5 => "5",
            Key6 => "6",
            Key7 => "7",
            Key8 => "8",
            Key9 => "9",
            Key0 => "0",
            KeyReturn => "return",
            KeyEscape => "escape",
            KeyBackspace => "backspace",
            KeyTab => "tab",
            KeySpace => "space",
            KeyMinus => "minus",
            KeyEquals => "equals",
            KeyComma => "comma",
            KeyPeriod => "period",
            KeyF1 => "f1",
            KeyF2 => "f2",
            KeyF3 => "f3",
            KeyF4 => "f4",
            KeyF5 => "f5",
            KeyF6 => "f6",
            KeyF7 => "f7",
            KeyF8 => "f8",
            KeyF9 => "f9",
            KeyF10 => "f10",
            KeyF11 => "f11",
            KeyF12 => "f12",
            KeyRight => "right",
            KeyLeft => "left",
            KeyDown => "down",
            KeyUp => "up",
            KeyLCtrl => "l_ctrl",
            KeyLShift => "l_shift",
            KeyLAlt => "l_alt",
            KeyRCtrl => "r_ctrl",
            KeyRShift => "r_shift",
            KeyRAlt => "r_alt",
            GamepadA => "gamepad_a",
            GamepadY => "gamepad_y",
            GamepadB => "gamepad_b",
            GamepadX => "gamepad_x",
            GamepadLShoulder => "gamepad_l_shoulder",
            GamepadRShoulder => "gamepad_r_shoulder",
            GamepadLTrigger => "gamepad_l_trigger",
            GamepadRTrigger => "gamepad_r_trigger",
            GamepadSelect => "gamepad_select",
            GamepadStart => "gamepad_start",
            GamepadLStickPress => "gamepad_l_stick",
            GamepadRStickPress => "gamepad_r_stick",
            GamepadDpadUp => "gamepad_dp_up",
            GamepadDpadDown => "gamepad_dp_down",
            GamepadDpadLeft => "gamepad_dp_left",
            GamepadDpadRight => "gamepad_dp_right",
            GamepadHome => "gamepad_home",
            GamepadLStickUp => "gamepad_l_stick_up",
            GamepadLStickDown => "gamepad_l_stick_down",
            GamepadLStickLeft => "gamepad_l_stick_left",
            GamepadLStickRight => "gamepad_l_stick_right",
            GamepadRStickUp => "gamepad_r_stick_up",
            GamepadRStickDown => "gamepad_r_stick_down",
            GamepadRStickLeft => "gamepad_r_stick_left",
            GamepadRStickRight => "gamepad_r_stick_right",
            MouseLeft => "mouse_left",
            MouseMiddle => "mouse_middle",
            MouseRight => "mouse_right",
            MouseWheelUp => "mouse_wheel_up",
            MouseWheelDown => "mouse_wheel_down",
        }
    }

    /// Returns the button for a given name, e.g. when loading a json config
    /// file. Returns None for unknown names.
    pub fn from_name(name: &str) -> Option<Button> {
        ALL_BUTTONS.iter().copied().find(|b| b.name() == name)
    }
}

/// Every valid [`Button`], for iteration.
pub const ALL_BUTTONS: &[Button] = &[
    Button::KeyA,
    Button::KeyB,
    Button::KeyC,
    Button::KeyD,
    Button::KeyE,
    Button::KeyF,
    Button::KeyG,
    Button::KeyH,
    Button::KeyI,
    Button::KeyJ,
    Button::KeyK,
    Button::KeyL,
    Button::KeyM,
    Button::KeyN,
    Button::KeyO,
    Button::KeyP,
    Button::KeyQ,
    Button::KeyR,
    Button::KeyS,
    Button::KeyT,
    Button::KeyU,
    Button::KeyV,
    Button::KeyW,
    Button::KeyX,
    Button::KeyY,
    Button::KeyZ,
    Button::Key1,
    Button::Key2,
    Button::Key3,
    Button::Key4,
    Button::Key5,
    Button::Key6,
    Button::Key7,
    Button::Key8,
    Button::Key9,
    Button::Key0,
    Button::KeyReturn,
    Button::KeyEscape,
    Button::KeyBackspace,
    Button::KeyTab,
    Button::KeySpace,
    Button::KeyMinus,
    Button::KeyEquals,
    Button::KeyComma,
    Button::KeyPeriod,
    Button::KeyF1,
    Button::KeyF2,
    Button::KeyF3,
    Button::KeyF4,
    Button::KeyF5,
    Button::KeyF6,
    Button::KeyF7,
    Button::KeyF8,
    Button::KeyF9,
    Button::KeyF10,
    Button::KeyF11,
    Button::KeyF12,
    Button::KeyRight,
    Button::KeyLeft,
    Button::KeyDown,
    Button::KeyUp,
    Button::KeyLCtrl,
    Button::KeyLShift,
    Button::KeyLAlt,
    Button::KeyRCtrl,
    Button::KeyRShift,
    Button::KeyRAlt,
    Button::GamepadA,
    Button::GamepadY,
    Button::GamepadB,
    Button::GamepadX,
    Button::GamepadLShoulder,
    Button::GamepadRShoulder,
    Button::GamepadLTrigger,
    Button::GamepadRTrigger,
    Button::GamepadSelect,
    Button::GamepadStart,
    Button::GamepadLStickPress,
    Button::GamepadRStickPress,
    Button::GamepadDpadUp,
    Button::GamepadDpadDown,
    Button::GamepadDpadLeft,
    Button::GamepadDpadRight,
    Button::GamepadHome,
    Button::GamepadLStickUp,
    Button::GamepadLStickDown,
    Button::GamepadLStickLeft,
    Button::GamepadLStickRight,
    Button::GamepadRStickUp,
    Button::GamepadRStickDown,
    Button::GamepadRStickLeft,
    Button::GamepadRStickRight,
    Button::MouseLeft,
    Button::MouseMiddle,
    Button::MouseRight,
    Button::MouseWheelUp,
    Button::MouseWheelDown,
];

#[cfg(test)]
mod tests {
    use super::{Button, ALL_BUTTONS, BUTTON_MAX};

    #[test]
    fn discriminants_fit_lookup_tables() {
        for button in ALL_BUTTONS {
            assert!((*button as usize) < BUTTON_MAX);
        }
    }

    #[test]
    fn names_round_trip() {
        for button in ALL_BUTTONS {
            assert_eq!(Some(*button), Button::from_name(button.name()));
        }
    }
}
