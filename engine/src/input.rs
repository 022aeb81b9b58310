// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Translates raw key/button events from the platform into game actions. One
//! or more buttons can be bound to the same action; actions report an analog
//! state (0..1) and pressed/released edges, which are cleared at the end of
//! every frame.

use platform::{Button, BUTTON_MAX};

use crate::geom::{vec2i, Vec2i};

/// The maximum number of discrete actions.
pub const INPUT_ACTION_MAX: usize = 32;

/// The deadzone in the normalized 0..1 range in which button presses are
/// ignored. Only relevant for analog input such as gamepad sticks.
pub const INPUT_DEADZONE: f32 = 0.1;

/// The deadzone for the capture callback.
pub const INPUT_DEADZONE_CAPTURE: f32 = 0.5;

const ACTION_NONE: u8 = u8::MAX;

/// A callback receiving all button presses and text input, e.g. for key
/// binding screens or text fields. The second argument is the typed character
/// (0 for non-text input).
pub type CaptureCallback = Box<dyn FnMut(Button, u32)>;

/// The action binding state. Owned by the engine; the platform feeds it
/// through [`Input::set_button_state`] and friends, the game reads it through
/// [`Input::state`], [`Input::pressed`] and [`Input::released`].
#[derive(Default)]
pub struct Input {
    actions_state: [f32; INPUT_ACTION_MAX],
    actions_pressed: [bool; INPUT_ACTION_MAX],
    actions_released: [bool; INPUT_ACTION_MAX],
    /// While an action is held, only the button that initiated the hold may
    /// update it. This keeps two buttons bound to the same action from
    /// interfering.
    expected_button: [Option<Button>; INPUT_ACTION_MAX],
    bindings: Bindings,
    capture: Option<CaptureCallback>,
    mouse: Vec2i,
}

struct Bindings([u8; BUTTON_MAX]);

impl Default for Bindings {
    fn default() -> Self {
        Bindings([ACTION_NONE; BUTTON_MAX])
    }
}

impl Input {
    pub fn new() -> Input {
        Input::default()
    }

    /// Bind a button to an action for the current player. Actions are
    /// game-defined indices below [`INPUT_ACTION_MAX`]; out-of-range actions
    /// are fatal.
    pub fn bind(&mut self, button: Button, action: u8) {
        assert!((action as usize) < INPUT_ACTION_MAX, "invalid input action {action}");
        self.actions_state[action as usize] = 0.0;
        self.bindings.0[button as usize] = action;
    }

    /// Unbind a button.
    pub fn unbind(&mut self, button: Button) {
        self.bindings.0[button as usize] = ACTION_NONE;
    }

    /// Unbind all buttons.
    pub fn unbind_all(&mut self) {
        self.bindings = Bindings::default();
    }

    /// The currently bound action for a button, if any.
    pub fn action_for_button(&self, button: Button) -> Option<u8> {
        let action = self.bindings.0[button as usize];
        (action != ACTION_NONE).then_some(action)
    }

    /// The current state for an action: 0 or 1 for discrete buttons and
    /// keys, anywhere in 0..1 for analog input.
    pub fn state(&self, action: u8) -> f32 {
        assert!((action as usize) < INPUT_ACTION_MAX, "invalid input action {action}");
        self.actions_state[action as usize]
    }

    /// Whether a button for that action was just pressed down before this
    /// frame.
    pub fn pressed(&self, action: u8) -> bool {
        assert!((action as usize) < INPUT_ACTION_MAX, "invalid input action {action}");
        self.actions_pressed[action as usize]
    }

    /// Whether a button for that action was just released before this frame.
    pub fn released(&self, action: u8) -> bool {
        assert!((action as usize) < INPUT_ACTION_MAX, "invalid input action {action}");
        self.actions_released[action as usize]
    }

    /// The current mouse position in logical pixels.
    pub fn mouse_pos(&self) -> Vec2i {
        self.mouse
    }

    /// Install a capture callback that receives all key and button presses
    /// as well as text input. Call [`Input::uncapture`] to uninstall.
    pub fn capture(&mut self, callback: CaptureCallback) {
        self.capture = Some(callback);
        self.clear();
    }

    /// Uninstall the capture callback.
    pub fn uncapture(&mut self) {
        self.capture = None;
    }

    /// Called by the platform for every button state change. Discrete
    /// buttons report 0 or 1, analog input anything in 0..1.
    pub fn set_button_state(&mut self, button: Button, state: f32) {
        let mut state = state;
        let action = self.bindings.0[button as usize];
        if action != ACTION_NONE {
            let action = action as usize;
            let expected = self.expected_button[action];
            if expected.is_none() || expected == Some(button) {
                state = if state > INPUT_DEADZONE { state } else { 0.0 };

                if state > 0.0 && self.actions_state[action] == 0.0 {
                    self.actions_pressed[action] = true;
                    self.expected_button[action] = Some(button);
                } else if state == 0.0 && self.actions_state[action] > 0.0 {
                    self.actions_released[action] = true;
                    self.expected_button[action] = None;
                }
                self.actions_state[action] = state;
            }
        }

        if state > INPUT_DEADZONE_CAPTURE {
            if let Some(callback) = &mut self.capture {
                callback(button, 0);
            }
        }
    }

    /// Called by the platform for text input.
    pub fn text_input(&mut self, c: u32) {
        if let Some(callback) = &mut self.capture {
            callback(Button::Invalid, c);
        }
    }

    /// Called by the platform when the mouse moves.
    pub fn set_mouse_pos(&mut self, x: i32, y: i32) {
        self.mouse = vec2i(x, y);
    }

    /// Clears the per-frame pressed/released edges. Called by the engine at
    /// the end of every frame.
    pub fn clear(&mut self) {
        self.actions_pressed = [false; INPUT_ACTION_MAX];
        self.actions_released = [false; INPUT_ACTION_MAX];
    }
}
