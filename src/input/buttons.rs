//! Button state tracking
//!
//! ```text
//!        down            up
//!   Up ───────> Down ───────> Up
//!   └─ up: no-op  └─ down: no-op
//! ```

use crate::protocol::{Button, ButtonAction};

/// Per-session logical button state
#[derive(Debug, Clone, Default)]
pub struct ButtonTracker {
    /// Indexed by [`ButtonTracker::index`]
    states: [bool; 2],
    last: Option<Button>,
}

impl ButtonTracker {
    /// Create a tracker with every button up
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a requested action
    ///
    /// Returns `true` when the logical state changed and the press or
    /// release must reach the backend.
    pub fn apply(&mut self, button: Button, action: ButtonAction) -> bool {
        let down = action == ButtonAction::Down;
        let slot = &mut self.states[Self::index(button)];
        self.last = Some(button);
        if *slot == down {
            return false;
        }
        *slot = down;
        true
    }

    /// Check if button is currently pressed
    pub fn is_down(&self, button: Button) -> bool {
        self.states[Self::index(button)]
    }

    /// Buttons currently down
    pub fn held(&self) -> Vec<Button> {
        [Button::Left, Button::Right]
            .into_iter()
            .filter(|b| self.is_down(*b))
            .collect()
    }

    /// Most recent button named by a click
    pub fn last_button(&self) -> Option<Button> {
        self.last
    }

    /// Mark a button up without a backend call
    pub fn force_up(&mut self, button: Button) {
        self.states[Self::index(button)] = false;
    }

    fn index(button: Button) -> usize {
        match button {
            Button::Left => 0,
            Button::Right => 1,
        }
    }
}
