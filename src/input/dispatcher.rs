//! Command Dispatcher
//!
//! Turns filter output and pass-through click/scroll events into backend
//! commands for one session.
//!
//! Moves are fractional upstream but the backend takes whole pixels, so the
//! sub-pixel remainder is carried into the next move (same idea as the
//! high-precision scroll accumulator in a wheel handler).

use serde::Serialize;
use tracing::{debug, error, trace};

use super::backend::SharedPointer;
use super::buttons::ButtonTracker;
use super::error::Result;
use crate::estimator::Delta;
use crate::protocol::{Button, ButtonAction};

/// Running totals exposed for status reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DispatchStats {
    /// Sum of all whole-pixel moves sent
    pub moved_x: i64,
    /// Sum of all whole-pixel moves sent
    pub moved_y: i64,
    /// Backend move calls
    pub moves: u64,
    /// Backend button calls
    pub clicks: u64,
    /// Backend scroll calls
    pub scrolls: u64,
}

/// Per-session command dispatcher
pub struct CommandDispatcher {
    pointer: SharedPointer,
    buttons: ButtonTracker,
    remainder: Delta,
    stats: DispatchStats,
}

impl CommandDispatcher {
    /// Create a dispatcher over the shared pointer
    pub fn new(pointer: SharedPointer) -> Self {
        Self {
            pointer,
            buttons: ButtonTracker::new(),
            remainder: Delta::ZERO,
            stats: DispatchStats::default(),
        }
    }

    /// Move by a fractional delta
    ///
    /// Returns the whole-pixel move sent, or `None` when the accumulated
    /// motion is still below one pixel on both axes.
    pub fn move_by(&mut self, delta: Delta) -> Result<Option<(i32, i32)>> {
        if !delta.dx.is_finite() || !delta.dy.is_finite() {
            trace!("Dropping non-finite move ({}, {})", delta.dx, delta.dy);
            return Ok(None);
        }

        self.remainder += delta;
        let dx = self.remainder.dx.trunc();
        let dy = self.remainder.dy.trunc();
        if dx == 0.0 && dy == 0.0 {
            return Ok(None);
        }
        self.remainder = self.remainder - Delta::new(dx, dy);

        let (dx, dy) = (dx as i32, dy as i32);
        self.pointer.lock().move_relative(dx, dy)?;

        self.stats.moves += 1;
        self.stats.moved_x += dx as i64;
        self.stats.moved_y += dy as i64;
        trace!("Move ({}, {}) remainder ({:.3}, {:.3})", dx, dy, self.remainder.dx, self.remainder.dy);
        Ok(Some((dx, dy)))
    }

    /// Apply a click
    ///
    /// Returns `true` when a press or release was sent; repeats of the
    /// current state are no-ops.
    pub fn click(&mut self, button: Button, action: ButtonAction) -> Result<bool> {
        if !self.buttons.apply(button, action) {
            debug!("Ignoring repeated {:?} {:?}", button, action);
            return Ok(false);
        }

        let down = action == ButtonAction::Down;
        if let Err(e) = self.pointer.lock().set_button(button, down) {
            // Keep tracking it as held so teardown still tries a release
            if !down {
                self.buttons.apply(button, ButtonAction::Down);
            }
            return Err(e);
        }

        self.stats.clicks += 1;
        debug!("Button {:?} {:?}", button, action);
        Ok(true)
    }

    /// Forward a scroll
    pub fn scroll(&mut self, delta: f64) -> Result<()> {
        if delta == 0.0 || !delta.is_finite() {
            return Ok(());
        }
        self.pointer.lock().scroll(delta)?;
        self.stats.scrolls += 1;
        trace!("Scroll {:.2}", delta);
        Ok(())
    }

    /// Release every held button
    ///
    /// Every held button gets a release attempt even if an earlier one
    /// fails; all are marked up afterwards. Returns the buttons released.
    pub fn release_all(&mut self) -> Vec<Button> {
        let held = self.buttons.held();
        for button in &held {
            match self.pointer.lock().set_button(*button, false) {
                Ok(()) => debug!("Force-released {:?}", button),
                Err(e) => error!("Failed to force-release {:?}: {}", button, e),
            }
            self.buttons.force_up(*button);
        }
        held
    }

    /// Buttons currently held
    pub fn held_buttons(&self) -> Vec<Button> {
        self.buttons.held()
    }

    /// Most recent button named by a click
    pub fn last_button(&self) -> Option<Button> {
        self.buttons.last_button()
    }

    /// Running totals
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::backend::{shared, MockPointerBackend, RecordingPointer};
    use crate::input::error::InputError;
    use mockall::predicate::eq;

    #[test]
    fn test_subpixel_accumulation() {
        let recorder = RecordingPointer::new();
        let mut dispatcher = CommandDispatcher::new(shared(recorder.clone()));

        assert_eq!(dispatcher.move_by(Delta::new(0.4, 0.0)).unwrap(), None);
        assert_eq!(dispatcher.move_by(Delta::new(0.4, 0.0)).unwrap(), None);
        assert_eq!(dispatcher.move_by(Delta::new(0.4, -1.5)).unwrap(), Some((1, -1)));
        assert_eq!(recorder.total_motion(), (1, -1));
        assert_eq!(dispatcher.stats().moved_x, 1);
    }

    #[test]
    fn test_zero_move_not_sent() {
        let mut mock = MockPointerBackend::new();
        mock.expect_move_relative().never();
        let mut dispatcher = CommandDispatcher::new(shared(mock));
        assert_eq!(dispatcher.move_by(Delta::ZERO).unwrap(), None);
        assert_eq!(dispatcher.move_by(Delta::new(f64::NAN, 3.0)).unwrap(), None);
    }

    #[test]
    fn test_double_down_is_one_press() {
        let mut mock = MockPointerBackend::new();
        mock.expect_set_button()
            .with(eq(Button::Left), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut dispatcher = CommandDispatcher::new(shared(mock));

        assert!(dispatcher.click(Button::Left, ButtonAction::Down).unwrap());
        assert!(!dispatcher.click(Button::Left, ButtonAction::Down).unwrap());
        assert_eq!(dispatcher.held_buttons(), vec![Button::Left]);
    }

    #[test]
    fn test_release_all_forces_up() {
        let recorder = RecordingPointer::new();
        let mut dispatcher = CommandDispatcher::new(shared(recorder.clone()));

        dispatcher.click(Button::Left, ButtonAction::Down).unwrap();
        dispatcher.click(Button::Right, ButtonAction::Down).unwrap();
        dispatcher.click(Button::Right, ButtonAction::Up).unwrap();

        assert_eq!(dispatcher.release_all(), vec![Button::Left]);
        assert_eq!(
            recorder.button_events(),
            vec![
                (Button::Left, true),
                (Button::Right, true),
                (Button::Right, false),
                (Button::Left, false),
            ]
        );
        assert!(dispatcher.held_buttons().is_empty());
        assert!(dispatcher.release_all().is_empty());
    }

    #[test]
    fn test_backend_failure_propagates() {
        let mut mock = MockPointerBackend::new();
        mock.expect_scroll()
            .returning(|_| Err(InputError::rejected("scroll", "no device")));
        let mut dispatcher = CommandDispatcher::new(shared(mock));
        assert!(dispatcher.scroll(1.0).is_err());
        assert_eq!(dispatcher.stats().scrolls, 0);
    }

    #[test]
    fn test_failed_release_stays_held() {
        let mut mock = MockPointerBackend::new();
        mock.expect_set_button()
            .with(eq(Button::Left), eq(true))
            .returning(|_, _| Ok(()));
        mock.expect_set_button()
            .with(eq(Button::Left), eq(false))
            .returning(|_, _| Err(InputError::rejected("button", "busy")));
        let mut dispatcher = CommandDispatcher::new(shared(mock));

        dispatcher.click(Button::Left, ButtonAction::Down).unwrap();
        assert!(dispatcher.click(Button::Left, ButtonAction::Up).is_err());
        assert_eq!(dispatcher.held_buttons(), vec![Button::Left]);
    }
}
