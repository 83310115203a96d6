//! Pointer-Control Backends
//!
//! The OS pointer is a single resource shared by every session. Backends are
//! wrapped in [`SharedPointer`] and each command holds the lock for exactly
//! one call, so commands from different sessions never interleave.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{InputError, Result};
use crate::protocol::Button;

/// Capability that actually drives the OS pointer
///
/// Calls are synchronous and expected to be fast.
#[cfg_attr(test, mockall::automock)]
pub trait PointerBackend: Send {
    /// Move the pointer by whole pixels
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()>;

    /// Press (`down = true`) or release a button
    fn set_button(&mut self, button: Button, down: bool) -> Result<()>;

    /// Scroll by a pre-clamped amount
    fn scroll(&mut self, delta: f64) -> Result<()>;
}

/// Process-wide handle to the pointer backend
pub type SharedPointer = Arc<Mutex<Box<dyn PointerBackend>>>;

/// Wrap a backend for sharing between sessions
pub fn shared(backend: impl PointerBackend + 'static) -> SharedPointer {
    Arc::new(Mutex::new(Box::new(backend)))
}

/// Create the backend named in `[input].backend`
pub fn create_backend(name: &str) -> Result<SharedPointer> {
    match name {
        "log" => Ok(shared(LogPointer::default())),
        "null" => Ok(shared(NullPointer)),
        other => Err(InputError::BackendUnavailable(format!(
            "unknown pointer backend '{}'",
            other
        ))),
    }
}

/// Backend that logs every command instead of moving anything
#[derive(Debug, Default)]
pub struct LogPointer {
    commands: u64,
}

impl PointerBackend for LogPointer {
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.commands += 1;
        debug!("pointer move ({}, {})", dx, dy);
        Ok(())
    }

    fn set_button(&mut self, button: Button, down: bool) -> Result<()> {
        self.commands += 1;
        info!(
            "pointer {:?} {}",
            button,
            if down { "down" } else { "up" }
        );
        Ok(())
    }

    fn scroll(&mut self, delta: f64) -> Result<()> {
        self.commands += 1;
        debug!("pointer scroll {:.2}", delta);
        Ok(())
    }
}

/// Backend that discards every command
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPointer;

impl PointerBackend for NullPointer {
    fn move_relative(&mut self, _dx: i32, _dy: i32) -> Result<()> {
        Ok(())
    }

    fn set_button(&mut self, _button: Button, _down: bool) -> Result<()> {
        Ok(())
    }

    fn scroll(&mut self, _delta: f64) -> Result<()> {
        Ok(())
    }
}

/// Command as seen by a backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerCommand {
    /// Relative move
    Move {
        /// Horizontal pixels
        dx: i32,
        /// Vertical pixels
        dy: i32,
    },
    /// Button transition
    Button {
        /// Button
        button: Button,
        /// Pressed
        down: bool,
    },
    /// Scroll
    Scroll(f64),
}

/// Backend that records commands for later inspection
///
/// Clones share the same log, so a test can keep one clone while the other
/// is owned by a [`SharedPointer`]. Optionally starts rejecting calls after
/// a fixed number of accepted commands.
#[derive(Debug, Clone, Default)]
pub struct RecordingPointer {
    log: Arc<Mutex<Vec<PointerCommand>>>,
    fail_after: Option<usize>,
}

impl RecordingPointer {
    /// Create a recorder that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder that rejects every call after `accepted` commands
    pub fn failing_after(accepted: usize) -> Self {
        Self {
            log: Arc::default(),
            fail_after: Some(accepted),
        }
    }

    /// Commands accepted so far
    pub fn commands(&self) -> Vec<PointerCommand> {
        self.log.lock().clone()
    }

    /// Sum of all accepted moves
    pub fn total_motion(&self) -> (i64, i64) {
        self.log
            .lock()
            .iter()
            .fold((0, 0), |(x, y), command| match command {
                PointerCommand::Move { dx, dy } => (x + *dx as i64, y + *dy as i64),
                _ => (x, y),
            })
    }

    /// Accepted button transitions, in order
    pub fn button_events(&self) -> Vec<(Button, bool)> {
        self.log
            .lock()
            .iter()
            .filter_map(|command| match command {
                PointerCommand::Button { button, down } => Some((*button, *down)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, command: PointerCommand, name: &'static str) -> Result<()> {
        let mut log = self.log.lock();
        if let Some(limit) = self.fail_after {
            // Releases are always recorded so teardown stays observable
            let is_release = matches!(command, PointerCommand::Button { down: false, .. });
            if log.len() >= limit && !is_release {
                return Err(InputError::rejected(name, "recording backend limit reached"));
            }
        }
        log.push(command);
        Ok(())
    }
}

impl PointerBackend for RecordingPointer {
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.record(PointerCommand::Move { dx, dy }, "move")
    }

    fn set_button(&mut self, button: Button, down: bool) -> Result<()> {
        self.record(PointerCommand::Button { button, down }, "button")
    }

    fn scroll(&mut self, delta: f64) -> Result<()> {
        self.record(PointerCommand::Scroll(delta), "scroll")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_backend() {
        assert!(create_backend("log").is_ok());
        assert!(create_backend("null").is_ok());
        assert!(matches!(
            create_backend("uinput"),
            Err(InputError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_recording_pointer_shares_log() {
        let recorder = RecordingPointer::new();
        let pointer = shared(recorder.clone());

        pointer.lock().move_relative(3, -1).unwrap();
        pointer.lock().set_button(Button::Left, true).unwrap();
        pointer.lock().scroll(-2.0).unwrap();
        pointer.lock().move_relative(1, 1).unwrap();

        assert_eq!(recorder.commands().len(), 4);
        assert_eq!(recorder.total_motion(), (4, 0));
        assert_eq!(recorder.button_events(), vec![(Button::Left, true)]);
    }

    #[test]
    fn test_recording_pointer_failure() {
        let mut recorder = RecordingPointer::failing_after(1);
        recorder.move_relative(1, 0).unwrap();
        assert!(recorder.move_relative(1, 0).is_err());
        assert!(recorder.set_button(Button::Left, true).is_err());
        assert!(recorder.set_button(Button::Left, false).is_ok());
    }
}
