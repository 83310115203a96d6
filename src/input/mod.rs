//! Pointer Command Dispatch
//!
//! Applies fused motion and pass-through click/scroll events to the OS
//! pointer through a pluggable backend.
//!
//! # Features
//!
//! - **Relative movement** with sub-pixel accumulation
//! - **Idempotent buttons**: a repeated down (or up) is a no-op
//! - **Stuck-button recovery**: [`CommandDispatcher::release_all`] on every
//!   session exit path
//! - **Serialized access** to the single OS pointer across sessions
//!
//! # Architecture
//!
//! ```text
//! Session A                    Session B
//!     ↓                            ↓
//! ┌───────────────────┐   ┌───────────────────┐
//! │ CommandDispatcher │   │ CommandDispatcher │  ← per session
//! │  - ButtonTracker  │   │  - ButtonTracker  │
//! │  - remainder      │   │  - remainder      │
//! └───────────────────┘   └───────────────────┘
//!           ↓                      ↓
//!       ┌──────────────────────────────┐
//!       │ SharedPointer (mutex)        │  ← one call per lock
//!       │   Box<dyn PointerBackend>    │
//!       └──────────────────────────────┘
//!                      ↓
//!               OS input subsystem
//! ```
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use airmouse_server::estimator::Delta;
//! use airmouse_server::input::{create_backend, CommandDispatcher};
//! use airmouse_server::protocol::{Button, ButtonAction};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pointer = create_backend("log")?;
//! let mut dispatcher = CommandDispatcher::new(pointer);
//!
//! dispatcher.move_by(Delta::new(3.5, -1.2))?;
//! dispatcher.click(Button::Left, ButtonAction::Down)?;
//!
//! // On disconnect
//! dispatcher.release_all();
//! # Ok(())
//! # }
//! ```

mod backend;
mod buttons;
mod dispatcher;
mod error;

pub use backend::{
    create_backend, shared, LogPointer, NullPointer, PointerBackend, PointerCommand,
    RecordingPointer, SharedPointer,
};
pub use buttons::ButtonTracker;
pub use dispatcher::{CommandDispatcher, DispatchStats};
pub use error::{InputError, Result};
