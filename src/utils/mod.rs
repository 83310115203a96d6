//! Utility Functions
//!
//! User-friendly error formatting for startup failures.
//!
//! ## Error Formatting
//!
//! The [`errors`] module provides user-friendly error messages:
//!
//! ```rust,no_run
//! use airmouse_server::utils::format_user_error;
//!
//! # fn operation() -> anyhow::Result<()> { Ok(()) }
//! if let Err(e) = operation() {
//!     eprintln!("{}", format_user_error(&e));
//! }
//! ```
//!
//! Error categories with context-aware help:
//! - Pointer backend errors → Supported backend names
//! - Network errors → Port conflicts, permission issues
//! - Config errors → Syntax validation, value ranges

pub mod errors;

pub use errors::format_user_error;
