//! Protocol-level tests for the session core
//!
//! These tests verify how the session reacts to client and device events,
//! and what it tells the policy process, by using the test fixture to
//! simulate clients.
//!
//! # Test Organization
//!
//! - `xdg_shell.rs` - Surface lifecycle, desktop handling, popups, notifications
//! - `focus.rs` - Pointer focus from hit testing, keyboard focus, key delivery
//! - `policy.rs` - Policy requests, acknowledgements, dropped requests

mod focus;
mod policy;
mod xdg_shell;
