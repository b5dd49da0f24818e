//! Testing infrastructure for the session core
//!
//! This module provides test fixtures and utilities for integration testing
//! a session without a display server, GPU or policy process.
//!
//! # Architecture
//!
//! The testing infrastructure is built on three key components:
//!
//! 1. **HeadlessBackend**: Provides virtual outputs and input devices and
//!    records every request the session makes of the platform.
//!
//! 2. **Fixture**: The main test harness that owns a started session, captures
//!    everything sent to the policy process and feeds requests back in.
//!
//! 3. **TestClient**: A mock Wayland client that creates, maps and destroys
//!    surfaces by queueing the protocol events a real client would cause.
//!
//! # Example
//!
//! ```ignore
//! use pwm_core::testing::Fixture;
//!
//! #[test]
//! fn test_surface_creation() {
//!     let mut fixture = Fixture::new().unwrap();
//!     fixture.add_output("Virtual-1", 1920, 1080);
//!
//!     let client = fixture.add_client();
//!     fixture.add_desktop(client);
//!     let window = fixture.create_toplevel(client);
//!
//!     let lines = fixture.take_policy_lines();
//!     assert_eq!(lines.last(), Some(&format!("1 new_surface TOPLEVEL {window}")));
//! }
//! ```

mod client;
mod fixture;

pub use client::{ClientId, ClientManager, TestClient, TestSurface};
pub use fixture::{Fixture, PolicyCapture};
