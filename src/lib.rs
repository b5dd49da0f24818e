//! PWM - policy-driven Wayland manager
//!
//! Wayland compositor session core. The session owns the display-server
//! resources, a scene graph of client surfaces, input routing and outputs,
//! and forwards every window-management decision to an external policy
//! process over a line protocol on its stdin/stdout.
pub mod backend;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod event;
pub mod frame_clock;
pub mod input;
pub mod ipc;
pub mod output;
pub mod protocol;
pub mod runtime;
pub mod scene;
pub mod session;
pub mod surface;
pub mod testing;
pub mod utils;

pub use backend::{HeadlessBackend, Platform, PlatformError, Resource};
pub use config::Config;
pub use event::{Event, Notification};
pub use ipc::{Command, PolicyBridge, Request};
pub use output::{OutputId, OutputInfo, OutputMode};
pub use protocol::ProtocolEvent;
pub use scene::{NodeId, SceneGraph};
pub use session::{Session, SessionError};
pub use surface::{SurfaceId, SurfaceRole};
