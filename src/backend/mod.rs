//! Platform abstraction layer
//!
//! The session core never talks to the display server, renderer or input
//! stack directly. Everything it needs from them goes through the
//! [`Platform`] trait:
//!
//! - **Lifecycle**: ordered acquisition and release of the display-server
//!   objects the session depends on ([`Resource`]).
//! - **Events**: protocol events produced by clients and devices are drained
//!   with [`Platform::take_events`] and dispatched by the session.
//! - **Requests**: the calls the session makes on the seat, cursor, outputs,
//!   keyboards and shell surfaces.
//!
//! # Design Invariants
//!
//! 1. **Reverse teardown**: resources are released in exactly the reverse
//!    order they were acquired. The session owns that order; platforms only
//!    act on individual resources.
//!
//! 2. **Single owner**: a platform is owned by one session and is only ever
//!    used from the event loop thread.
//!
//! The only implementation shipped is [`HeadlessBackend`], which records every
//! request for assertions and lets tests inject events.

pub mod headless;

pub use headless::HeadlessBackend;

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use smithay::backend::input::ButtonState;
use smithay::input::keyboard::xkb;
use smithay::utils::{Logical, Point, Size};
use thiserror::Error;

use crate::cursor::CursorImage;
use crate::output::{OutputId, OutputMode};
use crate::protocol::{AxisEvent, DeviceId, KeyEvent, Modifiers, ProtocolEvent, SelectionSource};
use crate::scene::SceneGraph;
use crate::surface::SurfaceId;

/// Display-server objects acquired by a session, in acquisition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Display,
    Compositor,
    Allocator,
    Renderer,
    Backend,
    Subcompositor,
    DataDeviceManager,
    XdgShell,
    OutputLayout,
    Cursor,
    CursorImageManager,
    Seat,
    Scene,
    IdleNotifier,
    KeymapContext,
    Socket,
}

impl Resource {
    pub const ACQUISITION_ORDER: [Resource; 16] = [
        Resource::Display,
        Resource::Compositor,
        Resource::Allocator,
        Resource::Renderer,
        Resource::Backend,
        Resource::Subcompositor,
        Resource::DataDeviceManager,
        Resource::XdgShell,
        Resource::OutputLayout,
        Resource::Cursor,
        Resource::CursorImageManager,
        Resource::Seat,
        Resource::Scene,
        Resource::IdleNotifier,
        Resource::KeymapContext,
        Resource::Socket,
    ];

    /// Whether releasing this resource requires an explicit finalization step
    pub fn requires_finalization(self) -> bool {
        matches!(
            self,
            Resource::Display
                | Resource::OutputLayout
                | Resource::Cursor
                | Resource::CursorImageManager
                | Resource::Seat
                | Resource::Backend
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Resource::Display => "display",
            Resource::Compositor => "compositor",
            Resource::Allocator => "allocator",
            Resource::Renderer => "renderer",
            Resource::Backend => "backend",
            Resource::Subcompositor => "subcompositor",
            Resource::DataDeviceManager => "data device manager",
            Resource::XdgShell => "xdg shell",
            Resource::OutputLayout => "output layout",
            Resource::Cursor => "cursor",
            Resource::CursorImageManager => "cursor image manager",
            Resource::Seat => "seat",
            Resource::Scene => "scene",
            Resource::IdleNotifier => "idle notifier",
            Resource::KeymapContext => "keymap context",
            Resource::Socket => "socket",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to acquire {resource}: {reason}")]
    Acquire { resource: Resource, reason: String },
    #[error("failed to start backend: {0}")]
    Start(String),
    #[error("unknown output {0}")]
    UnknownOutput(OutputId),
    #[error("failed to initialize rendering on output {output}: {reason}")]
    OutputRender { output: OutputId, reason: String },
}

bitflags! {
    /// wl_seat capability bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SeatCapabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
        const TOUCH = 4;
    }
}

/// External collaborators of the session: display server, renderer and input stack
pub trait Platform {
    // --- Lifecycle ---

    fn acquire(&mut self, resource: Resource) -> Result<(), PlatformError>;
    fn release(&mut self, resource: Resource);
    /// Start the backend; devices and outputs already present are announced as events.
    fn start(&mut self) -> Result<(), PlatformError>;
    /// Name of the listening socket clients connect to
    fn socket_name(&self) -> Option<String>;
    /// Drain the protocol events produced since the last call.
    fn take_events(&mut self) -> Vec<ProtocolEvent>;

    // --- Outputs ---

    fn output_init_render(&mut self, output: OutputId) -> Result<(), PlatformError>;
    fn output_set_mode(&mut self, output: OutputId, mode: Option<OutputMode>);
    fn output_enable(&mut self, output: OutputId, enabled: bool);
    fn output_commit(&mut self, output: OutputId) -> bool;
    /// Place `output` right of the outputs already in the layout, returning its position.
    fn layout_add_auto(&mut self, output: OutputId, size: Size<i32, Logical>) -> Point<i32, Logical>;
    fn layout_add(&mut self, output: OutputId, position: Point<i32, Logical>, size: Size<i32, Logical>);
    fn render_scene_output(&mut self, output: OutputId, scene: &SceneGraph);
    fn send_frame_done(&mut self, output: OutputId, time: Duration);

    // --- Cursor ---

    fn cursor_attach_device(&mut self, device: DeviceId);
    fn cursor_move(&mut self, device: DeviceId, delta: Point<f64, Logical>);
    /// Warp to normalized layout coordinates, clamped to the closest output.
    fn cursor_warp_absolute(&mut self, device: DeviceId, x: f64, y: f64);
    fn cursor_position(&self) -> Point<f64, Logical>;
    fn set_cursor_image(&mut self, image: CursorImage);

    /// Report user activity to the idle tracker.
    fn notify_activity(&mut self);

    // --- Seat ---

    fn seat_set_capabilities(&mut self, capabilities: SeatCapabilities);
    fn pointer_notify_enter(&mut self, surface: SurfaceId, local: Point<f64, Logical>);
    fn pointer_notify_motion(&mut self, time_msec: u32, local: Point<f64, Logical>);
    fn pointer_clear_focus(&mut self);
    fn pointer_notify_button(&mut self, time_msec: u32, button: u32, state: ButtonState);
    fn pointer_notify_axis(&mut self, event: AxisEvent);
    fn pointer_notify_frame(&mut self);
    fn seat_set_keyboard(&mut self, keyboard: DeviceId);
    fn keyboard_notify_modifiers(&mut self, modifiers: Modifiers);
    fn keyboard_notify_key(&mut self, event: KeyEvent);
    fn keyboard_notify_enter(&mut self, surface: SurfaceId, keyboard: DeviceId);
    fn seat_set_selection(&mut self, source: Option<SelectionSource>, serial: u32);

    // --- Keyboards ---

    fn keyboard_set_keymap(&mut self, keyboard: DeviceId, keymap: Option<&xkb::Keymap>);
    fn keyboard_set_repeat_info(&mut self, keyboard: DeviceId, rate: i32, delay: i32);

    // --- Shell surfaces ---

    fn surface_set_size(&mut self, surface: SurfaceId, size: Size<i32, Logical>);
    fn surface_set_maximized(&mut self, surface: SurfaceId, maximized: bool);
    fn surface_set_activated(&mut self, surface: SurfaceId, activated: bool);
}
