//! Inbound protocol events
//!
//! Events produced by the display server and input stack, as delivered to the
//! session by a [`Platform`](crate::backend::Platform). Each event names its
//! emitting source so the session can route it through the handler table.

use std::fmt;

use smithay::backend::input::{Axis, AxisSource, ButtonState, KeyState};
use smithay::utils::{Logical, Point, Size};

use crate::dispatch::{EventKind, Source};
use crate::output::{OutputId, OutputMode};
use crate::surface::{SurfaceId, SurfaceRole};

/// Input device identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDeviceType {
    Keyboard,
    Pointer,
    Touch,
    TabletTool,
    TabletPad,
    Switch,
}

/// Serialized xkb modifier state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub depressed: u32,
    pub latched: u32,
    pub locked: u32,
    pub group: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub time_msec: u32,
    pub keycode: u32,
    pub state: KeyState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisEvent {
    pub time_msec: u32,
    pub source: AxisSource,
    pub orientation: Axis,
    pub delta: f64,
    pub delta_discrete: i32,
}

/// Data source offered by a client for the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionSource(pub u64);

/// Requests a toplevel makes that are forwarded to the policy process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToplevelRequest {
    Move,
    Resize,
    Maximize,
    Minimize,
    Fullscreen,
    ShowWindowMenu,
    SetParent,
    SetTitle,
    SetAppId,
}

impl ToplevelRequest {
    pub const ALL: [ToplevelRequest; 9] = [
        ToplevelRequest::Move,
        ToplevelRequest::Resize,
        ToplevelRequest::Maximize,
        ToplevelRequest::Minimize,
        ToplevelRequest::Fullscreen,
        ToplevelRequest::ShowWindowMenu,
        ToplevelRequest::SetParent,
        ToplevelRequest::SetTitle,
        ToplevelRequest::SetAppId,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    NewSurface {
        surface: SurfaceId,
        role: SurfaceRole,
        /// Parent surface, popups only
        parent: Option<SurfaceId>,
    },
    SurfaceDestroy {
        surface: SurfaceId,
    },
    SurfaceMap {
        surface: SurfaceId,
    },
    SurfaceUnmap {
        surface: SurfaceId,
    },
    NewPopup {
        surface: SurfaceId,
        popup: SurfaceId,
    },
    SurfaceCommit {
        surface: SurfaceId,
        size: Size<i32, Logical>,
    },
    ToplevelRequest {
        surface: SurfaceId,
        request: ToplevelRequest,
    },
    PopupReposition {
        surface: SurfaceId,
    },
    NewInput {
        device: DeviceId,
        device_type: InputDeviceType,
    },
    NewOutput {
        output: OutputId,
        name: String,
        modes: Vec<OutputMode>,
    },
    OutputFrame {
        output: OutputId,
    },
    PointerMotion {
        device: DeviceId,
        time_msec: u32,
        delta: Point<f64, Logical>,
    },
    /// Absolute motion in normalized layout coordinates
    PointerMotionAbsolute {
        device: DeviceId,
        time_msec: u32,
        x: f64,
        y: f64,
    },
    PointerButton {
        device: DeviceId,
        time_msec: u32,
        button: u32,
        state: ButtonState,
    },
    PointerAxis(AxisEvent),
    PointerFrame,
    KeyboardModifiers {
        keyboard: DeviceId,
        modifiers: Modifiers,
    },
    KeyboardKey {
        keyboard: DeviceId,
        event: KeyEvent,
    },
    RequestSetCursor {
        surface: Option<SurfaceId>,
        hotspot: Point<i32, Logical>,
    },
    RequestSetSelection {
        source: Option<SelectionSource>,
        serial: u32,
    },
}

impl ProtocolEvent {
    /// Emitting source and event kind used to look up the subscribed handler
    pub fn route(&self) -> (Source, EventKind) {
        match self {
            ProtocolEvent::NewSurface { .. } => (Source::Shell, EventKind::NewSurface),
            ProtocolEvent::SurfaceDestroy { surface } => {
                (Source::Surface(*surface), EventKind::Destroy)
            }
            ProtocolEvent::SurfaceMap { surface } => (Source::Surface(*surface), EventKind::Map),
            ProtocolEvent::SurfaceUnmap { surface } => {
                (Source::Surface(*surface), EventKind::Unmap)
            }
            ProtocolEvent::NewPopup { surface, .. } => {
                (Source::Surface(*surface), EventKind::NewPopup)
            }
            ProtocolEvent::SurfaceCommit { surface, .. } => {
                (Source::Surface(*surface), EventKind::Commit)
            }
            ProtocolEvent::ToplevelRequest { surface, request } => (
                Source::Surface(*surface),
                EventKind::ToplevelRequest(*request),
            ),
            ProtocolEvent::PopupReposition { surface } => {
                (Source::Surface(*surface), EventKind::Reposition)
            }
            ProtocolEvent::NewInput { .. } => (Source::Backend, EventKind::NewInput),
            ProtocolEvent::NewOutput { .. } => (Source::Backend, EventKind::NewOutput),
            ProtocolEvent::OutputFrame { output } => (Source::Output(*output), EventKind::Frame),
            ProtocolEvent::PointerMotion { .. } => (Source::Cursor, EventKind::Motion),
            ProtocolEvent::PointerMotionAbsolute { .. } => {
                (Source::Cursor, EventKind::MotionAbsolute)
            }
            ProtocolEvent::PointerButton { .. } => (Source::Cursor, EventKind::Button),
            ProtocolEvent::PointerAxis(_) => (Source::Cursor, EventKind::Axis),
            ProtocolEvent::PointerFrame => (Source::Cursor, EventKind::Frame),
            ProtocolEvent::KeyboardModifiers { keyboard, .. } => {
                (Source::Keyboard(*keyboard), EventKind::Modifiers)
            }
            ProtocolEvent::KeyboardKey { keyboard, .. } => {
                (Source::Keyboard(*keyboard), EventKind::Key)
            }
            ProtocolEvent::RequestSetCursor { .. } => (Source::Seat, EventKind::RequestSetCursor),
            ProtocolEvent::RequestSetSelection { .. } => {
                (Source::Seat, EventKind::RequestSetSelection)
            }
        }
    }
}
