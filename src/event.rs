//! Notification vocabulary sent from the compositor to the policy process.
//!
//! Every notification is a single line of the form
//! `<serial> <event> <role> <address>`, where the address is the hexadecimal
//! id of the surface or output the event is about.

use std::fmt;

use serde::Serialize;

/// Notification kinds understood by the policy process
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// A surface other than the desktop was created
    NewSurface,
    /// A surface was destroyed
    SurfaceDestroy,
    Map,
    Unmap,
    NewPopup,
    Move,
    Resize,
    Maximize,
    Minimize,
    Fullscreen,
    ShowWindowMenu,
    SetParent,
    SetTitle,
    SetAppId,
    /// A popup asked to be repositioned
    Reposition,
    /// An output was connected
    NewOutput,
}

impl Event {
    pub fn name(self) -> &'static str {
        match self {
            Event::NewSurface => "new_surface",
            Event::SurfaceDestroy => "surface_destroy",
            Event::Map => "map",
            Event::Unmap => "unmap",
            Event::NewPopup => "new_popup",
            Event::Move => "move",
            Event::Resize => "resize",
            Event::Maximize => "maximize",
            Event::Minimize => "minimize",
            Event::Fullscreen => "fullscreen",
            Event::ShowWindowMenu => "show_window_menu",
            Event::SetParent => "set_parent",
            Event::SetTitle => "set_title",
            Event::SetAppId => "set_app_id",
            Event::Reposition => "reposition",
            Event::NewOutput => "new_output",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role label carried by output notifications
pub const OUTPUT_ROLE: &str = "OUTPUT";

/// One outbound notification line
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub serial: u64,
    pub event: Event,
    pub role: String,
    pub address: u64,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:#x}",
            self.serial, self.event, self.role, self.address
        )
    }
}
