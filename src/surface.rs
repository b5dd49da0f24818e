//! Surface registry and shell surface lifecycle
//!
//! A surface is registered when the shell announces it and lives until its
//! destroy event. Toplevels get a scene node under the root, popups one under
//! their parent's node; surfaces with any other role are tracked but never
//! shown.
//!
//! The first registered surface is the desktop: it is not announced to the
//! policy process and is presented full screen by the session itself when it
//! maps.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use smithay::utils::{Logical, Size};
use tracing::{debug, info, warn};

use crate::backend::Platform;
use crate::dispatch::{EventKind, Handler, RoleLabel, Source};
use crate::event::Event;
use crate::input;
use crate::protocol::ToplevelRequest;
use crate::scene::NodeId;
use crate::session::{Session, SessionError};

/// Stable identity of a client surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSurfaceId;

/// Parses hexadecimal ids, with or without a `0x` prefix.
impl FromStr for SurfaceId {
    type Err = InvalidSurfaceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidSurfaceId);
        }
        u64::from_str_radix(digits, 16)
            .map(SurfaceId)
            .map_err(|_| InvalidSurfaceId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceRole {
    Toplevel,
    Popup,
    /// Any role the session does not manage, by protocol name
    Other(String),
}

impl SurfaceRole {
    pub fn name(&self) -> &str {
        match self {
            SurfaceRole::Toplevel => "TOPLEVEL",
            SurfaceRole::Popup => "POPUP",
            SurfaceRole::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Created,
    /// Has a scene node
    Attached,
    /// Never shown: unknown role, or a popup whose parent is gone
    Rejected,
    Mapped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub id: SurfaceId,
    pub role: SurfaceRole,
    /// Parent surface, popups only
    pub parent: Option<SurfaceId>,
    /// Tree node holding the surface and its popups
    pub node: Option<NodeId>,
    /// Buffer node carrying the surface contents
    pub buffer: Option<NodeId>,
    pub state: SurfaceState,
}

impl Surface {
    pub fn new(id: SurfaceId, role: SurfaceRole) -> Self {
        Self {
            id,
            role,
            parent: None,
            node: None,
            buffer: None,
            state: SurfaceState::Created,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.state == SurfaceState::Mapped
    }
}

#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: HashMap<SurfaceId, Surface>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `surface`, returning the record it replaced if the id was reused.
    pub fn insert(&mut self, surface: Surface) -> Option<Surface> {
        self.surfaces.insert(surface.id, surface)
    }

    pub fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        self.surfaces.remove(&id)
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn clear(&mut self) {
        self.surfaces.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Surface> {
        self.surfaces.values_mut()
    }
}

impl<P: Platform> Session<P> {
    pub(crate) fn handle_new_surface(
        &mut self,
        id: SurfaceId,
        role: SurfaceRole,
        parent: Option<SurfaceId>,
    ) -> Result<(), SessionError> {
        info!(surface = %id, role = role.name(), "new xdg surface");

        if self.surfaces.insert(Surface::new(id, role.clone())).is_some() {
            warn!(surface = %id, "surface id reused, replacing stale record");
        }

        let source = Source::Surface(id);
        self.handlers
            .subscribe(source, EventKind::Destroy, Handler::SurfaceDestroy);
        self.handlers
            .subscribe(source, EventKind::Map, Handler::SurfaceMap);
        self.handlers
            .subscribe(source, EventKind::Unmap, Handler::SurfaceUnmap);
        self.handlers.subscribe(
            source,
            EventKind::NewPopup,
            Handler::Notify {
                event: Event::NewPopup,
                role: RoleLabel::OfSurface,
            },
        );
        self.handlers
            .subscribe(source, EventKind::Commit, Handler::SurfaceCommit);

        let attached = match &role {
            SurfaceRole::Toplevel => {
                for request in ToplevelRequest::ALL {
                    self.handlers.subscribe(
                        source,
                        EventKind::ToplevelRequest(request),
                        Handler::Notify {
                            event: toplevel_request_event(request),
                            role: RoleLabel::Toplevel,
                        },
                    );
                }
                let root = self.scene.root();
                Some((self.scene.append_surface(root, id)?, None))
            }
            SurfaceRole::Popup => {
                self.handlers.subscribe(
                    source,
                    EventKind::Reposition,
                    Handler::Notify {
                        event: Event::Reposition,
                        role: RoleLabel::Popup,
                    },
                );
                let parent_node = parent
                    .and_then(|parent| self.surfaces.get(parent))
                    .and_then(|parent| parent.node)
                    .ok_or(SessionError::OrphanPopup {
                        surface: id,
                        parent,
                    })?;
                Some((self.scene.append_surface(parent_node, id)?, parent))
            }
            SurfaceRole::Other(name) => {
                warn!(surface = %id, "unknown xdg surface role: {name}");
                None
            }
        };

        let buffer = match attached {
            Some((node, _)) => Some(self.scene.child(node, 0)?.id()),
            None => None,
        };
        if let Some(surface) = self.surfaces.get_mut(id) {
            match attached {
                Some((node, parent)) => {
                    surface.node = Some(node);
                    surface.buffer = buffer;
                    surface.parent = parent;
                    surface.state = SurfaceState::Attached;
                }
                None => surface.state = SurfaceState::Rejected,
            }
        }

        // The first surface is the desktop and is never announced.
        if self.surfaces.len() > 1 {
            self.notify(Event::NewSurface, role.name(), id.0);
        }
        Ok(())
    }

    pub(crate) fn handle_surface_destroy(&mut self, id: SurfaceId) -> Result<(), SessionError> {
        info!(surface = %id, "xdg surface destroyed");
        let Some(surface) = self.surfaces.remove(id) else {
            return Ok(());
        };
        self.notify(Event::SurfaceDestroy, surface.role.name(), id.0);
        self.handlers.unsubscribe_source(Source::Surface(id));

        // A popup's node is already gone if its parent was destroyed first.
        if let Some(node) = surface.node.filter(|node| self.scene.contains(*node)) {
            self.scene.destroy(node)?;
            self.detach_orphaned_popups();
        }
        if self.input.pointed_surface == Some(id) {
            self.input.pointed_surface = None;
        }
        Ok(())
    }

    /// Drop node references of popups whose tree went away with a parent.
    fn detach_orphaned_popups(&mut self) {
        let scene = &self.scene;
        for surface in self.surfaces.iter_mut() {
            if surface.node.is_some_and(|node| !scene.contains(node)) {
                debug!(surface = %surface.id, "parent destroyed, popup detached");
                surface.node = None;
                surface.buffer = None;
                surface.state = SurfaceState::Rejected;
            }
        }
    }

    pub(crate) fn handle_surface_map(&mut self, id: SurfaceId) -> Result<(), SessionError> {
        let Some(surface) = self.surfaces.get_mut(id) else {
            return Ok(());
        };
        if surface.node.is_some() {
            surface.state = SurfaceState::Mapped;
        }
        let role = surface.role.name().to_owned();

        if self.surfaces.len() > 1 {
            debug!(surface = %id, "surface mapped");
            self.notify(Event::Map, &role, id.0);
            return Ok(());
        }
        self.present_desktop(id)
    }

    pub(crate) fn handle_surface_unmap(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.get_mut(id) else {
            return;
        };
        if surface.state == SurfaceState::Mapped {
            surface.state = SurfaceState::Attached;
        }
        let role = surface.role.name().to_owned();
        self.notify(Event::Unmap, &role, id.0);
    }

    pub(crate) fn handle_surface_commit(
        &mut self,
        id: SurfaceId,
        size: Size<i32, Logical>,
    ) -> Result<(), SessionError> {
        let Some(buffer) = self.surfaces.get(id).and_then(|s| s.buffer) else {
            return Ok(());
        };
        if self.scene.size(buffer)? != size {
            self.scene.set_size(buffer, size.w, size.h)?;
        }
        Ok(())
    }

    /// Show the desktop surface full screen with keyboard focus.
    fn present_desktop(&mut self, id: SurfaceId) -> Result<(), SessionError> {
        info!(surface = %id, "mapping desktop surface");
        match self.outputs.first().map(|output| output.effective_resolution()) {
            Some(size) => self.resize_surface(id, size)?,
            None => warn!("no output connected, desktop keeps its own size"),
        }
        self.platform.surface_set_maximized(id, true);
        if let Some(node) = self.surfaces.get(id).and_then(|s| s.node) {
            self.scene.set_position(node, 0, 0)?;
            self.scene.raise_to_top(node)?;
        }
        self.platform.surface_set_activated(id, true);
        input::focus_surface(self, id);
        self.commit_all_outputs();
        Ok(())
    }

    /// Configure the client with `size` and resize its buffer node to match.
    pub(crate) fn resize_surface(
        &mut self,
        id: SurfaceId,
        size: Size<i32, Logical>,
    ) -> Result<(), SessionError> {
        self.platform.surface_set_size(id, size);
        if let Some(buffer) = self.surfaces.get(id).and_then(|s| s.buffer) {
            self.scene.set_size(buffer, size.w, size.h)?;
        }
        Ok(())
    }
}

fn toplevel_request_event(request: ToplevelRequest) -> Event {
    match request {
        ToplevelRequest::Move => Event::Move,
        ToplevelRequest::Resize => Event::Resize,
        ToplevelRequest::Maximize => Event::Maximize,
        ToplevelRequest::Minimize => Event::Minimize,
        ToplevelRequest::Fullscreen => Event::Fullscreen,
        ToplevelRequest::ShowWindowMenu => Event::ShowWindowMenu,
        ToplevelRequest::SetParent => Event::SetParent,
        ToplevelRequest::SetTitle => Event::SetTitle,
        ToplevelRequest::SetAppId => Event::SetAppId,
    }
}
