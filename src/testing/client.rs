//! Test client for protocol-level testing
//!
//! The TestClient simulates a Wayland client by queueing the protocol events
//! a real client's requests would cause on the headless backend. This allows
//! testing surface lifecycle, notifications and focus behavior without a real
//! Wayland connection.
//!
//! # Design
//!
//! Instead of using real Wayland sockets, TestClient injects events directly
//! into the backend's queue. This provides:
//!
//! 1. **Deterministic testing**: No async IPC, all operations are synchronous
//! 2. **Direct state inspection**: Can check session state after each operation
//! 3. **Snapshot compatibility**: Ids are allocated sequentially by the backend

use smithay::utils::{Logical, Size};

use crate::backend::HeadlessBackend;
use crate::protocol::{ProtocolEvent, ToplevelRequest};
use crate::surface::{SurfaceId, SurfaceRole};

/// A unique identifier for a test client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub usize);

/// A test surface created by a TestClient
#[derive(Debug, Clone, PartialEq)]
pub struct TestSurface {
    pub id: SurfaceId,
    pub role: SurfaceRole,
    pub parent: Option<SurfaceId>,
    /// Whether the client has mapped the surface
    pub mapped: bool,
    /// Size of the last committed buffer
    pub size: Size<i32, Logical>,
}

/// A simulated Wayland client for testing
///
/// # Example
///
/// ```ignore
/// let mut backend = HeadlessBackend::new();
/// let mut client = TestClient::new(ClientId(1));
///
/// let surface = client.create_toplevel(&mut backend);
/// client.map(&mut backend, surface);
/// ```
#[derive(Debug)]
pub struct TestClient {
    pub id: ClientId,
    surfaces: Vec<TestSurface>,
}

impl TestClient {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            surfaces: Vec::new(),
        }
    }

    /// Create an xdg_toplevel surface.
    pub fn create_toplevel(&mut self, backend: &mut HeadlessBackend) -> SurfaceId {
        self.create_surface(backend, SurfaceRole::Toplevel, None)
    }

    /// Create an xdg_popup surface anchored to `parent`.
    pub fn create_popup(&mut self, backend: &mut HeadlessBackend, parent: SurfaceId) -> SurfaceId {
        let popup = self.create_surface(backend, SurfaceRole::Popup, Some(parent));
        backend.inject(ProtocolEvent::NewPopup {
            surface: parent,
            popup,
        });
        popup
    }

    pub fn create_surface(
        &mut self,
        backend: &mut HeadlessBackend,
        role: SurfaceRole,
        parent: Option<SurfaceId>,
    ) -> SurfaceId {
        let id = backend.alloc_surface_id();
        backend.inject(ProtocolEvent::NewSurface {
            surface: id,
            role: role.clone(),
            parent,
        });
        self.surfaces.push(TestSurface {
            id,
            role,
            parent,
            mapped: false,
            size: Size::default(),
        });
        id
    }

    pub fn map(&mut self, backend: &mut HeadlessBackend, id: SurfaceId) {
        backend.inject(ProtocolEvent::SurfaceMap { surface: id });
        if let Some(surface) = self.get_surface_mut(id) {
            surface.mapped = true;
        }
    }

    pub fn unmap(&mut self, backend: &mut HeadlessBackend, id: SurfaceId) {
        backend.inject(ProtocolEvent::SurfaceUnmap { surface: id });
        if let Some(surface) = self.get_surface_mut(id) {
            surface.mapped = false;
        }
    }

    /// Commit a buffer of the given size.
    pub fn commit(&mut self, backend: &mut HeadlessBackend, id: SurfaceId, width: i32, height: i32) {
        let size = Size::from((width, height));
        backend.inject(ProtocolEvent::SurfaceCommit { surface: id, size });
        if let Some(surface) = self.get_surface_mut(id) {
            surface.size = size;
        }
    }

    /// Send a toplevel request such as `set_title` or `move`.
    pub fn request(&mut self, backend: &mut HeadlessBackend, id: SurfaceId, request: ToplevelRequest) {
        backend.inject(ProtocolEvent::ToplevelRequest {
            surface: id,
            request,
        });
    }

    pub fn reposition(&mut self, backend: &mut HeadlessBackend, id: SurfaceId) {
        backend.inject(ProtocolEvent::PopupReposition { surface: id });
    }

    pub fn destroy(&mut self, backend: &mut HeadlessBackend, id: SurfaceId) {
        backend.inject(ProtocolEvent::SurfaceDestroy { surface: id });
        self.surfaces.retain(|surface| surface.id != id);
    }

    pub fn get_surface(&self, id: SurfaceId) -> Option<&TestSurface> {
        self.surfaces.iter().find(|s| s.id == id)
    }

    pub fn get_surface_mut(&mut self, id: SurfaceId) -> Option<&mut TestSurface> {
        self.surfaces.iter_mut().find(|s| s.id == id)
    }

    pub fn surfaces(&self) -> &[TestSurface] {
        &self.surfaces
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }
}

/// Manager for test clients in a fixture
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: Vec<TestClient>,
    next_client_id: usize,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&mut self) -> ClientId {
        let id = ClientId(self.next_client_id);
        self.next_client_id += 1;
        self.clients.push(TestClient::new(id));
        id
    }

    pub fn get_client(&self, id: ClientId) -> Option<&TestClient> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn get_client_mut(&mut self, id: ClientId) -> Option<&mut TestClient> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    /// Get total number of surfaces across all clients
    pub fn total_surfaces(&self) -> usize {
        self.clients.iter().map(|c| c.surface_count()).sum()
    }
}
