//! Test fixture for integration testing
//!
//! The Fixture provides a complete session environment for testing,
//! including a headless backend and a captured policy channel.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use tracing::{info, warn};

use crate::backend::HeadlessBackend;
use crate::config::Config;
use crate::output::OutputId;
use crate::protocol::{DeviceId, ProtocolEvent, ToplevelRequest};
use crate::session::{Session, SessionError};
use crate::surface::SurfaceId;

use super::client::{ClientId, ClientManager, TestClient};

/// Stands in for the policy process's stdin, recording every line sent
#[derive(Debug, Clone, Default)]
pub struct PolicyCapture(Rc<RefCell<Vec<u8>>>);

impl PolicyCapture {
    /// Every line sent so far
    pub fn lines(&self) -> Vec<String> {
        split_lines(&self.0.borrow())
    }

    /// Lines sent since the last call
    pub fn take_lines(&self) -> Vec<String> {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        split_lines(&bytes)
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_owned)
        .collect()
}

impl Write for PolicyCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Test fixture for integration testing
///
/// Provides a started session with:
/// - Headless backend for virtual outputs and input devices
/// - A captured policy channel
/// - Client manager for simulating Wayland clients
///
/// Uses the same `Session` as production, only on the headless platform and
/// without an event loop: every helper dispatches queued events before it
/// returns.
pub struct Fixture {
    session: Session<HeadlessBackend>,
    policy: PolicyCapture,
    clients: ClientManager,
    /// Error from the last dispatch, if any
    error: Option<SessionError>,
}

impl Fixture {
    /// Create a started session with no outputs and no devices.
    pub fn new() -> Result<Self, SessionError> {
        Self::with_backend(HeadlessBackend::new(), Config::default())
    }

    /// Create a started session on `backend`.
    ///
    /// Outputs the backend already has are announced once the policy channel
    /// is attached, as in production.
    pub fn with_backend(backend: HeadlessBackend, config: Config) -> Result<Self, SessionError> {
        let mut session = Session::new(backend, config, "seat0");
        session.start()?;

        let policy = PolicyCapture::default();
        session.attach_policy(Box::new(policy.clone()));
        session.announce_outputs();

        info!("Test fixture initialized with headless backend");
        Ok(Self {
            session,
            policy,
            clients: ClientManager::new(),
            error: None,
        })
    }

    pub fn session(&self) -> &Session<HeadlessBackend> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<HeadlessBackend> {
        &mut self.session
    }

    pub fn backend(&self) -> &HeadlessBackend {
        self.session.platform()
    }

    pub fn backend_mut(&mut self) -> &mut HeadlessBackend {
        self.session.platform_mut()
    }

    /// Dispatch every queued event.
    ///
    /// A dispatch error is kept for [`Fixture::take_error`].
    pub fn dispatch(&mut self) {
        if let Err(err) = self.session.pump() {
            warn!("dispatch failed: {err}");
            self.error = Some(err);
        }
    }

    pub fn take_error(&mut self) -> Option<SessionError> {
        self.error.take()
    }

    /// Queue `event` on the backend and dispatch it.
    pub fn send(&mut self, event: ProtocolEvent) {
        self.backend_mut().inject(event);
        self.dispatch();
    }

    /// Add a 60Hz virtual output with the given name and size
    pub fn add_output(&mut self, name: &str, width: i32, height: i32) -> OutputId {
        let id = self.backend_mut().add_output(name, width, height);
        self.dispatch();
        id
    }

    pub fn add_keyboard(&mut self) -> DeviceId {
        let id = self.backend_mut().add_keyboard();
        self.dispatch();
        id
    }

    pub fn add_pointer(&mut self) -> DeviceId {
        let id = self.backend_mut().add_pointer();
        self.dispatch();
        id
    }

    pub fn output_count(&self) -> usize {
        self.session.outputs().len()
    }

    pub fn commit_count(&self, output: OutputId) -> usize {
        self.backend().commit_count(output)
    }

    /// Run a frame on `output`.
    pub fn frame(&mut self, output: OutputId) {
        self.send(ProtocolEvent::OutputFrame { output });
    }

    /// Feed one request line from the policy process.
    pub fn policy_request(&mut self, line: &str) {
        self.session.handle_policy_line(line);
        self.dispatch();
    }

    /// Every line sent to the policy process so far
    pub fn policy_lines(&self) -> Vec<String> {
        self.policy.lines()
    }

    /// Lines sent to the policy process since the last call
    pub fn take_policy_lines(&mut self) -> Vec<String> {
        self.policy.take_lines()
    }

    pub fn add_client(&mut self) -> ClientId {
        self.clients.add_client()
    }

    pub fn get_client(&self, id: ClientId) -> Option<&TestClient> {
        self.clients.get_client(id)
    }

    pub fn surface_count(&self) -> usize {
        self.session.surfaces().len()
    }

    pub fn has_surface(&self, id: SurfaceId) -> bool {
        self.session.surfaces().contains(id)
    }

    /// Run `action` with `client` and the backend, then dispatch.
    fn with_client<T>(
        &mut self,
        client: ClientId,
        action: impl FnOnce(&mut TestClient, &mut HeadlessBackend) -> T,
    ) -> Option<T> {
        let test_client = self.clients.get_client_mut(client)?;
        let result = action(test_client, self.session.platform_mut());
        self.dispatch();
        Some(result)
    }

    /// Create a toplevel owned by `client`.
    ///
    /// # Panics
    ///
    /// If `client` was not added to this fixture.
    pub fn create_toplevel(&mut self, client: ClientId) -> SurfaceId {
        self.with_client(client, |c, backend| c.create_toplevel(backend))
            .unwrap_or_else(|| panic!("unknown test client {client:?}"))
    }

    /// Create a popup of `parent` owned by `client`.
    ///
    /// # Panics
    ///
    /// If `client` was not added to this fixture.
    pub fn create_popup(&mut self, client: ClientId, parent: SurfaceId) -> SurfaceId {
        self.with_client(client, |c, backend| c.create_popup(backend, parent))
            .unwrap_or_else(|| panic!("unknown test client {client:?}"))
    }

    pub fn map(&mut self, client: ClientId, surface: SurfaceId) {
        self.with_client(client, |c, backend| c.map(backend, surface));
    }

    pub fn unmap(&mut self, client: ClientId, surface: SurfaceId) {
        self.with_client(client, |c, backend| c.unmap(backend, surface));
    }

    pub fn commit(&mut self, client: ClientId, surface: SurfaceId, width: i32, height: i32) {
        self.with_client(client, |c, backend| {
            c.commit(backend, surface, width, height)
        });
    }

    pub fn request(&mut self, client: ClientId, surface: SurfaceId, request: ToplevelRequest) {
        self.with_client(client, |c, backend| c.request(backend, surface, request));
    }

    pub fn destroy(&mut self, client: ClientId, surface: SurfaceId) {
        self.with_client(client, |c, backend| c.destroy(backend, surface));
    }

    /// Create and map the desktop surface.
    pub fn add_desktop(&mut self, client: ClientId) -> SurfaceId {
        let desktop = self.create_toplevel(client);
        self.map(client, desktop);
        desktop
    }
}

#[cfg(test)]
mod tests {
    use smithay::utils::Point;

    use super::*;

    #[test]
    fn test_fixture_creation() {
        let fixture = Fixture::new();
        assert!(fixture.is_ok());
    }

    #[test]
    fn test_add_output() {
        let mut fixture = Fixture::new().unwrap();
        let output = fixture.add_output("test", 1920, 1080);
        assert_eq!(fixture.output_count(), 1);
        assert_eq!(
            fixture.take_policy_lines(),
            vec![format!("0 new_output OUTPUT {output}")]
        );
    }

    #[test]
    fn test_outputs_present_before_start_are_announced() {
        let mut backend = HeadlessBackend::new();
        let first = backend.add_output("test1", 1920, 1080);
        let second = backend.add_output("test2", 1280, 720);
        let mut fixture = Fixture::with_backend(backend, Config::default()).unwrap();

        assert_eq!(fixture.output_count(), 2);
        assert_eq!(
            fixture.take_policy_lines(),
            vec![
                format!("0 new_output OUTPUT {first}"),
                format!("1 new_output OUTPUT {second}"),
            ]
        );
    }

    #[test]
    fn test_output_layout_is_side_by_side() {
        let mut fixture = Fixture::new().unwrap();
        let first = fixture.add_output("test1", 1920, 1080);
        let second = fixture.add_output("test2", 1280, 720);
        let positions: Vec<_> = [first, second]
            .iter()
            .map(|id| fixture.session().outputs().get(*id).unwrap().position)
            .collect();
        assert_eq!(positions, vec![Point::from((0, 0)), Point::from((1920, 0))]);
    }

    #[test]
    fn test_frame_renders_enabled_output() {
        let mut fixture = Fixture::new().unwrap();
        let output = fixture.add_output("test", 1920, 1080);
        fixture.frame(output);
        fixture.frame(output);
        assert_eq!(fixture.backend().render_count(output), 2);
        assert_eq!(fixture.session().outputs().get(output).unwrap().frames, 2);
    }
}
