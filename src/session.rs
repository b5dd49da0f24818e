//! Session lifecycle and event dispatch
//!
//! A [`Session`] owns every piece of compositor state: the scene graph, the
//! surface registry, outputs, input devices, the handler table and the
//! policy bridge. It acquires its display-server resources in a fixed order
//! and always releases them in the reverse order, whether it stops normally
//! or fails half way through starting.

use smithay::input::keyboard::xkb;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::{Platform, PlatformError, Resource};
use crate::config::Config;
use crate::dispatch::{EventKind, Handler, HandlerTable, RoleLabel, Source};
use crate::event::{Event, Notification};
use crate::input::{self, InputRouter};
use crate::ipc::PolicyBridge;
use crate::output::OutputManager;
use crate::protocol::ProtocolEvent;
use crate::scene::{SceneError, SceneGraph};
use crate::surface::{SurfaceId, SurfaceRegistry};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("popup {surface} has no registered parent (parent: {parent:?})")]
    OrphanPopup {
        surface: SurfaceId,
        parent: Option<SurfaceId>,
    },
}

pub struct Session<P: Platform> {
    pub(crate) platform: P,
    pub(crate) config: Config,
    seat_name: String,
    /// Resources held, in acquisition order
    acquired: Vec<Resource>,
    running: bool,
    pub(crate) scene: SceneGraph,
    pub(crate) xkb_context: Option<xkb::Context>,
    pub(crate) surfaces: SurfaceRegistry,
    pub(crate) outputs: OutputManager,
    pub(crate) input: InputRouter,
    pub(crate) bridge: PolicyBridge,
    pub(crate) handlers: HandlerTable,
}

impl<P: Platform> Session<P> {
    pub fn new(platform: P, config: Config, seat_name: impl Into<String>) -> Self {
        Self {
            platform,
            config,
            seat_name: seat_name.into(),
            acquired: Vec::new(),
            running: false,
            scene: SceneGraph::new(),
            xkb_context: None,
            surfaces: SurfaceRegistry::new(),
            outputs: OutputManager::new(),
            input: InputRouter::default(),
            bridge: PolicyBridge::default(),
            handlers: HandlerTable::new(),
        }
    }

    /// Acquire every resource, subscribe the global handlers and start the backend.
    ///
    /// On failure everything acquired so far is released in reverse order
    /// before the error is returned.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.running {
            return Err(SessionError::AlreadyRunning);
        }
        info!(seat = %self.seat_name, "starting session");

        if let Err(err) = self.acquire_all() {
            error!(error = ?err, "Failed to start session: {err}");
            self.teardown();
            return Err(err);
        }
        self.running = true;
        info!(
            socket = self.platform.socket_name().as_deref().unwrap_or("none"),
            outputs = self.outputs.len(),
            "session running"
        );
        Ok(())
    }

    fn acquire_all(&mut self) -> Result<(), SessionError> {
        for resource in Resource::ACQUISITION_ORDER {
            self.platform.acquire(resource)?;
            self.acquired.push(resource);
            match resource {
                Resource::Scene => self.scene = SceneGraph::new(),
                Resource::KeymapContext => {
                    self.xkb_context = Some(xkb::Context::new(xkb::CONTEXT_NO_FLAGS));
                }
                _ => {}
            }
            debug!(%resource, "acquired");
        }

        self.subscribe_globals();
        self.platform.start()?;
        // Devices and outputs that were already present
        self.pump()
    }

    fn subscribe_globals(&mut self) {
        let globals = [
            (Source::Shell, EventKind::NewSurface, Handler::NewSurface),
            (Source::Backend, EventKind::NewInput, Handler::NewInput),
            (Source::Backend, EventKind::NewOutput, Handler::NewOutput),
            (Source::Cursor, EventKind::Motion, Handler::CursorMotion),
            (
                Source::Cursor,
                EventKind::MotionAbsolute,
                Handler::CursorMotionAbsolute,
            ),
            (Source::Cursor, EventKind::Button, Handler::CursorButton),
            (Source::Cursor, EventKind::Axis, Handler::CursorAxis),
            (Source::Cursor, EventKind::Frame, Handler::CursorFrame),
            (
                Source::Seat,
                EventKind::RequestSetCursor,
                Handler::RequestSetCursor,
            ),
            (
                Source::Seat,
                EventKind::RequestSetSelection,
                Handler::RequestSetSelection,
            ),
        ];
        for (source, kind, handler) in globals {
            self.handlers.subscribe(source, kind, handler);
        }
    }

    /// Release every resource in reverse acquisition order and reset all state.
    ///
    /// Does nothing if the session holds nothing.
    pub fn stop(&mut self) {
        if self.acquired.is_empty() && !self.running {
            return;
        }
        info!(seat = %self.seat_name, "stopping session");
        self.teardown();
    }

    fn teardown(&mut self) {
        while let Some(resource) = self.acquired.pop() {
            if resource.requires_finalization() {
                debug!(%resource, "finalizing");
            }
            self.platform.release(resource);
            if resource == Resource::KeymapContext {
                self.xkb_context = None;
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.running = false;
        self.scene = SceneGraph::new();
        self.surfaces.clear();
        self.outputs.clear();
        self.input = InputRouter::default();
        self.bridge = PolicyBridge::default();
        // Keyboards may still deliver a queued event after teardown; their
        // handlers check for it and unsubscribe themselves.
        self.handlers
            .retain(|source, _| matches!(source, Source::Keyboard(_)));
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_acquired(&self, resource: Resource) -> bool {
        self.acquired.contains(&resource)
    }

    /// Resources currently held, in acquisition order
    pub fn acquired(&self) -> &[Resource] {
        &self.acquired
    }

    pub fn seat_name(&self) -> &str {
        &self.seat_name
    }

    pub fn socket_name(&self) -> Option<String> {
        self.platform.socket_name()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    pub fn outputs(&self) -> &OutputManager {
        &self.outputs
    }

    pub fn input(&self) -> &InputRouter {
        &self.input
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn bridge(&self) -> &PolicyBridge {
        &self.bridge
    }

    /// Start sending notifications to `channel`.
    pub fn attach_policy(&mut self, channel: Box<dyn std::io::Write>) {
        info!("policy process attached");
        self.bridge.attach(channel);
    }

    pub fn detach_policy(&mut self) {
        if self.bridge.detach().is_some() {
            info!("policy process detached");
        }
    }

    pub(crate) fn notify(&mut self, event: Event, role: &str, address: u64) -> Option<Notification> {
        self.bridge.notify(event, role, address)
    }

    /// Dispatch every event the platform has queued, including events queued
    /// while dispatching.
    pub fn pump(&mut self) -> Result<(), SessionError> {
        loop {
            let events = self.platform.take_events();
            if events.is_empty() {
                return Ok(());
            }
            for event in events {
                self.dispatch(event)?;
            }
        }
    }

    /// Route one protocol event to the handler subscribed for its source.
    ///
    /// Events from sources nobody subscribed to are dropped. An error means
    /// the session state can no longer be trusted and should be torn down.
    pub fn dispatch(&mut self, event: ProtocolEvent) -> Result<(), SessionError> {
        let (source, kind) = event.route();
        let Some(handler) = self.handlers.lookup(source, kind) else {
            debug!(?source, ?kind, "no handler subscribed, dropping event");
            return Ok(());
        };

        match (handler, event) {
            (Handler::NewSurface, ProtocolEvent::NewSurface { surface, role, parent }) => {
                self.handle_new_surface(surface, role, parent)?
            }
            (Handler::SurfaceDestroy, ProtocolEvent::SurfaceDestroy { surface }) => {
                self.handle_surface_destroy(surface)?
            }
            (Handler::SurfaceMap, ProtocolEvent::SurfaceMap { surface }) => {
                self.handle_surface_map(surface)?
            }
            (Handler::SurfaceUnmap, ProtocolEvent::SurfaceUnmap { surface }) => {
                self.handle_surface_unmap(surface)
            }
            (Handler::SurfaceCommit, ProtocolEvent::SurfaceCommit { surface, size }) => {
                self.handle_surface_commit(surface, size)?
            }
            (Handler::Notify { event, role }, protocol_event) => {
                self.forward_notification(event, role, source, &protocol_event)
            }
            (Handler::NewInput, ProtocolEvent::NewInput { device, device_type }) => {
                input::handle_new_input(self, device, device_type)
            }
            (Handler::NewOutput, ProtocolEvent::NewOutput { output, name, modes }) => {
                self.handle_new_output(output, name, modes)
            }
            (Handler::OutputFrame, ProtocolEvent::OutputFrame { output }) => {
                self.handle_output_frame(output)
            }
            (
                Handler::CursorMotion,
                ProtocolEvent::PointerMotion {
                    device,
                    time_msec,
                    delta,
                },
            ) => {
                input::handle_pointer_motion(self, device, time_msec, delta);
            }
            (
                Handler::CursorMotionAbsolute,
                ProtocolEvent::PointerMotionAbsolute {
                    device,
                    time_msec,
                    x,
                    y,
                },
            ) => {
                input::handle_pointer_motion_absolute(self, device, time_msec, x, y);
            }
            (
                Handler::CursorButton,
                ProtocolEvent::PointerButton {
                    time_msec,
                    button,
                    state,
                    ..
                },
            ) => input::handle_pointer_button(self, time_msec, button, state),
            (Handler::CursorAxis, ProtocolEvent::PointerAxis(event)) => {
                input::handle_pointer_axis(self, event)
            }
            (Handler::CursorFrame, ProtocolEvent::PointerFrame) => input::handle_pointer_frame(self),
            (
                Handler::KeyboardModifiers,
                ProtocolEvent::KeyboardModifiers {
                    keyboard,
                    modifiers,
                },
            ) => input::handle_keyboard_modifiers(self, keyboard, modifiers),
            (Handler::KeyboardKey, ProtocolEvent::KeyboardKey { keyboard, event }) => {
                input::handle_keyboard_key(self, keyboard, event)
            }
            (Handler::RequestSetCursor, ProtocolEvent::RequestSetCursor { surface, hotspot }) => {
                input::handle_request_set_cursor(self, surface, hotspot)
            }
            (
                Handler::RequestSetSelection,
                ProtocolEvent::RequestSetSelection { source, serial },
            ) => input::handle_request_set_selection(self, source, serial),
            (handler, event) => {
                warn!(?handler, ?event, "handler does not accept this event");
            }
        }
        Ok(())
    }

    /// Forward a surface event to the policy process.
    fn forward_notification(
        &mut self,
        event: Event,
        label: RoleLabel,
        source: Source,
        protocol_event: &ProtocolEvent,
    ) {
        let Source::Surface(surface) = source else {
            warn!(?source, ?event, "notification from a non-surface source");
            return;
        };
        let role = match label {
            RoleLabel::Toplevel => "TOPLEVEL".to_string(),
            RoleLabel::Popup => "POPUP".to_string(),
            RoleLabel::OfSurface => match self.surfaces.get(surface) {
                Some(record) => record.role.name().to_string(),
                None => return,
            },
        };
        debug!(%surface, ?protocol_event, "forwarding {event}");
        self.notify(event, &role, surface.0);
    }
}

impl<P: Platform> Drop for Session<P> {
    fn drop(&mut self) {
        self.stop();
    }
}
