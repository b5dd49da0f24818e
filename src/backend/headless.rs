//! Headless backend for testing
//!
//! This module provides a platform that doesn't require a GPU, DRM access or a
//! running display server, allowing the session to run in CI environments and
//! under integration tests.
//!
//! # Design Invariants
//!
//! 1. **No hardware access**: nothing is rendered and no socket is bound. Every
//!    request the session makes is recorded so tests can assert on it.
//!
//! 2. **Deterministic output**: virtual outputs have fixed modes, ids are
//!    allocated sequentially and outputs are laid out left to right, enabling
//!    reproducible tests.
//!
//! 3. **Event simulation**: devices, outputs and client events are injected
//!    programmatically and delivered through [`Platform::take_events`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use smithay::backend::input::ButtonState;
use smithay::input::keyboard::xkb;
use smithay::utils::{Logical, Physical, Point, Size};
use tracing::{debug, info};

use super::{Platform, PlatformError, Resource, SeatCapabilities};
use crate::config::Config;
use crate::cursor::{CursorImage, CursorTheme};
use crate::output::{OutputId, OutputMode};
use crate::protocol::{
    AxisEvent, DeviceId, InputDeviceType, KeyEvent, Modifiers, ProtocolEvent, SelectionSource,
};
use crate::scene::SceneGraph;
use crate::surface::SurfaceId;

const DEFAULT_SOCKET: &str = "wayland-1";
const FIRST_ID: u64 = 0x1000;
const ID_STRIDE: u64 = 0x10;

/// A virtual output for headless testing
#[derive(Debug, Clone)]
pub struct VirtualOutput {
    pub id: OutputId,
    pub name: String,
    pub modes: Vec<OutputMode>,
    pub mode: Option<OutputMode>,
    pub enabled: bool,
    pub render_ready: bool,
    /// Layout position, `None` until the output is added to the layout
    pub position: Option<Point<i32, Logical>>,
    pub size: Size<i32, Logical>,
    /// Count of commits on this output (for assertions)
    pub commit_count: usize,
    /// Count of scene renders on this output (for assertions)
    pub render_count: usize,
    pub frames_done: usize,
    pub last_frame_time: Option<Duration>,
}

/// Seat traffic recorded by the headless backend
#[derive(Debug, Clone, PartialEq)]
pub enum SeatEvent {
    PointerEnter {
        surface: SurfaceId,
        local: Point<f64, Logical>,
    },
    PointerMotion {
        time_msec: u32,
        local: Point<f64, Logical>,
    },
    PointerClearFocus,
    PointerButton {
        time_msec: u32,
        button: u32,
        state: ButtonState,
    },
    PointerAxis(AxisEvent),
    PointerFrame,
    SetKeyboard(DeviceId),
    KeyboardModifiers(Modifiers),
    KeyboardKey(KeyEvent),
    KeyboardEnter {
        surface: SurfaceId,
        keyboard: DeviceId,
    },
    Selection {
        source: Option<SelectionSource>,
        serial: u32,
    },
}

/// State a shell surface was configured with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigureEvent {
    pub size: Option<Size<i32, Logical>>,
    pub maximized: bool,
    pub activated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ShellSurfaceState {
    pub current: ConfigureEvent,
    /// Every configure sent, oldest first
    pub configures: Vec<ConfigureEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardState {
    pub keymap_loaded: bool,
    pub repeat_info: Option<(i32, i32)>,
}

/// Headless platform state for testing without real hardware
#[derive(Debug)]
pub struct HeadlessBackend {
    socket_name: String,
    cursor_theme: CursorTheme,
    held: Vec<Resource>,
    acquired_log: Vec<Resource>,
    released_log: Vec<Resource>,
    finalized_log: Vec<Resource>,
    fail_on: Option<Resource>,
    started: bool,
    next_id: u64,
    /// Devices and outputs present before the backend starts
    present: Vec<ProtocolEvent>,
    pending: VecDeque<ProtocolEvent>,
    /// Virtual outputs indexed by id
    pub outputs: BTreeMap<OutputId, VirtualOutput>,
    cursor: Point<f64, Logical>,
    cursor_devices: Vec<DeviceId>,
    cursor_image: CursorImage,
    idle_activity: usize,
    capabilities: SeatCapabilities,
    seat_events: Vec<SeatEvent>,
    pointer_focus: Option<SurfaceId>,
    keyboard_focus: Option<SurfaceId>,
    active_keyboard: Option<DeviceId>,
    keyboards: HashMap<DeviceId, KeyboardState>,
    surfaces: HashMap<SurfaceId, ShellSurfaceState>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// Create a new headless backend with no devices and no outputs
    pub fn new() -> Self {
        Self {
            socket_name: DEFAULT_SOCKET.to_string(),
            cursor_theme: CursorTheme {
                name: None,
                size: 24,
            },
            held: Vec::new(),
            acquired_log: Vec::new(),
            released_log: Vec::new(),
            finalized_log: Vec::new(),
            fail_on: None,
            started: false,
            next_id: FIRST_ID,
            present: Vec::new(),
            pending: VecDeque::new(),
            outputs: BTreeMap::new(),
            cursor: Point::default(),
            cursor_devices: Vec::new(),
            cursor_image: CursorImage::default(),
            idle_activity: 0,
            capabilities: SeatCapabilities::empty(),
            seat_events: Vec::new(),
            pointer_focus: None,
            keyboard_focus: None,
            active_keyboard: None,
            keyboards: HashMap::new(),
            surfaces: HashMap::new(),
        }
    }

    /// Create a backend with the socket, cursor theme and virtual outputs from `config`
    pub fn from_config(config: &Config) -> Self {
        let mut backend = Self::new();
        if let Some(socket) = &config.socket {
            backend.socket_name = socket.clone();
        }
        backend.cursor_theme = CursorTheme {
            name: config.cursor_theme.clone(),
            size: config.cursor_size,
        };
        for output in &config.headless_outputs {
            backend.add_output_with_refresh(&output.name, output.width, output.height, output.refresh);
        }
        backend
    }

    /// Make acquisition of `resource` fail (for startup failure tests)
    pub fn fail_on(&mut self, resource: Resource) {
        self.fail_on = Some(resource);
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += ID_STRIDE;
        id
    }

    fn announce(&mut self, event: ProtocolEvent) {
        if self.started {
            self.pending.push_back(event.clone());
        }
        self.present.push(event);
    }

    /// Add a 60Hz virtual output with the given name and size
    pub fn add_output(&mut self, name: &str, width: i32, height: i32) -> OutputId {
        self.add_output_with_refresh(name, width, height, 60_000)
    }

    pub fn add_output_with_refresh(
        &mut self,
        name: &str,
        width: i32,
        height: i32,
        refresh: i32,
    ) -> OutputId {
        let id = OutputId(self.alloc_id());
        let modes = vec![OutputMode {
            size: Size::<i32, Physical>::from((width, height)),
            refresh,
            preferred: true,
        }];
        self.outputs.insert(
            id,
            VirtualOutput {
                id,
                name: name.to_string(),
                modes: modes.clone(),
                mode: None,
                enabled: false,
                render_ready: false,
                position: None,
                size: Size::default(),
                commit_count: 0,
                render_count: 0,
                frames_done: 0,
                last_frame_time: None,
            },
        );
        info!("Added virtual output: {} ({}x{})", name, width, height);
        self.announce(ProtocolEvent::NewOutput {
            output: id,
            name: name.to_string(),
            modes,
        });
        id
    }

    /// Plug in an input device of the given type
    pub fn add_input_device(&mut self, device_type: InputDeviceType) -> DeviceId {
        let device = DeviceId(self.alloc_id());
        debug!(%device, ?device_type, "Added virtual input device");
        self.announce(ProtocolEvent::NewInput {
            device,
            device_type,
        });
        device
    }

    pub fn add_keyboard(&mut self) -> DeviceId {
        self.add_input_device(InputDeviceType::Keyboard)
    }

    pub fn add_pointer(&mut self) -> DeviceId {
        self.add_input_device(InputDeviceType::Pointer)
    }

    /// Allocate an id for a client surface
    pub fn alloc_surface_id(&mut self) -> SurfaceId {
        SurfaceId(self.alloc_id())
    }

    /// Queue an arbitrary protocol event
    pub fn inject(&mut self, event: ProtocolEvent) {
        self.pending.push_back(event);
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_held(&self, resource: Resource) -> bool {
        self.held.contains(&resource)
    }

    /// Every successful acquisition, in order, across restarts
    pub fn acquired(&self) -> &[Resource] {
        &self.acquired_log
    }

    /// Every release, in order, across restarts
    pub fn released(&self) -> &[Resource] {
        &self.released_log
    }

    /// Releases that went through explicit finalization
    pub fn finalized(&self) -> &[Resource] {
        &self.finalized_log
    }

    pub fn clear_logs(&mut self) {
        self.acquired_log.clear();
        self.released_log.clear();
        self.finalized_log.clear();
    }

    pub fn cursor_theme(&self) -> &CursorTheme {
        &self.cursor_theme
    }

    pub fn output(&self, id: OutputId) -> Option<&VirtualOutput> {
        self.outputs.get(&id)
    }

    /// Get commit count for an output (for test assertions)
    pub fn commit_count(&self, id: OutputId) -> usize {
        self.outputs.get(&id).map(|o| o.commit_count).unwrap_or(0)
    }

    /// Get render count for an output (for test assertions)
    pub fn render_count(&self, id: OutputId) -> usize {
        self.outputs.get(&id).map(|o| o.render_count).unwrap_or(0)
    }

    pub fn cursor_image(&self) -> &CursorImage {
        &self.cursor_image
    }

    pub fn cursor_devices(&self) -> &[DeviceId] {
        &self.cursor_devices
    }

    pub fn idle_activity(&self) -> usize {
        self.idle_activity
    }

    pub fn capabilities(&self) -> SeatCapabilities {
        self.capabilities
    }

    pub fn seat_events(&self) -> &[SeatEvent] {
        &self.seat_events
    }

    pub fn take_seat_events(&mut self) -> Vec<SeatEvent> {
        std::mem::take(&mut self.seat_events)
    }

    pub fn pointer_focus(&self) -> Option<SurfaceId> {
        self.pointer_focus
    }

    pub fn keyboard_focus(&self) -> Option<SurfaceId> {
        self.keyboard_focus
    }

    pub fn active_keyboard(&self) -> Option<DeviceId> {
        self.active_keyboard
    }

    pub fn keyboard_state(&self, keyboard: DeviceId) -> Option<&KeyboardState> {
        self.keyboards.get(&keyboard)
    }

    pub fn surface_state(&self, surface: SurfaceId) -> Option<&ShellSurfaceState> {
        self.surfaces.get(&surface)
    }

    fn configure(&mut self, surface: SurfaceId, apply: impl FnOnce(&mut ConfigureEvent)) {
        let state = self.surfaces.entry(surface).or_default();
        apply(&mut state.current);
        state.configures.push(state.current.clone());
    }

    /// Outputs currently in the layout as (position, size)
    fn layout(&self) -> impl Iterator<Item = (Point<i32, Logical>, Size<i32, Logical>)> + '_ {
        self.outputs
            .values()
            .filter_map(|o| o.position.map(|position| (position, o.size)))
            .filter(|(_, size)| size.w > 0 && size.h > 0)
    }

    /// Closest point to `point` lying on an output in the layout
    fn clamp_to_layout(&self, point: Point<f64, Logical>) -> Point<f64, Logical> {
        let mut best = point;
        let mut best_distance = f64::INFINITY;
        for (position, size) in self.layout() {
            let min_x = f64::from(position.x);
            let min_y = f64::from(position.y);
            let x = point.x.clamp(min_x, min_x + f64::from(size.w - 1));
            let y = point.y.clamp(min_y, min_y + f64::from(size.h - 1));
            let distance = (x - point.x).powi(2) + (y - point.y).powi(2);
            if distance < best_distance {
                best = Point::from((x, y));
                best_distance = distance;
            }
        }
        best
    }
}

impl Platform for HeadlessBackend {
    fn acquire(&mut self, resource: Resource) -> Result<(), PlatformError> {
        if self.fail_on == Some(resource) {
            return Err(PlatformError::Acquire {
                resource,
                reason: "injected failure".to_string(),
            });
        }
        self.held.push(resource);
        self.acquired_log.push(resource);
        Ok(())
    }

    fn release(&mut self, resource: Resource) {
        self.held.retain(|r| *r != resource);
        self.released_log.push(resource);
        if resource.requires_finalization() {
            self.finalized_log.push(resource);
        }
        match resource {
            Resource::Backend => {
                self.started = false;
                self.pending.clear();
                for output in self.outputs.values_mut() {
                    output.enabled = false;
                    output.render_ready = false;
                    output.mode = None;
                }
            }
            Resource::OutputLayout => {
                for output in self.outputs.values_mut() {
                    output.position = None;
                }
            }
            Resource::Cursor => {
                self.cursor = Point::default();
                self.cursor_devices.clear();
                self.cursor_image = CursorImage::default();
            }
            Resource::Seat => {
                self.capabilities = SeatCapabilities::empty();
                self.pointer_focus = None;
                self.keyboard_focus = None;
                self.active_keyboard = None;
                self.keyboards.clear();
            }
            Resource::XdgShell => self.surfaces.clear(),
            _ => {}
        }
    }

    fn start(&mut self) -> Result<(), PlatformError> {
        if !self.is_held(Resource::Backend) {
            return Err(PlatformError::Start("backend was not acquired".to_string()));
        }
        self.started = true;
        self.pending.extend(self.present.iter().cloned());
        info!(
            outputs = self.outputs.len(),
            "Headless backend started"
        );
        Ok(())
    }

    fn socket_name(&self) -> Option<String> {
        self.is_held(Resource::Socket)
            .then(|| self.socket_name.clone())
    }

    fn take_events(&mut self) -> Vec<ProtocolEvent> {
        self.pending.drain(..).collect()
    }

    fn output_init_render(&mut self, output: OutputId) -> Result<(), PlatformError> {
        let virtual_output = self
            .outputs
            .get_mut(&output)
            .ok_or(PlatformError::UnknownOutput(output))?;
        virtual_output.render_ready = true;
        Ok(())
    }

    fn output_set_mode(&mut self, output: OutputId, mode: Option<OutputMode>) {
        if let Some(virtual_output) = self.outputs.get_mut(&output) {
            virtual_output.mode = mode;
        }
    }

    fn output_enable(&mut self, output: OutputId, enabled: bool) {
        if let Some(virtual_output) = self.outputs.get_mut(&output) {
            virtual_output.enabled = enabled;
        }
    }

    fn output_commit(&mut self, output: OutputId) -> bool {
        match self.outputs.get_mut(&output) {
            Some(virtual_output) => {
                virtual_output.commit_count += 1;
                true
            }
            None => false,
        }
    }

    fn layout_add_auto(&mut self, output: OutputId, size: Size<i32, Logical>) -> Point<i32, Logical> {
        let x = self
            .layout()
            .map(|(position, size)| position.x + size.w)
            .max()
            .unwrap_or(0);
        let position = Point::from((x, 0));
        self.layout_add(output, position, size);
        position
    }

    fn layout_add(&mut self, output: OutputId, position: Point<i32, Logical>, size: Size<i32, Logical>) {
        if let Some(virtual_output) = self.outputs.get_mut(&output) {
            virtual_output.position = Some(position);
            virtual_output.size = size;
        }
    }

    fn render_scene_output(&mut self, output: OutputId, _scene: &SceneGraph) {
        if let Some(virtual_output) = self.outputs.get_mut(&output) {
            virtual_output.render_count += 1;
            debug!(
                "Headless render #{} for output {}",
                virtual_output.render_count, virtual_output.name
            );
        }
    }

    fn send_frame_done(&mut self, output: OutputId, time: Duration) {
        if let Some(virtual_output) = self.outputs.get_mut(&output) {
            virtual_output.frames_done += 1;
            virtual_output.last_frame_time = Some(time);
        }
    }

    fn cursor_attach_device(&mut self, device: DeviceId) {
        self.cursor_devices.push(device);
    }

    fn cursor_move(&mut self, _device: DeviceId, delta: Point<f64, Logical>) {
        self.cursor = self.clamp_to_layout(self.cursor + delta);
    }

    fn cursor_warp_absolute(&mut self, _device: DeviceId, x: f64, y: f64) {
        let mut layout = self.layout();
        let Some(first) = layout.next() else {
            return;
        };
        let (min, max) = layout.fold(
            (first.0, first.0 + Point::from((first.1.w, first.1.h))),
            |(min, max), (position, size)| {
                (
                    Point::from((min.x.min(position.x), min.y.min(position.y))),
                    Point::from((
                        max.x.max(position.x + size.w),
                        max.y.max(position.y + size.h),
                    )),
                )
            },
        );
        let target = Point::from((
            f64::from(min.x) + x * f64::from(max.x - min.x),
            f64::from(min.y) + y * f64::from(max.y - min.y),
        ));
        self.cursor = self.clamp_to_layout(target);
    }

    fn cursor_position(&self) -> Point<f64, Logical> {
        self.cursor
    }

    fn set_cursor_image(&mut self, image: CursorImage) {
        self.cursor_image = image;
    }

    fn notify_activity(&mut self) {
        self.idle_activity += 1;
    }

    fn seat_set_capabilities(&mut self, capabilities: SeatCapabilities) {
        self.capabilities = capabilities;
    }

    fn pointer_notify_enter(&mut self, surface: SurfaceId, local: Point<f64, Logical>) {
        self.pointer_focus = Some(surface);
        self.seat_events.push(SeatEvent::PointerEnter { surface, local });
    }

    fn pointer_notify_motion(&mut self, time_msec: u32, local: Point<f64, Logical>) {
        self.seat_events
            .push(SeatEvent::PointerMotion { time_msec, local });
    }

    fn pointer_clear_focus(&mut self) {
        self.pointer_focus = None;
        self.seat_events.push(SeatEvent::PointerClearFocus);
    }

    fn pointer_notify_button(&mut self, time_msec: u32, button: u32, state: ButtonState) {
        self.seat_events.push(SeatEvent::PointerButton {
            time_msec,
            button,
            state,
        });
    }

    fn pointer_notify_axis(&mut self, event: AxisEvent) {
        self.seat_events.push(SeatEvent::PointerAxis(event));
    }

    fn pointer_notify_frame(&mut self) {
        self.seat_events.push(SeatEvent::PointerFrame);
    }

    fn seat_set_keyboard(&mut self, keyboard: DeviceId) {
        self.active_keyboard = Some(keyboard);
        self.seat_events.push(SeatEvent::SetKeyboard(keyboard));
    }

    fn keyboard_notify_modifiers(&mut self, modifiers: Modifiers) {
        self.seat_events
            .push(SeatEvent::KeyboardModifiers(modifiers));
    }

    fn keyboard_notify_key(&mut self, event: KeyEvent) {
        self.seat_events.push(SeatEvent::KeyboardKey(event));
    }

    fn keyboard_notify_enter(&mut self, surface: SurfaceId, keyboard: DeviceId) {
        self.keyboard_focus = Some(surface);
        self.seat_events
            .push(SeatEvent::KeyboardEnter { surface, keyboard });
    }

    fn seat_set_selection(&mut self, source: Option<SelectionSource>, serial: u32) {
        self.seat_events
            .push(SeatEvent::Selection { source, serial });
    }

    fn keyboard_set_keymap(&mut self, keyboard: DeviceId, keymap: Option<&xkb::Keymap>) {
        self.keyboards.entry(keyboard).or_default().keymap_loaded = keymap.is_some();
    }

    fn keyboard_set_repeat_info(&mut self, keyboard: DeviceId, rate: i32, delay: i32) {
        self.keyboards.entry(keyboard).or_default().repeat_info = Some((rate, delay));
    }

    fn surface_set_size(&mut self, surface: SurfaceId, size: Size<i32, Logical>) {
        self.configure(surface, |state| state.size = Some(size));
    }

    fn surface_set_maximized(&mut self, surface: SurfaceId, maximized: bool) {
        self.configure(surface, |state| state.maximized = maximized);
    }

    fn surface_set_activated(&mut self, surface: SurfaceId, activated: bool) {
        self.configure(surface, |state| state.activated = activated);
    }
}
