//! Input routing
//!
//! Pointer motion is resolved against the scene graph to find the surface
//! under the cursor and translated into enter / motion / leave notifications
//! on the seat. Buttons, axis and frame events follow the seat's pointer
//! focus; keyboard events go to the seat's keyboard focus, which the policy
//! process controls.

use smithay::backend::input::ButtonState;
use smithay::input::keyboard::xkb;
use smithay::utils::{Logical, Point};
use tracing::{debug, trace, warn};

use crate::backend::{Platform, Resource, SeatCapabilities};
use crate::cursor::CursorImage;
use crate::dispatch::{EventKind, Handler, Source};
use crate::protocol::{AxisEvent, DeviceId, InputDeviceType, KeyEvent, Modifiers, SelectionSource};
use crate::session::Session;
use crate::surface::SurfaceId;

/// Input devices and pointer focus owned by the session
#[derive(Debug, Default)]
pub struct InputRouter {
    /// Surface the pointer was over after the last motion event
    pub pointed_surface: Option<SurfaceId>,
    /// Keyboards in the order they were plugged in
    pub keyboards: Vec<DeviceId>,
    pub pointers: Vec<DeviceId>,
}

impl InputRouter {
    /// Keyboard used when the policy process moves keyboard focus
    pub fn default_keyboard(&self) -> Option<DeviceId> {
        self.keyboards.first().copied()
    }

    /// Seat capabilities matching the devices currently present
    pub fn capabilities(&self) -> SeatCapabilities {
        let mut capabilities = SeatCapabilities::empty();
        if !self.pointers.is_empty() {
            capabilities |= SeatCapabilities::POINTER;
        }
        if !self.keyboards.is_empty() {
            capabilities |= SeatCapabilities::KEYBOARD;
        }
        capabilities
    }
}

/// Pointer focus change caused by a motion event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerFocus {
    /// Still over the same surface
    Motion(SurfaceId, Point<f64, Logical>),
    /// Entered a different surface
    Enter(SurfaceId, Point<f64, Logical>),
    /// Left the last surface for empty space
    Leave,
    /// Moved over empty space
    None,
}

pub(crate) fn handle_new_input<P: Platform>(
    session: &mut Session<P>,
    device: DeviceId,
    device_type: InputDeviceType,
) {
    match device_type {
        InputDeviceType::Pointer => {
            debug!(%device, "new pointer");
            session.platform.cursor_attach_device(device);
            session.input.pointers.push(device);
        }
        InputDeviceType::Keyboard => {
            debug!(%device, "new keyboard");
            let keyboard = &session.config.keyboard;
            let keymap = session.xkb_context.as_ref().and_then(|context| {
                xkb::Keymap::new_from_names(
                    context,
                    &keyboard.rules,
                    &keyboard.model,
                    &keyboard.layout,
                    &keyboard.variant,
                    keyboard.options.clone(),
                    xkb::KEYMAP_COMPILE_NO_FLAGS,
                )
            });
            if keymap.is_none() {
                warn!(%device, "failed to compile keymap, keyboard keeps its default");
            }
            let (rate, delay) = (keyboard.repeat_rate, keyboard.repeat_delay);
            session.platform.keyboard_set_keymap(device, keymap.as_ref());
            session.platform.keyboard_set_repeat_info(device, rate, delay);

            let source = Source::Keyboard(device);
            session
                .handlers
                .subscribe(source, EventKind::Modifiers, Handler::KeyboardModifiers);
            session
                .handlers
                .subscribe(source, EventKind::Key, Handler::KeyboardKey);
            session.input.keyboards.push(device);
        }
        other => warn!(%device, "unknown input device type: {other:?}"),
    }

    let capabilities = session.input.capabilities();
    session.platform.seat_set_capabilities(capabilities);
}

pub(crate) fn handle_pointer_motion<P: Platform>(
    session: &mut Session<P>,
    device: DeviceId,
    time_msec: u32,
    delta: Point<f64, Logical>,
) -> PointerFocus {
    session.platform.cursor_move(device, delta);
    session.platform.notify_activity();
    process_cursor_motion(session, time_msec)
}

pub(crate) fn handle_pointer_motion_absolute<P: Platform>(
    session: &mut Session<P>,
    device: DeviceId,
    time_msec: u32,
    x: f64,
    y: f64,
) -> PointerFocus {
    session.platform.cursor_warp_absolute(device, x, y);
    session.platform.notify_activity();
    process_cursor_motion(session, time_msec)
}

/// Find the surface under the cursor and move pointer focus accordingly.
pub fn process_cursor_motion<P: Platform>(session: &mut Session<P>, time_msec: u32) -> PointerFocus {
    let position = session.platform.cursor_position();
    let under = surface_at(session, position);

    let focus = match (under, session.input.pointed_surface) {
        (Some((surface, local)), Some(previous)) if surface == previous => {
            session.platform.pointer_notify_motion(time_msec, local);
            PointerFocus::Motion(surface, local)
        }
        (Some((surface, local)), _) => {
            session.platform.pointer_notify_enter(surface, local);
            PointerFocus::Enter(surface, local)
        }
        (None, Some(_)) => {
            session.platform.pointer_clear_focus();
            PointerFocus::Leave
        }
        (None, None) => PointerFocus::None,
    };

    if under.is_none() {
        session.platform.set_cursor_image(CursorImage::default_pointer());
    }
    session.input.pointed_surface = under.map(|(surface, _)| surface);
    trace!(?position, ?focus, "cursor motion");
    focus
}

/// Surface whose buffer is topmost at `position`, with surface-local coordinates
pub fn surface_at<P: Platform>(
    session: &Session<P>,
    position: Point<f64, Logical>,
) -> Option<(SurfaceId, Point<f64, Logical>)> {
    let hit = session.scene.node_at(position)?;
    let surface = session.scene.surface(hit.node).ok().flatten()?;
    Some((surface, hit.local))
}

pub(crate) fn handle_pointer_button<P: Platform>(
    session: &mut Session<P>,
    time_msec: u32,
    button: u32,
    state: ButtonState,
) {
    debug!(button, ?state, "pointer button");
    session.platform.notify_activity();
    session
        .platform
        .pointer_notify_button(time_msec, button, state);
}

pub(crate) fn handle_pointer_axis<P: Platform>(session: &mut Session<P>, event: AxisEvent) {
    session.platform.pointer_notify_axis(event);
}

pub(crate) fn handle_pointer_frame<P: Platform>(session: &mut Session<P>) {
    session.platform.pointer_notify_frame();
}

pub(crate) fn handle_keyboard_modifiers<P: Platform>(
    session: &mut Session<P>,
    keyboard: DeviceId,
    modifiers: Modifiers,
) {
    if !session.is_acquired(Resource::Seat) {
        debug!(%keyboard, "seat is gone, dropping modifiers");
        session
            .handlers
            .unsubscribe(Source::Keyboard(keyboard), EventKind::Modifiers);
        return;
    }
    session.platform.seat_set_keyboard(keyboard);
    session.platform.keyboard_notify_modifiers(modifiers);
}

pub(crate) fn handle_keyboard_key<P: Platform>(
    session: &mut Session<P>,
    keyboard: DeviceId,
    event: KeyEvent,
) {
    if !session.is_acquired(Resource::IdleNotifier) {
        debug!(%keyboard, "idle tracker is gone, unsubscribing key handler");
        session
            .handlers
            .unsubscribe(Source::Keyboard(keyboard), EventKind::Key);
        return;
    }
    debug!(keycode = event.keycode, state = ?event.state, "key");
    session.platform.notify_activity();
    session.platform.seat_set_keyboard(keyboard);
    session.platform.keyboard_notify_key(event);
}

pub(crate) fn handle_request_set_cursor<P: Platform>(
    session: &mut Session<P>,
    surface: Option<SurfaceId>,
    hotspot: Point<i32, Logical>,
) {
    let image = match surface {
        Some(surface) => CursorImage::Surface { surface, hotspot },
        None => CursorImage::Hidden,
    };
    session.platform.set_cursor_image(image);
}

pub(crate) fn handle_request_set_selection<P: Platform>(
    session: &mut Session<P>,
    source: Option<SelectionSource>,
    serial: u32,
) {
    session.platform.seat_set_selection(source, serial);
}

/// Give `surface` keyboard focus with the default keyboard.
pub fn focus_surface<P: Platform>(session: &mut Session<P>, surface: SurfaceId) {
    match session.input.default_keyboard() {
        Some(keyboard) => session.platform.keyboard_notify_enter(surface, keyboard),
        None => warn!(%surface, "no keyboard plugged in, keyboard focus unchanged"),
    }
}
