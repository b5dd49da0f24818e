//! Focus tracking tests
//!
//! Tests for pointer focus from hit testing, keyboard focus moved by the
//! policy process, and delivery of key events.

use pwm_core::backend::headless::SeatEvent;
use pwm_core::backend::SeatCapabilities;
use pwm_core::cursor::CursorImage;
use pwm_core::dispatch::{EventKind, Source};
use pwm_core::protocol::{DeviceId, KeyEvent, Modifiers, ProtocolEvent};
use pwm_core::testing::Fixture;
use smithay::backend::input::{ButtonState, KeyState};
use smithay::utils::Point;

fn motion(device: DeviceId, dx: f64, dy: f64) -> ProtocolEvent {
    ProtocolEvent::PointerMotion {
        device,
        time_msec: 0,
        delta: Point::from((dx, dy)),
    }
}

fn key(keyboard: DeviceId, keycode: u32) -> ProtocolEvent {
    ProtocolEvent::KeyboardKey {
        keyboard,
        event: KeyEvent {
            time_msec: 0,
            keycode,
            state: KeyState::Pressed,
        },
    }
}

/// Test initial focus state
#[test]
fn test_initial_focus_state() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    fixture.add_output("Virtual-1", 1920, 1080);

    assert_eq!(fixture.backend().pointer_focus(), None);
    assert_eq!(fixture.backend().keyboard_focus(), None);
    assert_eq!(fixture.session().input().pointed_surface, None);
    assert_eq!(fixture.backend().capabilities(), SeatCapabilities::empty());
}

/// Devices set the seat capabilities and keyboards get their repeat settings
#[test]
fn test_devices_configure_seat() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    let pointer = fixture.add_pointer();
    assert_eq!(fixture.backend().capabilities(), SeatCapabilities::POINTER);
    assert_eq!(fixture.backend().cursor_devices(), &[pointer]);

    let keyboard = fixture.add_keyboard();
    assert_eq!(
        fixture.backend().capabilities(),
        SeatCapabilities::POINTER | SeatCapabilities::KEYBOARD
    );
    let state = fixture.backend().keyboard_state(keyboard).unwrap();
    assert_eq!(state.repeat_info, Some((25, 600)));
    assert!(fixture
        .session()
        .handlers()
        .is_subscribed(Source::Keyboard(keyboard), EventKind::Key));
}

/// Pointer focus follows the topmost surface under the cursor
#[test]
fn test_pointer_enter_and_motion() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    fixture.add_output("Virtual-1", 1920, 1080);
    let pointer = fixture.add_pointer();
    let client = fixture.add_client();
    let desktop = fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    fixture.commit(client, window, 640, 480);
    fixture.policy_request(&format!("1 set_window_geometry {window} 100 100 640 480"));
    fixture.backend_mut().take_seat_events();

    fixture.send(motion(pointer, 150.0, 150.0));
    assert_eq!(fixture.backend().pointer_focus(), Some(window));
    assert_eq!(
        fixture.backend().seat_events().last(),
        Some(&SeatEvent::PointerEnter {
            surface: window,
            local: Point::from((50.0, 50.0)),
        })
    );

    fixture.send(motion(pointer, 10.0, 10.0));
    assert_eq!(
        fixture.backend().seat_events().last(),
        Some(&SeatEvent::PointerMotion {
            time_msec: 0,
            local: Point::from((60.0, 60.0)),
        })
    );

    // Past the window's bottom-right corner, onto the desktop
    fixture.send(motion(pointer, 1000.0, 1000.0));
    assert_eq!(fixture.backend().pointer_focus(), Some(desktop));
    assert_eq!(fixture.session().input().pointed_surface, Some(desktop));
    assert!(fixture.backend().idle_activity() >= 3);
}

/// Raising a surface moves pointer focus to it on the next motion
#[test]
fn test_map_request_changes_hit_target() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    fixture.add_output("Virtual-1", 1920, 1080);
    let pointer = fixture.add_pointer();
    let client = fixture.add_client();
    let desktop = fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    fixture.commit(client, window, 200, 200);

    fixture.send(motion(pointer, 50.0, 50.0));
    assert_eq!(fixture.backend().pointer_focus(), Some(window));

    // Lowering the window puts the desktop on top
    fixture.policy_request(&format!("2 unmap {window}"));
    fixture.send(motion(pointer, 1.0, 1.0));
    assert_eq!(fixture.backend().pointer_focus(), Some(desktop));

    fixture.policy_request(&format!("3 map {window}"));
    fixture.send(motion(pointer, 1.0, 1.0));
    assert_eq!(fixture.backend().pointer_focus(), Some(window));
}

/// Leaving every surface clears pointer focus and restores the default cursor
#[test]
fn test_pointer_leaves_to_empty_space() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    fixture.add_output("Virtual-1", 1920, 1080);
    let pointer = fixture.add_pointer();
    let client = fixture.add_client();
    // An unmapped desktop has no size and never takes the pointer
    fixture.create_toplevel(client);
    let window = fixture.create_toplevel(client);
    fixture.commit(client, window, 100, 100);

    fixture.send(ProtocolEvent::RequestSetCursor {
        surface: None,
        hotspot: Point::from((0, 0)),
    });
    assert_eq!(fixture.backend().cursor_image(), &CursorImage::Hidden);

    fixture.send(motion(pointer, 50.0, 50.0));
    assert_eq!(fixture.backend().pointer_focus(), Some(window));

    fixture.send(motion(pointer, 500.0, 500.0));
    assert_eq!(fixture.backend().pointer_focus(), None);
    assert_eq!(
        fixture.backend().seat_events().last(),
        Some(&SeatEvent::PointerClearFocus)
    );
    assert!(fixture.backend().cursor_image().is_default());
}

/// Buttons go to the seat and count as activity
#[test]
fn test_button_forwarded_to_seat() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    fixture.add_output("Virtual-1", 1920, 1080);
    let pointer = fixture.add_pointer();
    let activity = fixture.backend().idle_activity();

    fixture.send(ProtocolEvent::PointerButton {
        device: pointer,
        time_msec: 12,
        button: 0x110,
        state: ButtonState::Pressed,
    });
    fixture.send(ProtocolEvent::PointerFrame);

    assert_eq!(
        fixture.backend().seat_events(),
        &[
            SeatEvent::PointerButton {
                time_msec: 12,
                button: 0x110,
                state: ButtonState::Pressed,
            },
            SeatEvent::PointerFrame,
        ]
    );
    assert_eq!(fixture.backend().idle_activity(), activity + 1);
}

/// Mapping the desktop gives it keyboard focus; focus requests move it
#[test]
fn test_focus_request_moves_keyboard_focus() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    fixture.add_output("Virtual-1", 1920, 1080);
    let keyboard = fixture.add_keyboard();
    let client = fixture.add_client();
    let desktop = fixture.add_desktop(client);
    assert_eq!(fixture.backend().keyboard_focus(), Some(desktop));

    let window = fixture.create_toplevel(client);
    fixture.take_policy_lines();
    fixture.policy_request(&format!("9 focus {window}"));

    assert_eq!(fixture.backend().keyboard_focus(), Some(window));
    assert_eq!(
        fixture.backend().seat_events().last(),
        Some(&SeatEvent::KeyboardEnter {
            surface: window,
            keyboard,
        })
    );
    assert!(fixture.backend().surface_state(window).unwrap().current.activated);
    assert_eq!(fixture.take_policy_lines(), vec!["@ 9".to_string()]);
}

/// Focus is still acknowledged when no keyboard is plugged in
#[test]
fn test_focus_without_keyboard() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    fixture.add_output("Virtual-1", 1920, 1080);
    let client = fixture.add_client();
    fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    fixture.take_policy_lines();

    fixture.policy_request(&format!("4 focus {window}"));
    assert_eq!(fixture.backend().keyboard_focus(), None);
    assert!(fixture.backend().surface_state(window).unwrap().current.activated);
    assert_eq!(fixture.take_policy_lines(), vec!["@ 4".to_string()]);
}

/// Keys and modifiers reach the seat through the keyboard that produced them
#[test]
fn test_key_delivery() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    let keyboard = fixture.add_keyboard();
    fixture.backend_mut().take_seat_events();
    let activity = fixture.backend().idle_activity();

    let modifiers = Modifiers {
        depressed: 4,
        ..Default::default()
    };
    fixture.send(ProtocolEvent::KeyboardModifiers {
        keyboard,
        modifiers,
    });
    fixture.send(key(keyboard, 30));

    assert_eq!(
        fixture.backend().seat_events(),
        &[
            SeatEvent::SetKeyboard(keyboard),
            SeatEvent::KeyboardModifiers(modifiers),
            SeatEvent::SetKeyboard(keyboard),
            SeatEvent::KeyboardKey(KeyEvent {
                time_msec: 0,
                keycode: 30,
                state: KeyState::Pressed,
            }),
        ]
    );
    assert_eq!(fixture.backend().active_keyboard(), Some(keyboard));
    assert_eq!(fixture.backend().idle_activity(), activity + 1);
}

/// Keyboard events arriving after the session stopped unsubscribe their handlers
#[test]
fn test_keyboard_handlers_unsubscribe_after_stop() {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    let keyboard = fixture.add_keyboard();
    fixture.session_mut().stop();

    let handlers = fixture.session().handlers();
    assert!(handlers.is_subscribed(Source::Keyboard(keyboard), EventKind::Key));
    assert!(handlers.is_subscribed(Source::Keyboard(keyboard), EventKind::Modifiers));
    assert_eq!(handlers.len(), 2);

    fixture.session_mut().dispatch(key(keyboard, 30)).unwrap();
    assert!(!fixture
        .session()
        .handlers()
        .is_subscribed(Source::Keyboard(keyboard), EventKind::Key));

    fixture
        .session_mut()
        .dispatch(ProtocolEvent::KeyboardModifiers {
            keyboard,
            modifiers: Modifiers::default(),
        })
        .unwrap();
    assert!(fixture.session().handlers().is_empty());
    assert!(fixture.backend().seat_events().is_empty());
}
