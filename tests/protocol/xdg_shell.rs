//! XDG Shell protocol tests
//!
//! Tests for surface lifecycle, the desktop surface, popups and the
//! notifications each of them sends.

use pwm_core::dispatch::Source;
use pwm_core::protocol::ToplevelRequest;
use pwm_core::surface::{SurfaceRole, SurfaceState};
use pwm_core::testing::Fixture;
use pwm_core::{SessionError, SurfaceId};
use smithay::utils::Size;

/// Fixture with one 1920x1080 output and nothing sent yet
fn fixture() -> Fixture {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    fixture.add_output("Virtual-1", 1920, 1080);
    fixture.take_policy_lines();
    fixture
}

/// Test that the session starts with nothing but the scene root
#[test]
fn test_initial_state() {
    let fixture = fixture();
    assert_eq!(fixture.surface_count(), 0);
    assert_eq!(fixture.session().scene().len(), 1);
    assert_eq!(fixture.backend().keyboard_focus(), None);
}

/// The first surface is the desktop: never announced, shown full screen
#[test]
fn test_desktop_surface_is_presented_not_announced() {
    let mut fixture = fixture();
    let output = fixture.session().outputs().ids()[0];
    let commits = fixture.commit_count(output);
    let client = fixture.add_client();

    let desktop = fixture.create_toplevel(client);
    fixture.map(client, desktop);

    assert!(fixture.take_policy_lines().is_empty());
    let state = fixture.backend().surface_state(desktop).unwrap();
    assert_eq!(state.current.size, Some(Size::from((1920, 1080))));
    assert!(state.current.maximized);
    assert!(state.current.activated);
    assert_eq!(fixture.commit_count(output), commits + 1);

    let record = fixture.session().surfaces().get(desktop).unwrap();
    assert_eq!(record.state, SurfaceState::Mapped);
    let buffer = record.buffer.unwrap();
    assert_eq!(
        fixture.session().scene().size(buffer).unwrap(),
        Size::from((1920, 1080))
    );
}

/// Surfaces after the desktop are announced and their map is forwarded
#[test]
fn test_toplevel_lifecycle_notifications() {
    let mut fixture = fixture();
    let client = fixture.add_client();
    fixture.add_desktop(client);

    let window = fixture.create_toplevel(client);
    fixture.map(client, window);
    fixture.request(client, window, ToplevelRequest::SetTitle);
    fixture.unmap(client, window);
    fixture.destroy(client, window);

    assert_eq!(
        fixture.take_policy_lines(),
        vec![
            format!("1 new_surface TOPLEVEL {window}"),
            format!("2 map TOPLEVEL {window}"),
            format!("3 set_title TOPLEVEL {window}"),
            format!("4 unmap TOPLEVEL {window}"),
            format!("5 surface_destroy TOPLEVEL {window}"),
        ]
    );
    assert!(!fixture.has_surface(window));
    assert_eq!(fixture.session().handlers().subscriptions(Source::Surface(window)), 0);
}

/// Every toplevel request is forwarded under its own event name
#[test]
fn test_toplevel_requests_forwarded() {
    let mut fixture = fixture();
    let client = fixture.add_client();
    fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    fixture.take_policy_lines();

    for request in ToplevelRequest::ALL {
        fixture.request(client, window, request);
    }

    let events: Vec<String> = fixture
        .take_policy_lines()
        .iter()
        .map(|line| line.split(' ').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(
        events,
        [
            "move",
            "resize",
            "maximize",
            "minimize",
            "fullscreen",
            "show_window_menu",
            "set_parent",
            "set_title",
            "set_app_id",
        ]
    );
}

/// Unmapping twice sends two notifications and leaves the surface attached
#[test]
fn test_unmap_is_idempotent() {
    let mut fixture = fixture();
    let client = fixture.add_client();
    fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    fixture.map(client, window);
    fixture.take_policy_lines();

    fixture.unmap(client, window);
    fixture.unmap(client, window);

    assert_eq!(fixture.take_policy_lines().len(), 2);
    let record = fixture.session().surfaces().get(window).unwrap();
    assert_eq!(record.state, SurfaceState::Attached);
    assert!(fixture.take_error().is_none());
}

/// Popups hang off their parent's node and are announced with their parent
#[test]
fn test_popup_parenting() {
    let mut fixture = fixture();
    let client = fixture.add_client();
    fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    fixture.take_policy_lines();

    let popup = fixture.create_popup(client, window);
    fixture.send(pwm_core::ProtocolEvent::PopupReposition { surface: popup });

    assert_eq!(
        fixture.take_policy_lines(),
        vec![
            format!("2 new_surface POPUP {popup}"),
            format!("3 new_popup TOPLEVEL {window}"),
            format!("4 reposition POPUP {popup}"),
        ]
    );

    let surfaces = fixture.session().surfaces();
    let window_node = surfaces.get(window).unwrap().node.unwrap();
    let popup_record = surfaces.get(popup).unwrap();
    assert_eq!(popup_record.parent, Some(window));
    let popup_node = popup_record.node.unwrap();
    assert_eq!(
        fixture.session().scene().parent(popup_node).unwrap(),
        Some(window_node)
    );
}

/// Destroying a parent takes the popup's node with it; the popup can still be destroyed
#[test]
fn test_parent_destroyed_before_popup() {
    let mut fixture = fixture();
    let client = fixture.add_client();
    fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    let popup = fixture.create_popup(client, window);
    let popup_node = fixture.session().surfaces().get(popup).unwrap().node.unwrap();

    fixture.destroy(client, window);
    assert!(!fixture.session().scene().contains(popup_node));
    assert!(fixture.has_surface(popup));

    let record = fixture.session().surfaces().get(popup).unwrap();
    assert_eq!(record.node, None);
    assert_eq!(record.buffer, None);
    assert_eq!(record.state, SurfaceState::Rejected);

    // Late commits and maps from the client are harmless
    fixture.commit(client, popup, 50, 50);
    fixture.map(client, popup);
    assert!(fixture.take_error().is_none());
    assert!(!fixture.session().surfaces().get(popup).unwrap().is_mapped());

    fixture.destroy(client, popup);
    assert!(fixture.take_error().is_none());
    assert!(!fixture.has_surface(popup));
}

/// A popup whose parent is unknown leaves the session unusable
#[test]
fn test_orphan_popup_is_fatal() {
    let mut fixture = fixture();
    let client = fixture.add_client();
    fixture.add_desktop(client);

    let popup = fixture.create_popup(client, SurfaceId(0xdead));
    match fixture.take_error() {
        Some(SessionError::OrphanPopup { surface, parent }) => {
            assert_eq!(surface, popup);
            assert_eq!(parent, Some(SurfaceId(0xdead)));
        }
        other => panic!("expected an orphan popup error, got {other:?}"),
    }
}

/// Surfaces with an unknown role are tracked but never enter the scene
#[test]
fn test_unknown_role_rejected() {
    let mut fixture = fixture();
    let client = fixture.add_client();
    fixture.add_desktop(client);
    let nodes = fixture.session().scene().len();

    let id = fixture.backend_mut().alloc_surface_id();
    fixture.send(pwm_core::ProtocolEvent::NewSurface {
        surface: id,
        role: SurfaceRole::Other("NONE".to_string()),
        parent: None,
    });

    let record = fixture.session().surfaces().get(id).unwrap();
    assert_eq!(record.state, SurfaceState::Rejected);
    assert_eq!(record.node, None);
    assert_eq!(fixture.session().scene().len(), nodes);
    assert_eq!(
        fixture.take_policy_lines().last(),
        Some(&format!("1 new_surface NONE {id}"))
    );
}

/// Snapshot of the scene after commits and a geometry request
#[test]
fn test_scene_snapshot() {
    let mut fixture = fixture();
    let client = fixture.add_client();
    let desktop = fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    fixture.commit(client, window, 640, 480);
    assert_eq!(desktop, SurfaceId(0x1010));
    assert_eq!(window, SurfaceId(0x1020));

    insta::assert_snapshot!(fixture.session().scene().dump().trim_end(), @r"
    tree (0, 0)
      tree (0, 0)
        buffer (0, 0) 1920x1080 surface=0x1010
      tree (0, 0)
        buffer (0, 0) 640x480 surface=0x1020
    ");

    fixture.policy_request("7 set_window_geometry 0x1020 100 50 800 600");
    insta::assert_snapshot!(fixture.session().scene().dump().trim_end(), @r"
    tree (0, 0)
      tree (0, 0)
        buffer (0, 0) 1920x1080 surface=0x1010
      tree (100, 50)
        buffer (0, 0) 800x600 surface=0x1020
    ");
}
