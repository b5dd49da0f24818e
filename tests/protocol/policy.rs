//! Policy process interface tests
//!
//! Tests for request handling, acknowledgements, and the notification
//! channel to the policy process.

use std::io::{self, Write};

use pwm_core::testing::{ClientId, Fixture, PolicyCapture};
use pwm_core::{OutputId, SurfaceId};
use smithay::utils::{Point, Size};

/// Two outputs, a mapped desktop and one window, with nothing pending
fn setup() -> (Fixture, ClientId, SurfaceId, [OutputId; 2]) {
    let mut fixture = Fixture::new().expect("Failed to create fixture");
    let first = fixture.add_output("Virtual-1", 1920, 1080);
    let second = fixture.add_output("Virtual-2", 1280, 720);
    let client = fixture.add_client();
    fixture.add_desktop(client);
    let window = fixture.create_toplevel(client);
    fixture.take_policy_lines();
    (fixture, client, window, [first, second])
}

/// Unmapping twice keeps the window at the bottom and answers both requests
#[test]
fn test_unmap_request_is_idempotent() {
    let (mut fixture, _, window, outputs) = setup();
    let scene = fixture.session().scene();
    let root = scene.root();
    let node = fixture.session().surfaces().get(window).unwrap().node.unwrap();
    assert_ne!(scene.child(root, 0).unwrap().id(), node);

    for msgid in ["1", "2"] {
        let commits = outputs.map(|output| fixture.commit_count(output));
        fixture.policy_request(&format!("{msgid} unmap {window}"));

        let scene = fixture.session().scene();
        assert_eq!(scene.child(root, 0).unwrap().id(), node);
        assert_eq!(fixture.take_policy_lines(), vec![format!("@ {msgid}")]);
        for (output, before) in outputs.iter().zip(commits) {
            assert_eq!(fixture.commit_count(*output), before + 1);
        }
    }
}

/// A geometry request moves and resizes the window, commits every output once and is acknowledged
#[test]
fn test_set_window_geometry_round_trip() {
    let (mut fixture, _, window, outputs) = setup();
    let commits = outputs.map(|output| fixture.commit_count(output));

    fixture.policy_request(&format!("12 set_window_geometry {window} 10 20 300 200"));

    assert_eq!(fixture.take_policy_lines(), vec!["@ 12".to_string()]);
    for (output, before) in outputs.iter().zip(commits) {
        assert_eq!(fixture.commit_count(*output), before + 1);
    }
    let state = fixture.backend().surface_state(window).unwrap();
    assert_eq!(state.current.size, Some(Size::from((300, 200))));

    let record = fixture.session().surfaces().get(window).unwrap();
    let scene = fixture.session().scene();
    assert_eq!(scene.position(record.node.unwrap()).unwrap(), Point::from((10, 20)));
    assert_eq!(scene.size(record.buffer.unwrap()).unwrap(), Size::from((300, 200)));
}

/// Requests naming unknown surfaces get no answer and change nothing
#[test]
fn test_unknown_surface_dropped() {
    let (mut fixture, _, _, outputs) = setup();
    let commits = outputs.map(|output| fixture.commit_count(output));

    fixture.policy_request("5 map 0xdead");
    fixture.policy_request("6 focus 0xdead");

    assert!(fixture.take_policy_lines().is_empty());
    assert_eq!(outputs.map(|output| fixture.commit_count(output)), commits);
}

/// Malformed lines are ignored without disturbing the session
#[test]
fn test_malformed_requests_ignored() {
    let (mut fixture, _, window, _) = setup();
    let extra_argument = format!("7 focus {window} extra");
    for line in [
        "",
        "   ",
        "7",
        "7 frobnicate 0x1",
        "7 map",
        "7 map zz",
        "7 set_window_geometry 0x1 a b c d",
        extra_argument.as_str(),
    ] {
        fixture.policy_request(line);
    }
    assert!(fixture.take_policy_lines().is_empty());
    assert!(fixture.take_error().is_none());
    assert!(fixture.session().is_running());
}

/// Once a surface is destroyed, requests for it are dropped
#[test]
fn test_requests_after_destroy_dropped() {
    let (mut fixture, client, window, _) = setup();
    fixture.destroy(client, window);
    fixture.take_policy_lines();

    fixture.policy_request(&format!("1 focus {window}"));
    assert!(fixture.take_policy_lines().is_empty());
}

/// A surface outside the scene can take focus but not be placed
#[test]
fn test_surface_without_node_accepts_focus_only() {
    let (mut fixture, _, _, _) = setup();
    let id = fixture.backend_mut().alloc_surface_id();
    fixture.send(pwm_core::ProtocolEvent::NewSurface {
        surface: id,
        role: pwm_core::SurfaceRole::Other("NONE".to_string()),
        parent: None,
    });
    fixture.take_policy_lines();

    fixture.policy_request(&format!("1 map {id}"));
    fixture.policy_request(&format!("2 set_window_geometry {id} 0 0 10 10"));
    fixture.policy_request(&format!("3 focus {id}"));
    assert_eq!(fixture.take_policy_lines(), vec!["@ 3".to_string()]);
}

/// Acknowledgements do not use up notification serials
#[test]
fn test_acks_do_not_consume_serials() {
    let (mut fixture, client, window, _) = setup();
    // new_output twice, then the window
    assert_eq!(fixture.session().bridge().serial(), 3);

    fixture.policy_request(&format!("a1 map {window}"));
    let other = fixture.create_toplevel(client);
    assert_eq!(
        fixture.take_policy_lines(),
        vec!["@ a1".to_string(), format!("3 new_surface TOPLEVEL {other}")]
    );
}

/// Nothing is sent and no serial is spent while the policy process is detached
#[test]
fn test_detached_policy_keeps_serial() {
    let (mut fixture, client, _, _) = setup();
    let serial = fixture.session().bridge().serial();

    fixture.session_mut().detach_policy();
    fixture.create_toplevel(client);
    assert_eq!(fixture.session().bridge().serial(), serial);

    let capture = PolicyCapture::default();
    fixture.session_mut().attach_policy(Box::new(capture.clone()));
    let window = fixture.create_toplevel(client);
    assert_eq!(
        capture.lines(),
        vec![format!("{serial} new_surface TOPLEVEL {window}")]
    );
}

struct Broken;

impl Write for Broken {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A failed write detaches the channel instead of failing the session
#[test]
fn test_broken_channel_detaches() {
    let (mut fixture, client, _, _) = setup();
    let serial = fixture.session().bridge().serial();
    fixture.session_mut().attach_policy(Box::new(Broken));

    fixture.create_toplevel(client);
    assert!(!fixture.session().bridge().is_attached());
    assert_eq!(fixture.session().bridge().serial(), serial);
    assert!(fixture.take_error().is_none());
}
