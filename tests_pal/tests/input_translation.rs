//! Input Routing Integration Tests
//!
//! Host input through translation into application queues: subscriptions,
//! filtering, the pointer accumulator and relative capture.

use std::thread;
use std::time::Duration;

use core_types::Cap;
use hal::{HostButtonMask, HostError, HostEvent, HostKeyMod, TouchPhase, WindowEvent};
use input_types::{ButtonState, InputEvent, InputOpts, KeyCode, KeyModifiers, TouchEvent};
use pal::{EventPayload, FrameBufferOpts, Pal, PalError};
use sim_host::SimulatedHost;
use tests_pal::{next_frame, next_record, palette_framebuffer, test_pal};

fn next_input(pal: &mut Pal<SimulatedHost>, queue: Cap) -> Option<InputEvent> {
    match next_record(pal, queue).unwrap()?.payload {
        EventPayload::Input(event) => Some(event),
        other => panic!("expected input, got {:?}", other),
    }
}

#[test]
fn test_unsubscribed_input_goes_to_pumping_queue() {
    let mut pal = test_pal();
    let a = pal.queue_new(12).unwrap();
    let b = pal.queue_new(12).unwrap();
    pal.host().inject(HostEvent::key_down(KeyCode::A.usage(), HostKeyMod::empty()));
    pal.host().inject(HostEvent::key_up(KeyCode::A.usage(), HostKeyMod::empty()));

    assert!(matches!(next_input(&mut pal, b), Some(InputEvent::KeyDown(_))));
    assert!(matches!(next_input(&mut pal, a), Some(InputEvent::KeyUp(_))));
    assert!(pal.queue_empty(a).unwrap());
    assert!(pal.queue_empty(b).unwrap());
}

#[test]
fn test_subscription_routes_to_bound_queue() {
    let mut pal = test_pal();
    let bound = pal.queue_new(12).unwrap();
    let pump = pal.queue_new(12).unwrap();
    pal.input_subscribe(Cap::INPUT, InputOpts::KEY, bound).unwrap();
    assert_eq!(pal.input(Cap::INPUT).unwrap().queue(), Some(bound));

    pal.host().inject(HostEvent::key_down(
        KeyCode::Z.usage(),
        HostKeyMod::LCTRL | HostKeyMod::RALT,
    ));
    assert_eq!(pal.queue_read(pump).unwrap(), None);
    assert_eq!(pal.queue_len(bound).unwrap(), 1);

    let key = *next_input(&mut pal, bound).unwrap().as_key().unwrap();
    assert_eq!(key.keycode, KeyCode::Z);
    assert_eq!(key.modifiers, KeyModifiers::LCTRL | KeyModifiers::RALT);
}

#[test]
fn test_filtered_kinds_are_dropped() {
    let mut pal = test_pal();
    let q = pal.queue_new(12).unwrap();
    pal.input_subscribe(Cap::INPUT, InputOpts::KEY, q).unwrap();

    pal.host().inject(HostEvent::motion(5, 5, HostButtonMask::empty()));
    pal.host().inject(HostEvent::button_down(1, 10, 10));
    pal.host().inject(HostEvent::key_down(KeyCode::SPACE.usage(), HostKeyMod::empty()));

    assert_eq!(pal.queue_read(q).unwrap(), None);
    assert_eq!(pal.queue_read(q).unwrap(), None);
    let event = next_input(&mut pal, q).unwrap();
    assert_eq!(event.as_key().unwrap().keycode, KeyCode::SPACE);
    assert!(pal.queue_empty(q).unwrap());

    // after unsubscribing, everything flows to the pumping queue again
    pal.input_unsubscribe(Cap::INPUT).unwrap();
    pal.host().inject(HostEvent::motion(1, 0, HostButtonMask::empty()));
    assert!(matches!(next_input(&mut pal, q), Some(InputEvent::PointerMove(_))));
}

#[test]
fn test_button_accumulator() {
    let mut pal = test_pal();
    let q = pal.queue_new(12).unwrap();
    pal.host().handle().inject_all([
        HostEvent::button_down(1, 3, 4),
        HostEvent::button_down(3, 3, 4),
        HostEvent::button_up(1, 5, 6),
        HostEvent::motion(2, -1, HostButtonMask::MIDDLE),
    ]);

    let down = next_input(&mut pal, q).unwrap();
    assert!(matches!(down, InputEvent::ButtonDown(_)));
    assert_eq!(down.as_pointer().unwrap().buttons, ButtonState::LEFT);
    assert_eq!((down.as_pointer().unwrap().x, down.as_pointer().unwrap().y), (3, 4));

    let right = next_input(&mut pal, q).unwrap();
    assert_eq!(
        right.as_pointer().unwrap().buttons,
        ButtonState::LEFT | ButtonState::RIGHT
    );

    let up = next_input(&mut pal, q).unwrap();
    assert!(matches!(up, InputEvent::ButtonUp(_)));
    assert_eq!(up.as_pointer().unwrap().buttons, ButtonState::RIGHT);

    // motion resynchronizes from the host mask
    let motion = *next_input(&mut pal, q).unwrap().as_pointer().unwrap();
    assert_eq!(motion.buttons, ButtonState::MIDDLE);
    assert_eq!((motion.x, motion.y), (2, -1));
}

#[test]
fn test_touch_points() {
    let mut pal = test_pal();
    let q = pal.queue_new(12).unwrap();
    pal.input_subscribe(Cap::INPUT, InputOpts::TOUCH_POINTS, q).unwrap();
    for (phase, x) in [(TouchPhase::Down, 10), (TouchPhase::Motion, 12), (TouchPhase::Up, 14)] {
        pal.host().inject(HostEvent::Touch {
            phase,
            device: 1,
            finger: 2,
            x,
            y: 20,
        });
    }

    let touch = |x| TouchEvent {
        device: 1,
        touch: 2,
        x,
        y: 20,
    };
    assert_eq!(next_input(&mut pal, q), Some(InputEvent::TouchBegin(touch(10))));
    assert_eq!(next_input(&mut pal, q), Some(InputEvent::TouchMove(touch(12))));
    assert_eq!(next_input(&mut pal, q), Some(InputEvent::TouchEnd(touch(14))));
}

#[test]
fn test_wheel_and_resize_produce_nothing() {
    let mut pal = test_pal();
    let q = pal.queue_new(12).unwrap();
    pal.host().inject(HostEvent::Wheel { dx: 0, dy: -1 });
    pal.host().inject(HostEvent::Window(WindowEvent::Resized {
        width: 800,
        height: 600,
    }));
    assert_eq!(pal.queue_read(q).unwrap(), None);
    assert_eq!(pal.queue_read(q).unwrap(), None);
    assert!(pal.queue_empty(q).unwrap());
}

#[test]
fn test_quit_goes_to_pumping_queue() {
    let mut pal = test_pal();
    let bound = pal.queue_new(12).unwrap();
    let pump = pal.queue_new(12).unwrap();
    pal.input_subscribe(Cap::INPUT, InputOpts::all(), bound).unwrap();
    pal.host().inject(HostEvent::Quit);

    let record = next_record(&mut pal, pump).unwrap().unwrap();
    assert_eq!(record.cap, Cap::SYSTEM);
    assert_eq!(record.payload, EventPayload::Quit);
    assert_eq!(pal.queue_len(bound).unwrap(), 0);
}

#[test]
fn test_capture_follows_focus() {
    let mut pal = test_pal();
    let q = palette_framebuffer(&mut pal, FrameBufferOpts::empty(), 8, 8).unwrap();
    assert!(pal.host().relative_pointer());
    assert_eq!(pal.host().relative_transitions(), 1);

    for event in [
        WindowEvent::FocusLost,
        WindowEvent::PointerLeave,
        WindowEvent::PointerEnter,
        WindowEvent::FocusGained,
    ] {
        pal.host().inject(HostEvent::Window(event));
    }
    // the pending FrameReady comes first
    assert!(next_frame(&mut pal, q).unwrap().is_some());
    while !pal.queue_empty(q).unwrap() {
        assert_eq!(pal.queue_read(q).unwrap(), None);
    }
    assert!(pal.host().relative_pointer());
    // leave after lost and gained after enter change nothing
    assert_eq!(pal.host().relative_transitions(), 3);
}

#[test]
fn test_destroyed_queue_falls_back() {
    let mut pal = test_pal();
    let bound = pal.queue_new(12).unwrap();
    let other = pal.queue_new(12).unwrap();
    pal.input_subscribe(Cap::INPUT, InputOpts::KEY, bound).unwrap();
    pal.queue_destroy(bound).unwrap();

    pal.host().inject(HostEvent::key_down(KeyCode::Q.usage(), HostKeyMod::empty()));
    assert!(matches!(next_input(&mut pal, other), Some(InputEvent::KeyDown(_))));
}

#[test]
fn test_injection_from_another_thread() {
    let mut pal = test_pal();
    let q = pal.queue_new(12).unwrap();
    let handle = pal.host().handle();

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.inject(HostEvent::key_down(KeyCode::RETURN.usage(), HostKeyMod::empty()));
    });
    pal.queue_wait(q).unwrap();
    let event = next_input(&mut pal, q).unwrap();
    assert_eq!(event.as_key().unwrap().keycode, KeyCode::RETURN);
    producer.join().unwrap();
}

#[test]
fn test_wait_reports_disconnect() {
    let mut pal = test_pal();
    let q = pal.queue_new(12).unwrap();
    pal.host().handle().close();
    assert!(matches!(
        pal.queue_wait(q),
        Err(PalError::Host(HostError::Disconnected))
    ));
}
