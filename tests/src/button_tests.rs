//! Button edge, hold and pulse detection tests

use embedded_hal_mock::eh1::digital::{Mock as PinMock, State as PinState, Transaction as PinTransaction};
use proptest::prelude::*;
use rstest::rstest;
use saber_core::hal::mock::{MockLine, VirtualClock};
use saber_core::{Button, ButtonInput};

#[test]
fn test_button_reads_line_once_per_update() {
    let clock = VirtualClock::new();
    let expectations = [
        PinTransaction::get(PinState::High),
        PinTransaction::get(PinState::Low),
        PinTransaction::get(PinState::Low),
        PinTransaction::get(PinState::Low),
        PinTransaction::get(PinState::High),
        PinTransaction::get(PinState::High),
    ];
    let mut pin = PinMock::new(&expectations);
    let mut button = Button::new(pin.clone(), &clock);
    button.init();

    // Idle
    button.update();
    assert!(!button.is_held());

    // Press edge, then two held cycles
    clock.advance_ms(10);
    button.update();
    assert!(button.is_pressed());
    assert!(!button.is_held());
    clock.advance_ms(10);
    button.update();
    assert_eq!(button.held_time().as_millis(), 10);
    clock.advance_ms(10);
    button.update();
    assert_eq!(button.held_time().as_millis(), 20);

    // Release edge, then idle
    clock.advance_ms(10);
    button.update();
    assert!(button.is_pulse_edge());
    assert_eq!(button.pulse_width().as_millis(), 30);
    clock.advance_ms(10);
    button.update();
    assert!(!button.is_pulse_edge());

    pin.done();
}

#[test]
fn test_button_through_mutable_reference() {
    let clock = VirtualClock::new();
    let line = MockLine::new();
    let mut button = Button::new(line.pin(), &clock);

    // The state machine may hold `&mut Button`
    let mut handle: &mut Button<_, _> = &mut button;
    line.set_pressed(true);
    ButtonInput::update(&mut handle);
    clock.advance_ms(1600);
    ButtonInput::update(&mut handle);
    assert!(ButtonInput::is_held(&handle));
    assert_eq!(ButtonInput::held_time(&handle).as_millis(), 1600);
}

#[rstest]
#[case(1)]
#[case(49)]
#[case(50)]
#[case(60)]
#[case(1500)]
fn test_pulse_width_matches_press_length(#[case] press_ms: u64) {
    let clock = VirtualClock::new();
    let line = MockLine::new();
    let mut button = Button::new(line.pin(), &clock);

    line.set_pressed(true);
    button.update();
    clock.advance_ms(press_ms);
    line.set_pressed(false);
    button.update();

    assert!(button.is_pulse_edge());
    assert_eq!(button.pulse_width().as_millis(), press_ms);
}

#[test]
fn test_repeated_idle_updates_are_stable() {
    let clock = VirtualClock::new();
    let line = MockLine::new();
    let mut button = Button::new(line.pin(), &clock);

    line.set_pressed(true);
    button.update();
    clock.advance_ms(70);
    line.set_pressed(false);
    button.update();
    clock.advance_ms(1);
    button.update();

    let width = button.pulse_width();
    let pressed_at = button.pressed_at();
    for _ in 0..10 {
        clock.advance_ms(5);
        button.update();
        assert_eq!(button.pulse_width(), width);
        assert_eq!(button.pressed_at(), pressed_at);
        assert!(!button.is_pulse_edge());
        assert!(!button.is_held());
    }
}

#[test]
fn test_held_time_only_grows_while_pressed() {
    let clock = VirtualClock::new();
    let line = MockLine::new();
    let mut button = Button::new(line.pin(), &clock);

    line.set_pressed(true);
    button.update();
    let mut last = 0;
    for _ in 0..20 {
        clock.advance_ms(3);
        button.update();
        let held = button.held_time().as_millis();
        assert!(held > last);
        last = held;
    }
    assert_eq!(last, 60);
}

proptest! {
    #[test]
    fn prop_button_surface_is_consistent(
        steps in proptest::collection::vec((any::<bool>(), 0u64..200), 1..200)
    ) {
        let clock = VirtualClock::new();
        let line = MockLine::new();
        let mut button = Button::new(line.pin(), &clock);

        let mut was_pressed = false;
        let mut press_started = 0u64;
        let mut edges = 0u32;
        let mut releases = 0u32;

        for (pressed, dt) in steps {
            clock.advance_ms(dt);
            line.set_pressed(pressed);
            button.update();
            let now = clock.millis();

            if pressed && !was_pressed {
                press_started = now;
            }
            if was_pressed && !pressed {
                releases += 1;
                prop_assert_eq!(button.pulse_width().as_millis(), now - press_started);
            }
            if button.is_pulse_edge() {
                edges += 1;
                prop_assert!(was_pressed && !pressed);
            }

            prop_assert_eq!(button.is_held(), button.held_time().as_millis() > 0);
            if button.is_held() {
                prop_assert!(pressed && was_pressed);
                prop_assert_eq!(button.held_time().as_millis(), now - press_started);
            }
            prop_assert!(!(button.is_held() && button.is_pulse_edge()));

            was_pressed = pressed;
        }

        // Exactly one pulse edge per press/release pair
        prop_assert_eq!(edges, releases);
    }
}
