//! Transition legality checks over recorded mode traces
//!
//! Transitions are decided inside each mode handler with no central table.
//! These tests keep the table on the test side and check every mode change
//! the machine makes against it.

use proptest::prelude::*;
use saber_core::test_utils::{MockSaber, SaberRig};
use saber_core::{Duration, Rgb, SaberConfig, SaberMode, SwingMagnitude, WaitPolicy};

/// Every mode change the saber handlers are allowed to make
const LEGAL: &[(SaberMode, SaberMode)] = &[
    (SaberMode::Boot, SaberMode::Off),
    (SaberMode::Off, SaberMode::PoweringUp),
    (SaberMode::PoweringUp, SaberMode::OnIdle),
    (SaberMode::OnIdle, SaberMode::PoweringDown),
    (SaberMode::OnIdle, SaberMode::Clash),
    (SaberMode::OnIdle, SaberMode::Swing),
    (SaberMode::Swing, SaberMode::PostSwing),
    (SaberMode::PostSwing, SaberMode::PoweringDown),
    (SaberMode::PostSwing, SaberMode::Clash),
    (SaberMode::PostSwing, SaberMode::OnIdle),
    (SaberMode::Clash, SaberMode::PostClash),
    (SaberMode::PostClash, SaberMode::Clash),
    (SaberMode::PostClash, SaberMode::OnIdle),
    (SaberMode::PoweringDown, SaberMode::Off),
];

fn is_legal(from: SaberMode, to: SaberMode) -> bool {
    LEGAL.contains(&(from, to))
}

/// One cycle as seen from outside: the mode that ran and its new-state flag
#[derive(Copy, Clone, Debug)]
struct Cycle {
    ran: SaberMode,
    is_new: bool,
}

fn record(saber: &MockSaber<'_>, trace: &mut Vec<Cycle>) {
    trace.push(Cycle {
        ran: saber.last_mode().expect("machine has run"),
        is_new: saber.is_new_state(),
    });
}

/// Panics on an illegal change or a wrong new-state flag
fn check_trace(trace: &[Cycle]) {
    assert!(trace[0].is_new, "first cycle must be a new state");
    for pair in trace.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let changed = prev.ran != next.ran;
        assert_eq!(next.is_new, changed, "new-state flag wrong at {:?} -> {:?}", prev.ran, next.ran);
        if changed {
            assert!(is_legal(prev.ran, next.ran), "illegal transition {:?} -> {:?}", prev.ran, next.ran);
        }
    }
}

#[test]
fn test_legal_table_never_touches_reserved_modes() {
    for (from, to) in LEGAL {
        assert!(!from.is_reserved());
        assert!(!to.is_reserved());
    }
}

#[test]
fn test_scripted_session_is_legal() {
    let rig = SaberRig::new();
    let mut saber = rig.machine(SaberConfig::default());
    let mut trace = Vec::new();

    saber.init();
    saber.operate();
    record(&saber, &mut trace);

    let mut step = |ms: u64, trace: &mut Vec<Cycle>| {
        rig.step(&mut saber, ms);
        record(&saber, trace);
    };

    step(1, &mut trace);
    rig.activation.set_pressed(true);
    step(1, &mut trace);
    rig.activation.set_pressed(false);
    step(70, &mut trace);
    step(1, &mut trace);
    step(1, &mut trace);

    rig.motion.set_swing(true, SwingMagnitude::Medium);
    for _ in 0..5 {
        step(50, &mut trace);
    }
    rig.motion.set_clash(true);
    step(1, &mut trace);
    rig.motion.set_swing(false, SwingMagnitude::None);
    for _ in 0..30 {
        step(40, &mut trace);
    }
    rig.motion.set_clash(false);
    for _ in 0..30 {
        step(50, &mut trace);
    }

    // Hold until power-down is requested, then let go before it runs
    rig.activation.set_pressed(true);
    for _ in 0..16 {
        step(100, &mut trace);
    }
    rig.activation.set_pressed(false);
    step(1, &mut trace);
    step(1, &mut trace);

    check_trace(&trace);

    // Boot was announced as new, then Off right after it
    assert_eq!(trace[0].ran, SaberMode::Boot);
    assert_eq!(trace[1].ran, SaberMode::Off);
    assert!(trace[1].is_new);
    assert_eq!(trace.last().map(|c| c.ran), Some(SaberMode::Off));

    for mode in [
        SaberMode::PoweringUp,
        SaberMode::OnIdle,
        SaberMode::Swing,
        SaberMode::PostSwing,
        SaberMode::Clash,
        SaberMode::PostClash,
        SaberMode::PoweringDown,
    ] {
        assert!(trace.iter().any(|c| c.ran == mode), "{:?} never ran", mode);
    }
}

#[test]
fn test_new_state_flag_after_each_transition() {
    let rig = SaberRig::new();
    let mut saber = rig.machine(SaberConfig::default());
    saber.init();

    saber.operate();
    assert!(saber.is_new_state());
    assert_eq!(saber.last_mode(), Some(SaberMode::Boot));

    rig.step(&mut saber, 1);
    assert!(saber.is_new_state());
    assert_eq!(saber.last_mode(), Some(SaberMode::Off));

    rig.step(&mut saber, 1);
    assert!(!saber.is_new_state());
    rig.step(&mut saber, 1);
    assert!(!saber.is_new_state());
}

/// Input applied before one cycle
#[derive(Copy, Clone, Debug)]
enum Stimulus {
    Press,
    Release,
    Clash(bool),
    Swing(SwingMagnitude),
    Wait,
}

fn stimulus() -> impl Strategy<Value = Stimulus> {
    prop_oneof![
        Just(Stimulus::Press),
        Just(Stimulus::Release),
        any::<bool>().prop_map(Stimulus::Clash),
        prop_oneof![
            Just(SwingMagnitude::None),
            Just(SwingMagnitude::Small),
            Just(SwingMagnitude::Medium),
            Just(SwingMagnitude::Large),
        ]
        .prop_map(Stimulus::Swing),
        Just(Stimulus::Wait),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_random_sessions_only_make_legal_transitions(
        script in proptest::collection::vec((stimulus(), 1u64..400), 1..300)
    ) {
        let rig = SaberRig::new();
        // Bounded so a button held through power-down cannot stall the test
        let config = SaberConfig::new(
            Rgb::new(255, 0, 0),
            Rgb::new(255, 255, 0),
            WaitPolicy::Bounded(Duration::from_millis(3000)),
        )
        .unwrap();
        let mut saber = rig.machine(config);
        let mut trace = Vec::new();

        saber.init();
        saber.operate();
        record(&saber, &mut trace);

        for (input, dt) in script {
            match input {
                Stimulus::Press => rig.activation.set_pressed(true),
                Stimulus::Release => rig.activation.set_pressed(false),
                Stimulus::Clash(on) => rig.motion.set_clash(on),
                Stimulus::Swing(magnitude) => {
                    rig.motion.set_swing(magnitude != SwingMagnitude::None, magnitude)
                }
                Stimulus::Wait => {}
            }
            rig.step(&mut saber, dt);
            record(&saber, &mut trace);
            prop_assert!(!saber.mode().is_reserved());
        }

        check_trace(&trace);
    }
}
