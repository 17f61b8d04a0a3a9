//! Test utilities for saber core functionality
//!
//! [`SaberRig`] owns one of every mock collaborator on a shared
//! [`VirtualClock`] and builds machines that borrow them, so a test can
//! press buttons and inject motion while the machine runs.

use core::marker::PhantomData;

use crate::button::Button;
use crate::hal::mock::{MockBlade, MockLine, MockMotion, MockPin, MockSoundPlayer, VirtualClock};
use crate::hal::{Peripherals, SaberHal};
use crate::saber::SaberStateMachine;
use crate::types::{SaberConfig, SaberMode, Settings};

/// Board type naming the mock collaborators
pub struct MockHal<'a>(PhantomData<&'a ()>);

impl<'a> SaberHal for MockHal<'a> {
    type Sound = &'a MockSoundPlayer;
    type Motion = &'a MockMotion;
    type Blade = &'a MockBlade;
    type Button = Button<MockPin<'a>, &'a VirtualClock>;
    type Clock = &'a VirtualClock;
    type Delay = &'a VirtualClock;
}

pub type MockSaber<'a> = SaberStateMachine<MockHal<'a>>;

/// Mock bench for driving a saber state machine
#[derive(Default)]
pub struct SaberRig {
    pub clock: VirtualClock,
    pub activation: MockLine,
    pub auxiliary: MockLine,
    pub sound: MockSoundPlayer,
    pub motion: MockMotion,
    pub blade: MockBlade,
}

impl SaberRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peripherals(&self) -> Peripherals<MockHal<'_>> {
        Peripherals {
            sound: &self.sound,
            motion: &self.motion,
            blade: &self.blade,
            activation: Button::new(self.activation.pin(), &self.clock),
            auxiliary: Button::new(self.auxiliary.pin(), &self.clock),
            clock: &self.clock,
            delay: &self.clock,
        }
    }

    pub fn machine(&self, config: SaberConfig) -> MockSaber<'_> {
        self.machine_with(config, Settings::default())
    }

    pub fn machine_with(&self, config: SaberConfig, settings: Settings) -> MockSaber<'_> {
        SaberStateMachine::new(self.peripherals(), config, settings)
    }

    /// Advance virtual time by `ms`, then run one cycle
    pub fn step(&self, saber: &mut MockSaber<'_>, ms: u64) {
        self.clock.advance_ms(ms);
        saber.operate();
    }

    /// Run cycles every `step_ms` until `total_ms` has passed, recording
    /// the mode after each cycle into `trace` when it has room
    pub fn run_for<const N: usize>(
        &self,
        saber: &mut MockSaber<'_>,
        total_ms: u64,
        step_ms: u64,
        trace: &mut heapless::Vec<SaberMode, N>,
    ) {
        let mut elapsed = 0;
        while elapsed < total_ms {
            self.step(saber, step_ms);
            trace.push(saber.mode()).ok();
            elapsed += step_ms;
        }
    }

    /// Press the activation button for `width_ms` and release it, one cycle
    /// at each edge
    pub fn tap(&self, saber: &mut MockSaber<'_>, width_ms: u64) {
        self.activation.set_pressed(true);
        self.step(saber, 1);
        self.activation.set_pressed(false);
        self.step(saber, width_ms);
    }

    /// Init, boot and tap the saber on, ending after the first OnIdle cycle
    pub fn power_on(&self, saber: &mut MockSaber<'_>) {
        saber.init();
        saber.operate();
        self.step(saber, 1);
        self.tap(saber, 60);
        assert_eq!(saber.mode(), SaberMode::PoweringUp);
        self.step(saber, 1);
        self.step(saber, 1);
        assert_eq!(saber.mode(), SaberMode::OnIdle);
        assert_eq!(saber.last_mode(), Some(SaberMode::OnIdle));
    }
}
