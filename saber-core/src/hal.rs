//! Hardware Abstraction Layer for the saber core
//!
//! The core never touches hardware directly. Buttons read an
//! [`embedded_hal::digital::InputPin`], delays go through
//! [`embedded_hal::delay::DelayNs`], and the sound, motion and blade
//! subsystems are reached through the narrow capability traits below.

// Re-export time types based on feature
#[cfg(feature = "embassy-time")]
pub use embassy_time::{Duration, Instant};

#[cfg(not(feature = "embassy-time"))]
pub use self::mock_time::{Duration, Instant};

#[cfg(not(feature = "embassy-time"))]
mod mock_time {
    /// Millisecond instant used when building without embassy-time
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Instant(u64);

    impl Instant {
        pub const fn from_millis(ms: u64) -> Self {
            Self(ms)
        }

        pub const fn as_millis(&self) -> u64 {
            self.0
        }

        /// Time elapsed since `earlier`, zero if `earlier` is in the future
        pub fn saturating_duration_since(&self, earlier: Instant) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    impl core::ops::Add<Duration> for Instant {
        type Output = Instant;

        fn add(self, rhs: Duration) -> Instant {
            Instant(self.0 + rhs.as_millis())
        }
    }

    /// Millisecond duration used when building without embassy-time
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct Duration(u64);

    impl Duration {
        pub const fn from_millis(ms: u64) -> Self {
            Self(ms)
        }

        pub const fn from_secs(secs: u64) -> Self {
            Self(secs * 1000)
        }

        pub const fn as_millis(&self) -> u64 {
            self.0
        }
    }

    impl core::ops::Add for Duration {
        type Output = Duration;

        fn add(self, rhs: Duration) -> Duration {
            Duration(self.0 + rhs.0)
        }
    }

    impl core::ops::Sub for Duration {
        type Output = Duration;

        fn sub(self, rhs: Duration) -> Duration {
            Duration(self.0 - rhs.0)
        }
    }

    impl core::ops::Mul<u32> for Duration {
        type Output = Duration;

        fn mul(self, rhs: u32) -> Duration {
            Duration(self.0 * rhs as u64)
        }
    }
}

use embedded_hal::delay::DelayNs;
use crate::types::{SoundKind, SwingMagnitude, WaitPolicy};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO read failed
    GpioError,
    /// A bounded wait expired before the collaborator reported completion
    WaitTimeout,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::WaitTimeout => write!(f, "Wait budget expired"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Monotonic time source. The only place the core asks for "now".
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Clock backed by the embassy time driver
#[cfg(feature = "embassy-time")]
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy-time")]
impl Clock for EmbassyClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Sound playback subsystem. All calls are fire-and-forget.
pub trait SoundPlayer {
    fn init(&mut self);

    fn set_volume(&mut self, level: u8);

    /// Select the sound font (profile) used by later playback calls
    fn set_font(&mut self, font: u8);

    /// Play a specific variant of a sound kind
    fn play_sound(&mut self, kind: SoundKind, variant: u8);

    /// Play a randomly chosen variant of a sound kind
    fn play_random_sound(&mut self, kind: SoundKind);
}

/// Motion-sensing subsystem. Queries reflect the latest `update()`.
pub trait MotionManager {
    fn init(&mut self);

    /// Sample the sensor. Call once per cycle.
    fn update(&mut self);

    fn is_clash(&self) -> bool;

    fn is_swing(&self) -> bool;

    fn swing_magnitude(&self) -> SwingMagnitude;
}

/// Blade / light actuator driver
pub trait BladeDriver {
    fn init(&mut self);

    /// Stage a channel value. Nothing reaches the hardware until `perform_io`.
    fn set_channel(&mut self, value: u8, channel: usize);

    /// Commit pending channel writes
    fn perform_io(&mut self);

    /// Advance the power-up ramp. Returns true once the ramp is complete.
    fn power_up(&mut self, ramp: Duration) -> bool;

    /// Advance the power-down ramp. Returns true once the blade is dark.
    fn power_down(&mut self, ramp: Duration) -> bool;

    fn apply_flicker(&mut self, intensity: u8);
}

/// Query surface of a polled push-button
pub trait ButtonInput {
    /// Reset edge bookkeeping before the first cycle
    fn init(&mut self);

    /// Sample the line once and update edge/hold/pulse state
    fn update(&mut self);

    fn is_held(&self) -> bool;

    /// Time held since the press edge, zero when not pressed
    fn held_time(&self) -> Duration;

    /// Width of the press that just ended, valid on the release cycle
    fn pulse_width(&self) -> Duration;

    /// True only on the cycle a release edge was detected
    fn is_pulse_edge(&self) -> bool;
}

impl<T: SoundPlayer + ?Sized> SoundPlayer for &mut T {
    fn init(&mut self) {
        (**self).init()
    }

    fn set_volume(&mut self, level: u8) {
        (**self).set_volume(level)
    }

    fn set_font(&mut self, font: u8) {
        (**self).set_font(font)
    }

    fn play_sound(&mut self, kind: SoundKind, variant: u8) {
        (**self).play_sound(kind, variant)
    }

    fn play_random_sound(&mut self, kind: SoundKind) {
        (**self).play_random_sound(kind)
    }
}

impl<T: MotionManager + ?Sized> MotionManager for &mut T {
    fn init(&mut self) {
        (**self).init()
    }

    fn update(&mut self) {
        (**self).update()
    }

    fn is_clash(&self) -> bool {
        (**self).is_clash()
    }

    fn is_swing(&self) -> bool {
        (**self).is_swing()
    }

    fn swing_magnitude(&self) -> SwingMagnitude {
        (**self).swing_magnitude()
    }
}

impl<T: BladeDriver + ?Sized> BladeDriver for &mut T {
    fn init(&mut self) {
        (**self).init()
    }

    fn set_channel(&mut self, value: u8, channel: usize) {
        (**self).set_channel(value, channel)
    }

    fn perform_io(&mut self) {
        (**self).perform_io()
    }

    fn power_up(&mut self, ramp: Duration) -> bool {
        (**self).power_up(ramp)
    }

    fn power_down(&mut self, ramp: Duration) -> bool {
        (**self).power_down(ramp)
    }

    fn apply_flicker(&mut self, intensity: u8) {
        (**self).apply_flicker(intensity)
    }
}

impl<T: ButtonInput + ?Sized> ButtonInput for &mut T {
    fn init(&mut self) {
        (**self).init()
    }

    fn update(&mut self) {
        (**self).update()
    }

    fn is_held(&self) -> bool {
        (**self).is_held()
    }

    fn held_time(&self) -> Duration {
        (**self).held_time()
    }

    fn pulse_width(&self) -> Duration {
        (**self).pulse_width()
    }

    fn is_pulse_edge(&self) -> bool {
        (**self).is_pulse_edge()
    }
}

/// Complete saber HAL interface
///
/// Implemented by a (usually zero-sized) board type that names the concrete
/// collaborator types. The instances themselves travel in [`Peripherals`].
pub trait SaberHal {
    type Sound: SoundPlayer;
    type Motion: MotionManager;
    type Blade: BladeDriver;
    type Button: ButtonInput;
    type Clock: Clock;
    type Delay: DelayNs;
}

/// Collaborator instances handed to the saber state machine
pub struct Peripherals<H: SaberHal> {
    pub sound: H::Sound,
    pub motion: H::Motion,
    pub blade: H::Blade,
    /// Activation button (power on/off)
    pub activation: H::Button,
    /// Auxiliary button
    pub auxiliary: H::Button,
    pub clock: H::Clock,
    pub delay: H::Delay,
}

/// Busy-wait until `done` returns true, re-polling every millisecond.
///
/// With [`WaitPolicy::Unbounded`] this never returns if `done` never
/// succeeds. With [`WaitPolicy::Bounded`] it gives up after the limit.
pub fn block_until<C, D, F>(
    clock: &C,
    delay: &mut D,
    policy: WaitPolicy,
    mut done: F,
) -> Result<(), HalError>
where
    C: Clock,
    D: DelayNs,
    F: FnMut() -> bool,
{
    let start = clock.now();
    loop {
        if done() {
            return Ok(());
        }
        if let WaitPolicy::Bounded(limit) = policy {
            if clock.now().saturating_duration_since(start) >= limit {
                return Err(HalError::WaitTimeout);
            }
        }
        delay.delay_ms(1);
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing
    //!
    //! Every mock uses interior mutability and implements its trait for a
    //! shared reference, so a test can keep poking the mock while the
    //! state machine holds it.

    use super::*;
    use core::cell::{Cell, RefCell};
    use embedded_hal::digital::{ErrorKind, ErrorType, InputPin};
    use heapless::Vec;

    /// Virtual monotonic clock. Delays advance it.
    #[derive(Default)]
    pub struct VirtualClock {
        nanos: Cell<u64>,
    }

    impl VirtualClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn starting_at(ms: u64) -> Self {
            let clock = Self::new();
            clock.nanos.set(ms * 1_000_000);
            clock
        }

        pub fn advance(&self, duration: Duration) {
            self.advance_ms(duration.as_millis());
        }

        pub fn advance_ms(&self, ms: u64) {
            self.nanos.set(self.nanos.get() + ms * 1_000_000);
        }

        pub fn millis(&self) -> u64 {
            self.nanos.get() / 1_000_000
        }
    }

    impl Clock for VirtualClock {
        fn now(&self) -> Instant {
            Instant::from_millis(self.millis())
        }
    }

    impl DelayNs for &VirtualClock {
        fn delay_ns(&mut self, ns: u32) {
            self.nanos.set(self.nanos.get() + ns as u64);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.advance_ms(ms as u64);
        }
    }

    /// Pin fault reported by [`MockPin`]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct MockPinFault;

    impl embedded_hal::digital::Error for MockPinFault {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Simulated input line with a push-button to ground
    #[derive(Default)]
    pub struct MockLine {
        pressed: Cell<bool>,
        faulted: Cell<bool>,
        reads: Cell<u32>,
    }

    impl MockLine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Hold the button down (line pulled low) or let it go
        pub fn set_pressed(&self, pressed: bool) {
            self.pressed.set(pressed);
        }

        pub fn is_pressed(&self) -> bool {
            self.pressed.get()
        }

        /// Make subsequent reads fail
        pub fn set_faulted(&self, faulted: bool) {
            self.faulted.set(faulted);
        }

        pub fn reads(&self) -> u32 {
            self.reads.get()
        }

        pub fn pin(&self) -> MockPin<'_> {
            MockPin { line: self }
        }
    }

    /// `InputPin` view of a [`MockLine`]
    pub struct MockPin<'a> {
        line: &'a MockLine,
    }

    impl MockPin<'_> {
        fn read_low(&self) -> Result<bool, MockPinFault> {
            self.line.reads.set(self.line.reads.get() + 1);
            if self.line.faulted.get() {
                return Err(MockPinFault);
            }
            Ok(self.line.pressed.get())
        }
    }

    impl ErrorType for MockPin<'_> {
        type Error = MockPinFault;
    }

    impl InputPin for MockPin<'_> {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            self.read_low().map(|low| !low)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.read_low()
        }
    }

    /// Command recorded by [`MockSoundPlayer`]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum SoundCommand {
        Init,
        Volume(u8),
        Font(u8),
        Play(SoundKind, u8),
        PlayRandom(SoundKind),
    }

    #[derive(Default)]
    pub struct MockSoundPlayer {
        log: RefCell<Vec<SoundCommand, 64>>,
    }

    impl MockSoundPlayer {
        pub fn new() -> Self {
            Self::default()
        }

        fn record(&self, command: SoundCommand) {
            // Oldest entries win once the log is full
            self.log.borrow_mut().push(command).ok();
        }

        pub fn commands(&self) -> Vec<SoundCommand, 64> {
            self.log.borrow().clone()
        }

        pub fn last(&self) -> Option<SoundCommand> {
            self.log.borrow().last().copied()
        }

        /// Number of times `kind` was started, specific or random variant
        pub fn plays_of(&self, kind: SoundKind) -> usize {
            self.log
                .borrow()
                .iter()
                .filter(|c| matches!(c, SoundCommand::Play(k, _) | SoundCommand::PlayRandom(k) if *k == kind))
                .count()
        }

        pub fn clear(&self) {
            self.log.borrow_mut().clear();
        }
    }

    impl SoundPlayer for &MockSoundPlayer {
        fn init(&mut self) {
            self.record(SoundCommand::Init);
        }

        fn set_volume(&mut self, level: u8) {
            self.record(SoundCommand::Volume(level));
        }

        fn set_font(&mut self, font: u8) {
            self.record(SoundCommand::Font(font));
        }

        fn play_sound(&mut self, kind: SoundKind, variant: u8) {
            self.record(SoundCommand::Play(kind, variant));
        }

        fn play_random_sound(&mut self, kind: SoundKind) {
            self.record(SoundCommand::PlayRandom(kind));
        }
    }

    #[derive(Default)]
    pub struct MockMotion {
        clash: Cell<bool>,
        swing: Cell<bool>,
        magnitude: Cell<SwingMagnitude>,
        updates: Cell<u32>,
        inits: Cell<u32>,
    }

    impl MockMotion {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_clash(&self, clash: bool) {
            self.clash.set(clash);
        }

        pub fn set_swing(&self, swing: bool, magnitude: SwingMagnitude) {
            self.swing.set(swing);
            self.magnitude.set(magnitude);
        }

        pub fn updates(&self) -> u32 {
            self.updates.get()
        }

        pub fn inits(&self) -> u32 {
            self.inits.get()
        }
    }

    impl MotionManager for &MockMotion {
        fn init(&mut self) {
            self.inits.set(self.inits.get() + 1);
        }

        fn update(&mut self) {
            self.updates.set(self.updates.get() + 1);
        }

        fn is_clash(&self) -> bool {
            self.clash.get()
        }

        fn is_swing(&self) -> bool {
            self.swing.get()
        }

        fn swing_magnitude(&self) -> SwingMagnitude {
            self.magnitude.get()
        }
    }

    /// Blade that completes a ramp after a configurable number of polls
    pub struct MockBlade {
        staged: Cell<[u8; 3]>,
        committed: Cell<[u8; 3]>,
        io_count: Cell<u32>,
        inits: Cell<u32>,
        polls_to_power_up: Cell<u32>,
        polls_to_power_down: Cell<u32>,
        power_up_polls: Cell<u32>,
        power_down_polls: Cell<u32>,
        last_ramp: Cell<Option<Duration>>,
        flickers: Cell<u32>,
        last_flicker: Cell<Option<u8>>,
    }

    impl Default for MockBlade {
        fn default() -> Self {
            Self {
                staged: Cell::new([0; 3]),
                committed: Cell::new([0; 3]),
                io_count: Cell::new(0),
                inits: Cell::new(0),
                polls_to_power_up: Cell::new(1),
                polls_to_power_down: Cell::new(1),
                power_up_polls: Cell::new(0),
                power_down_polls: Cell::new(0),
                last_ramp: Cell::new(None),
                flickers: Cell::new(0),
                last_flicker: Cell::new(None),
            }
        }
    }

    impl MockBlade {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of `power_up` polls before it reports completion.
        /// `u32::MAX` means never.
        pub fn set_polls_to_power_up(&self, polls: u32) {
            self.polls_to_power_up.set(polls);
        }

        /// Number of `power_down` polls before it reports completion.
        /// `u32::MAX` means never.
        pub fn set_polls_to_power_down(&self, polls: u32) {
            self.polls_to_power_down.set(polls);
        }

        pub fn staged(&self) -> [u8; 3] {
            self.staged.get()
        }

        /// Channel values last pushed to the hardware
        pub fn committed(&self) -> [u8; 3] {
            self.committed.get()
        }

        pub fn io_count(&self) -> u32 {
            self.io_count.get()
        }

        pub fn inits(&self) -> u32 {
            self.inits.get()
        }

        pub fn power_up_polls(&self) -> u32 {
            self.power_up_polls.get()
        }

        pub fn power_down_polls(&self) -> u32 {
            self.power_down_polls.get()
        }

        pub fn last_ramp(&self) -> Option<Duration> {
            self.last_ramp.get()
        }

        pub fn flickers(&self) -> u32 {
            self.flickers.get()
        }

        pub fn last_flicker(&self) -> Option<u8> {
            self.last_flicker.get()
        }
    }

    impl BladeDriver for &MockBlade {
        fn init(&mut self) {
            self.inits.set(self.inits.get() + 1);
        }

        fn set_channel(&mut self, value: u8, channel: usize) {
            let mut staged = self.staged.get();
            if let Some(slot) = staged.get_mut(channel) {
                *slot = value;
            }
            self.staged.set(staged);
        }

        fn perform_io(&mut self) {
            self.committed.set(self.staged.get());
            self.io_count.set(self.io_count.get() + 1);
        }

        fn power_up(&mut self, ramp: Duration) -> bool {
            let polls = self.power_up_polls.get() + 1;
            self.power_up_polls.set(polls);
            self.last_ramp.set(Some(ramp));
            let done = polls >= self.polls_to_power_up.get();
            if done {
                self.committed.set(self.staged.get());
            }
            done
        }

        fn power_down(&mut self, ramp: Duration) -> bool {
            let polls = self.power_down_polls.get() + 1;
            self.power_down_polls.set(polls);
            self.last_ramp.set(Some(ramp));
            let done = polls >= self.polls_to_power_down.get();
            if done {
                self.committed.set([0; 3]);
            }
            done
        }

        fn apply_flicker(&mut self, intensity: u8) {
            self.flickers.set(self.flickers.get() + 1);
            self.last_flicker.set(Some(intensity));
        }
    }
}
