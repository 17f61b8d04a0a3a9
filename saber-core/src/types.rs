//! Core data types for the saber controller

use crate::hal::Duration;

/// Minimum activation pulse accepted as a power-on request
pub const SWITCH_DEBOUNCE_MS: u64 = 50;
/// Activation hold time that requests power-down
pub const POWER_DOWN_SWITCH_MS: u64 = 1500;
/// Shortest time spent in PostSwing before returning to idle
pub const MIN_SWING_INTERVAL_MS: u64 = 200;
/// Longest time spent in PostSwing before a new swing sound may start
pub const MAX_SWING_INTERVAL_MS: u64 = 1000;
/// How long the blade shows the flash color after a clash
pub const CLASH_PULSE_MS: u64 = 100;
/// Minimum spacing between two clash reactions
pub const CLASH_REPEAT_MS: u64 = 200;
/// Time spent in PostClash before returning to idle
pub const POST_CLASH_SUPPRESS_MS: u64 = 1000;
pub const POWER_UP_MS: u64 = 1000;
/// Subtracted from the power-up time to get the blade ramp budget
pub const POWER_UP_MARGIN_MS: u64 = 5;
pub const POWER_DOWN_MS: u64 = 1000;
/// Idle time after which the hum is relaunched
pub const HUM_RELAUNCH_MS: u64 = 30_000;
/// Settle time before a clash interrupts a swing sound
pub const POST_SWING_CLASH_SETTLE_MS: u64 = 100;
pub const BLADE_FLICKER: u8 = 1;
/// Motion samples taken after power-up to re-baseline the sensor
pub const MOTION_RESYNC_SAMPLES: u8 = 6;
/// Wake-up delay given to the motion sensor and sound chip during init
pub const WAKE_DELAY_MS: u32 = 100;
/// Pause after starting the boot sound
pub const BOOT_SOUND_DELAY_MS: u32 = 100;
pub const DEFAULT_VOLUME: u8 = 15;

/// Saber operating modes
///
/// Lockup, Blaster, SwitchProfile and Menu are reserved: entering them is
/// allowed but they do nothing and never leave on their own.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaberMode {
    Boot,
    Off,
    PoweringUp,
    OnIdle,
    Swing,
    PostSwing,
    Clash,
    PostClash,
    Lockup,
    Blaster,
    PoweringDown,
    SwitchProfile,
    Menu,
}

impl SaberMode {
    pub const ALL: [SaberMode; 13] = [
        SaberMode::Boot,
        SaberMode::Off,
        SaberMode::PoweringUp,
        SaberMode::OnIdle,
        SaberMode::Swing,
        SaberMode::PostSwing,
        SaberMode::Clash,
        SaberMode::PostClash,
        SaberMode::Lockup,
        SaberMode::Blaster,
        SaberMode::PoweringDown,
        SaberMode::SwitchProfile,
        SaberMode::Menu,
    ];

    /// Returns true for placeholder modes with no behavior
    pub const fn is_reserved(&self) -> bool {
        matches!(
            self,
            SaberMode::Lockup | SaberMode::Blaster | SaberMode::SwitchProfile | SaberMode::Menu
        )
    }

    pub const fn name(&self) -> &'static str {
        match self {
            SaberMode::Boot => "Boot",
            SaberMode::Off => "Off",
            SaberMode::PoweringUp => "PoweringUp",
            SaberMode::OnIdle => "OnIdle",
            SaberMode::Swing => "Swing",
            SaberMode::PostSwing => "PostSwing",
            SaberMode::Clash => "Clash",
            SaberMode::PostClash => "PostClash",
            SaberMode::Lockup => "Lockup",
            SaberMode::Blaster => "Blaster",
            SaberMode::PoweringDown => "PoweringDown",
            SaberMode::SwitchProfile => "SwitchProfile",
            SaberMode::Menu => "Menu",
        }
    }
}

/// Sound categories understood by the sound player
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SoundKind {
    Boot,
    PowerUp,
    PowerDown,
    Hum,
    Swing,
    Clash,
}

/// Swing strength reported by the motion manager, ordered weakest first
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwingMagnitude {
    #[default]
    None,
    Small,
    Medium,
    Large,
}

/// Blade color as three channel values
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channel values in blade channel order
    pub const fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// How long blocking actuator and button waits may run
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WaitPolicy {
    /// Wait until the collaborator reports completion, however long it takes
    Unbounded,
    /// Give up after the given time and carry on with the transition
    Bounded(Duration),
}

/// User settings supplied at construction
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Selected profile, used as the sound font id
    pub selected_profile: u8,
    pub sound_volume: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_profile: 0,
            sound_volume: DEFAULT_VOLUME,
        }
    }
}

/// Saber timing and appearance parameters
#[derive(Copy, Clone, Debug)]
pub struct SaberConfig {
    /// Minimum activation pulse that powers the saber up
    pub debounce: Duration,
    /// Activation hold time that powers the saber down
    pub power_down_hold: Duration,
    pub min_swing_interval: Duration,
    pub max_swing_interval: Duration,
    pub clash_pulse: Duration,
    pub clash_repeat: Duration,
    pub post_clash_suppress: Duration,
    pub power_up_time: Duration,
    pub power_up_margin: Duration,
    pub power_down_time: Duration,
    pub hum_relaunch: Duration,
    pub post_swing_clash_settle: Duration,
    /// Swings must be stronger than this to start a swing sound
    pub swing_threshold: SwingMagnitude,
    pub flicker_intensity: u8,
    pub motion_resync_samples: u8,
    pub wake_delay_ms: u32,
    pub boot_sound_delay_ms: u32,
    pub idle_color: Rgb,
    /// Color shown for the clash pulse
    pub flash_color: Rgb,
    /// Applies to the power-up, power-down and button-release waits
    pub actuator_wait: WaitPolicy,
}

impl Default for SaberConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(SWITCH_DEBOUNCE_MS),
            power_down_hold: Duration::from_millis(POWER_DOWN_SWITCH_MS),
            min_swing_interval: Duration::from_millis(MIN_SWING_INTERVAL_MS),
            max_swing_interval: Duration::from_millis(MAX_SWING_INTERVAL_MS),
            clash_pulse: Duration::from_millis(CLASH_PULSE_MS),
            clash_repeat: Duration::from_millis(CLASH_REPEAT_MS),
            post_clash_suppress: Duration::from_millis(POST_CLASH_SUPPRESS_MS),
            power_up_time: Duration::from_millis(POWER_UP_MS),
            power_up_margin: Duration::from_millis(POWER_UP_MARGIN_MS),
            power_down_time: Duration::from_millis(POWER_DOWN_MS),
            hum_relaunch: Duration::from_millis(HUM_RELAUNCH_MS),
            post_swing_clash_settle: Duration::from_millis(POST_SWING_CLASH_SETTLE_MS),
            swing_threshold: SwingMagnitude::Small,
            flicker_intensity: BLADE_FLICKER,
            motion_resync_samples: MOTION_RESYNC_SAMPLES,
            wake_delay_ms: WAKE_DELAY_MS,
            boot_sound_delay_ms: BOOT_SOUND_DELAY_MS,
            idle_color: Rgb::new(255, 0, 0),
            flash_color: Rgb::new(255, 255, 0),
            actuator_wait: WaitPolicy::Unbounded,
        }
    }
}

impl SaberConfig {
    /// Create a configuration with custom colors and wait policy, with validation
    pub fn new(idle_color: Rgb, flash_color: Rgb, actuator_wait: WaitPolicy) -> Result<Self, &'static str> {
        let config = Self {
            idle_color,
            flash_color,
            actuator_wait,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the timing relationships the state machine relies on
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.power_up_margin >= self.power_up_time {
            return Err("Power-up margin must be shorter than power-up time");
        }
        if self.min_swing_interval > self.max_swing_interval {
            return Err("Minimum swing interval must not exceed maximum");
        }
        if self.clash_pulse > self.post_clash_suppress {
            return Err("Clash pulse must not exceed post-clash suppression");
        }
        if self.motion_resync_samples == 0 {
            return Err("At least one motion resync sample is required");
        }
        if self.actuator_wait == WaitPolicy::Bounded(Duration::from_millis(0)) {
            return Err("Bounded wait limit must be non-zero");
        }
        Ok(())
    }

    /// Ramp budget handed to the blade during power-up, zero when the
    /// margin eats the whole power-up time
    pub fn power_up_ramp(&self) -> Duration {
        Duration::from_millis(
            self.power_up_time
                .as_millis()
                .saturating_sub(self.power_up_margin.as_millis()),
        )
    }
}
