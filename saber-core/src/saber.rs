//! Saber mode state machine
//!
//! One handler per [`SaberMode`]. Each handler reads the buttons and the
//! motion manager, drives the sound player and blade, and requests its own
//! transitions through the engine. Three handlers block inside a cycle:
//! power-up waits for the blade ramp, power-down waits for the blade and
//! then for the activation button to be let go, and a clash during a swing
//! waits out the swing settle time while re-sampling motion.

use embedded_hal::delay::DelayNs;
use crate::fsm::{StateBody, StateMachine};
use crate::hal::{
    block_until, BladeDriver, ButtonInput, Clock, Instant, MotionManager, Peripherals, SaberHal,
    SoundPlayer,
};
use crate::types::{Rgb, SaberConfig, SaberMode, Settings, SoundKind};

/// Top-level saber controller
pub struct SaberStateMachine<H: SaberHal> {
    fsm: StateMachine<SaberMode>,
    modes: ModeHandlers<H>,
}

impl<H: SaberHal> SaberStateMachine<H> {
    /// Create a machine in [`SaberMode::Boot`]. Call [`Self::init`] before
    /// the first [`Self::operate`].
    pub fn new(hw: Peripherals<H>, config: SaberConfig, settings: Settings) -> Self {
        Self {
            fsm: StateMachine::new(SaberMode::Boot),
            modes: ModeHandlers {
                hw,
                config,
                settings,
                last_clash_at: Instant::from_millis(0),
                last_swing_at: Instant::from_millis(0),
                hum_started_at: Instant::from_millis(0),
                stale_press: false,
            },
        }
    }

    /// Initialize every collaborator and return to Boot
    pub fn init(&mut self) {
        self.fsm.init(&mut self.modes);
    }

    /// Run one control cycle. Call this from the main loop.
    pub fn operate(&mut self) {
        let _before = self.fsm.state();
        self.fsm.operate(&mut self.modes);

        #[cfg(feature = "defmt")]
        if _before != self.fsm.state() {
            defmt::debug!("Mode: {} -> {}", _before, self.fsm.state());
        }
    }

    /// Request a mode change from outside the mode handlers
    pub fn change_state(&mut self, mode: SaberMode) {
        let now = self.modes.hw.clock.now();
        self.fsm.change_state(mode, now);
    }

    pub fn mode(&self) -> SaberMode {
        self.fsm.state()
    }

    /// Mode that ran during the most recent cycle
    pub fn last_mode(&self) -> Option<SaberMode> {
        self.fsm.last_state()
    }

    pub fn is_new_state(&self) -> bool {
        self.fsm.is_new_state()
    }

    pub fn state_entered_at(&self) -> Instant {
        self.fsm.state_entered_at()
    }

    /// Time of the most recent clash reaction
    pub fn last_clash_at(&self) -> Instant {
        self.modes.last_clash_at
    }

    /// Time the most recent swing sound was started. Only reported, no
    /// mode handler reads it back.
    pub fn last_swing_at(&self) -> Instant {
        self.modes.last_swing_at
    }

    pub fn config(&self) -> &SaberConfig {
        &self.modes.config
    }

    pub fn settings(&self) -> &Settings {
        &self.modes.settings
    }

    pub fn peripherals(&self) -> &Peripherals<H> {
        &self.modes.hw
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals<H> {
        &mut self.modes.hw
    }
}

/// Mode behavior and the timestamps it keeps outside the engine
struct ModeHandlers<H: SaberHal> {
    hw: Peripherals<H>,
    config: SaberConfig,
    settings: Settings,
    last_clash_at: Instant,
    last_swing_at: Instant,
    /// Last hum (re)start; kept apart so relaunching never restamps the mode entry
    hum_started_at: Instant,
    /// Power-down press still down when Off was entered
    stale_press: bool,
}

impl<H: SaberHal> StateBody<SaberMode> for ModeHandlers<H> {
    fn init(&mut self, fsm: &mut StateMachine<SaberMode>) {
        fsm.change_state(SaberMode::Boot, self.hw.clock.now());
        self.stale_press = false;

        self.hw.blade.init();
        self.hw.sound.init();
        self.hw.motion.init();
        self.hw.activation.init();
        self.hw.auxiliary.init();

        // Motion sensor and sound chip need time to wake up
        self.hw.delay.delay_ms(self.config.wake_delay_ms);
        self.hw.sound.set_volume(self.settings.sound_volume);
        self.hw.delay.delay_ms(self.config.wake_delay_ms);
    }

    fn body(&mut self, fsm: &mut StateMachine<SaberMode>) {
        self.hw.motion.update();
        self.hw.activation.update();
        self.hw.auxiliary.update();

        match fsm.state() {
            SaberMode::Boot => self.handle_boot(fsm),
            SaberMode::Off => self.handle_off(fsm),
            SaberMode::PoweringUp => self.handle_powering_up(fsm),
            SaberMode::OnIdle => self.handle_on_idle(fsm),
            SaberMode::Swing => self.handle_swing(fsm),
            SaberMode::PostSwing => self.handle_post_swing(fsm),
            SaberMode::Clash => self.handle_clash(fsm),
            SaberMode::PostClash => self.handle_post_clash(fsm),
            SaberMode::PoweringDown => self.handle_powering_down(fsm),
            // Reserved: no behavior and no way out
            SaberMode::Lockup | SaberMode::Blaster | SaberMode::SwitchProfile | SaberMode::Menu => {}
        }
    }
}

impl<H: SaberHal> ModeHandlers<H> {
    fn now(&self) -> Instant {
        self.hw.clock.now()
    }

    fn change(&self, fsm: &mut StateMachine<SaberMode>, mode: SaberMode) {
        fsm.change_state(mode, self.now());
    }

    fn power_down_requested(&self) -> bool {
        self.hw.activation.is_held() && self.hw.activation.held_time() >= self.config.power_down_hold
    }

    fn stage_color(&mut self, color: Rgb) {
        for (channel, value) in color.channels().iter().enumerate() {
            self.hw.blade.set_channel(*value, channel);
        }
    }

    fn show_color(&mut self, color: Rgb) {
        self.stage_color(color);
        self.hw.blade.perform_io();
    }

    /// Handle Boot: select the font, play the boot sound, go dark
    fn handle_boot(&mut self, fsm: &mut StateMachine<SaberMode>) {
        self.hw.sound.set_font(self.settings.selected_profile);
        self.hw.sound.play_sound(SoundKind::Boot, 0);
        self.hw.delay.delay_ms(self.config.boot_sound_delay_ms);

        self.change(fsm, SaberMode::Off);
    }

    /// Handle Off: a debounced activation tap powers up
    fn handle_off(&mut self, fsm: &mut StateMachine<SaberMode>) {
        let button = &self.hw.activation;
        if self.stale_press {
            // The release of the power-down press is not a tap
            if button.is_pulse_edge() {
                self.stale_press = false;
            }
            return;
        }
        if button.is_pulse_edge() && button.pulse_width() >= self.config.debounce {
            self.change(fsm, SaberMode::PoweringUp);
        }
    }

    /// Handle PoweringUp: blocks until the blade ramp completes
    fn handle_powering_up(&mut self, fsm: &mut StateMachine<SaberMode>) {
        if fsm.is_new_state() {
            #[cfg(feature = "defmt")]
            defmt::info!("Powering up");
        }

        self.hw.sound.play_sound(SoundKind::PowerUp, 0);
        self.stage_color(self.config.idle_color);

        let ramp = self.config.power_up_ramp();
        let policy = self.config.actuator_wait;
        let Peripherals { blade, clock, delay, motion, .. } = &mut self.hw;
        if block_until(&*clock, &mut *delay, policy, || blade.power_up(ramp)).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Blade power-up did not complete, continuing");
        }

        // Re-baseline the motion sensor after the long blocking wait
        for _ in 0..self.config.motion_resync_samples {
            motion.update();
            delay.delay_ms(1);
        }

        self.change(fsm, SaberMode::OnIdle);
    }

    /// Handle OnIdle: power-down, clash, swing, hum relaunch or flicker
    fn handle_on_idle(&mut self, fsm: &mut StateMachine<SaberMode>) {
        if fsm.is_new_state() {
            #[cfg(feature = "defmt")]
            defmt::info!("On");

            self.show_color(self.config.idle_color);
            self.hum_started_at = fsm.state_entered_at();
        }

        let now = self.now();
        let motion = &self.hw.motion;
        if self.power_down_requested() {
            self.change(fsm, SaberMode::PoweringDown);
        } else if motion.is_clash() {
            self.change(fsm, SaberMode::Clash);
        } else if motion.is_swing() && motion.swing_magnitude() > self.config.swing_threshold {
            self.change(fsm, SaberMode::Swing);
        } else if now.saturating_duration_since(self.hum_started_at) >= self.config.hum_relaunch {
            #[cfg(feature = "defmt")]
            defmt::info!("Hum relaunch");

            self.hw.sound.play_sound(SoundKind::Hum, 0);
            self.hum_started_at = now;
        } else {
            self.hw.blade.apply_flicker(self.config.flicker_intensity);
        }
    }

    /// Handle Swing: start one swing sound
    fn handle_swing(&mut self, fsm: &mut StateMachine<SaberMode>) {
        self.hw.sound.play_random_sound(SoundKind::Swing);
        self.last_swing_at = self.now();
        self.change(fsm, SaberMode::PostSwing);
    }

    /// Handle PostSwing: let the swing sound play out
    fn handle_post_swing(&mut self, fsm: &mut StateMachine<SaberMode>) {
        let in_state = fsm.time_in_state(self.now());

        if self.power_down_requested() {
            self.change(fsm, SaberMode::PoweringDown);
        } else if self.hw.motion.is_clash() {
            // Don't jam the sound card with back-to-back requests
            let settle = self.config.post_swing_clash_settle;
            let entered = fsm.state_entered_at();
            while self.now().saturating_duration_since(entered) <= settle {
                self.hw.delay.delay_ms(1);
                self.hw.motion.update();
            }
            self.change(fsm, SaberMode::Clash);
        } else if !self.hw.motion.is_swing() && in_state >= self.config.min_swing_interval {
            self.change(fsm, SaberMode::OnIdle);
        } else if in_state > self.config.max_swing_interval {
            // Long swing: leave so a new swing sound can start
            self.change(fsm, SaberMode::OnIdle);
        }
    }

    /// Handle Clash: flash, then restore the idle color after the pulse
    fn handle_clash(&mut self, fsm: &mut StateMachine<SaberMode>) {
        if fsm.is_new_state() {
            self.last_clash_at = self.now();
            self.hw.sound.play_random_sound(SoundKind::Clash);
            self.show_color(self.config.flash_color);
        }

        if fsm.time_in_state(self.now()) >= self.config.clash_pulse {
            self.show_color(self.config.idle_color);
            self.change(fsm, SaberMode::PostClash);
        }
    }

    /// Handle PostClash: rate-limited clash repeat, otherwise back to idle
    fn handle_post_clash(&mut self, fsm: &mut StateMachine<SaberMode>) {
        let now = self.now();
        let since_clash = now.saturating_duration_since(self.last_clash_at);

        if self.hw.motion.is_clash() && since_clash >= self.config.clash_repeat {
            #[cfg(feature = "defmt")]
            defmt::debug!("Clash repeat, {} ms in PostClash", fsm.time_in_state(now).as_millis());

            self.change(fsm, SaberMode::Clash);
        } else if fsm.time_in_state(now) >= self.config.post_clash_suppress {
            self.change(fsm, SaberMode::OnIdle);
        }
    }

    /// Handle PoweringDown: blocks until the blade is dark and the button is let go
    fn handle_powering_down(&mut self, fsm: &mut StateMachine<SaberMode>) {
        #[cfg(feature = "defmt")]
        defmt::info!("Powering down");

        self.hw.sound.play_sound(SoundKind::PowerDown, 0);

        let ramp = self.config.power_down_time;
        let policy = self.config.actuator_wait;
        let Peripherals { blade, clock, delay, activation, .. } = &mut self.hw;
        if block_until(&*clock, &mut *delay, policy, || blade.power_down(ramp)).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Blade power-down did not complete, continuing");
        }

        // Swallow the rest of the press so Off doesn't see a fresh pulse edge
        let released = block_until(&*clock, &mut *delay, policy, || {
            let busy = activation.is_held() || activation.is_pulse_edge();
            if busy {
                activation.update();
            }
            !busy
        });
        if released.is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Activation button still held, continuing");

            self.stale_press = true;
        }

        self.change(fsm, SaberMode::Off);
    }
}

/// Drive the machine forever at a fixed cadence
#[cfg(feature = "embassy-time")]
pub async fn run<H: SaberHal>(machine: &mut SaberStateMachine<H>, cadence: crate::hal::Duration) -> ! {
    use embassy_time::Ticker;

    machine.init();
    let mut ticker = Ticker::every(cadence);

    loop {
        machine.operate();
        ticker.next().await;
    }
}
