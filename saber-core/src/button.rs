//! Polled push-button with press, hold and release-pulse detection

use embedded_hal::digital::InputPin;
use crate::hal::{ButtonInput, Clock, Duration, HalError, Instant};

/// Push-button between an input line and ground
///
/// The line must already be configured as an input with the internal
/// pull-up enabled, so it idles high and reads low while pressed.
/// Call [`Button::update`] once per control cycle.
pub struct Button<P, C> {
    pin: P,
    clock: C,
    current_pressed: bool,
    last_pressed: bool,
    pulse_edge: bool,
    pressed_at: Instant,
    held_time: Duration,
    pulse_width: Duration,
}

impl<P, C> Button<P, C>
where
    P: InputPin,
    C: Clock,
{
    pub fn new(pin: P, clock: C) -> Self {
        Self {
            pin,
            clock,
            current_pressed: false,
            last_pressed: false,
            pulse_edge: false,
            pressed_at: Instant::from_millis(0),
            held_time: Duration::from_millis(0),
            pulse_width: Duration::from_millis(0),
        }
    }

    /// Clear all edge bookkeeping
    pub fn init(&mut self) {
        self.current_pressed = false;
        self.last_pressed = false;
        self.pulse_edge = false;
        self.pressed_at = Instant::from_millis(0);
        self.held_time = Duration::from_millis(0);
        self.pulse_width = Duration::from_millis(0);
    }

    /// Raw line read. Pressed pulls the line low.
    pub fn read_pressed(&mut self) -> Result<bool, HalError> {
        self.pin.is_low().map_err(|_| HalError::GpioError)
    }

    /// Sample the line and classify the edge
    pub fn update(&mut self) {
        // A failed read holds the previous level so no edge is invented
        let pressed = match self.read_pressed() {
            Ok(pressed) => pressed,
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Button read failed: {}", _e);
                self.last_pressed
            }
        };
        let now = self.clock.now();
        self.current_pressed = pressed;

        match (self.last_pressed, pressed) {
            // Press edge
            (false, true) => {
                self.pressed_at = now;
                self.pulse_width = Duration::from_millis(0);
                self.pulse_edge = false;
                self.held_time = Duration::from_millis(0);
            }
            // Held
            (true, true) => {
                self.held_time = now.saturating_duration_since(self.pressed_at);
            }
            // Release edge
            (true, false) => {
                self.pulse_width = now.saturating_duration_since(self.pressed_at);
                self.pulse_edge = true;
                self.held_time = Duration::from_millis(0);
            }
            // Idle
            (false, false) => {
                self.held_time = Duration::from_millis(0);
                self.pulse_edge = false;
            }
        }

        self.last_pressed = self.current_pressed;
    }

    /// True while pressed and at least one cycle past the press edge
    pub fn is_held(&self) -> bool {
        self.held_time > Duration::from_millis(0)
    }

    pub fn held_time(&self) -> Duration {
        self.held_time
    }

    pub fn pulse_width(&self) -> Duration {
        self.pulse_width
    }

    /// True only on the cycle the release edge was seen
    pub fn is_pulse_edge(&self) -> bool {
        self.pulse_edge
    }

    /// Pressed level seen by the last update
    pub fn is_pressed(&self) -> bool {
        self.current_pressed
    }

    /// Time of the most recent press edge
    pub fn pressed_at(&self) -> Instant {
        self.pressed_at
    }
}

impl<P, C> ButtonInput for Button<P, C>
where
    P: InputPin,
    C: Clock,
{
    fn init(&mut self) {
        Button::init(self)
    }

    fn update(&mut self) {
        Button::update(self)
    }

    fn is_held(&self) -> bool {
        Button::is_held(self)
    }

    fn held_time(&self) -> Duration {
        Button::held_time(self)
    }

    fn pulse_width(&self) -> Duration {
        Button::pulse_width(self)
    }

    fn is_pulse_edge(&self) -> bool {
        Button::is_pulse_edge(self)
    }
}
