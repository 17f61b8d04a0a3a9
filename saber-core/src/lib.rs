#![cfg_attr(not(feature = "std"), no_std)]

//! # Saber Core
//!
//! Decision core of a prop saber controller: debounced push-buttons, a
//! generic state machine engine and the saber mode machine that turns
//! button, motion and time signals into sound and blade commands.

pub mod types;
pub mod hal;
pub mod button;
pub mod fsm;
pub mod saber;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;


pub use types::*;
pub use fsm::*;
pub use button::*;
pub use saber::*;
pub use hal::{*, Instant, Duration};

/// Saber core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration: stock timings, red blade, yellow clash flash
pub fn default_config() -> SaberConfig {
    SaberConfig::default()
}
