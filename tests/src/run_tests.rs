//! Driver loop tests on the embassy-time mock driver
//!
//! Run with `cargo test -p saber-tests --features embassy`.

use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll, Waker};

use embassy_time::MockDriver;
use saber_core::test_utils::SaberRig;
use saber_core::{run, Duration, SaberConfig, SaberMode, SoundKind};

#[test]
fn test_run_inits_then_operates_once_per_tick() {
    let rig = SaberRig::new();
    let mut saber = rig.machine(SaberConfig::default());
    let driver = MockDriver::get();

    {
        let mut cx = Context::from_waker(Waker::noop());
        let mut driver_loop = pin!(run(&mut saber, Duration::from_millis(10)));

        // First poll runs init and one cycle, then parks on the ticker
        assert!(driver_loop.as_mut().poll(&mut cx).is_pending());
        assert_eq!(rig.blade.inits(), 1);
        assert_eq!(rig.motion.updates(), 1);
        assert_eq!(rig.sound.plays_of(SoundKind::Boot), 1);

        // Not due yet
        driver.advance(Duration::from_millis(5));
        assert!(driver_loop.as_mut().poll(&mut cx).is_pending());
        assert_eq!(rig.motion.updates(), 1);

        driver.advance(Duration::from_millis(5));
        assert!(matches!(driver_loop.as_mut().poll(&mut cx), Poll::Pending));
        assert_eq!(rig.motion.updates(), 2);

        driver.advance(Duration::from_millis(20));
        assert!(driver_loop.as_mut().poll(&mut cx).is_pending());
        assert!(rig.motion.updates() >= 3);
        assert_eq!(rig.blade.inits(), 1);
    }

    assert_eq!(saber.mode(), SaberMode::Off);
}
