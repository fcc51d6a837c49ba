//! Automatic backlight control for embedded Linux devices.
//!
//! This crate decides whether a display backlight should be off, on at a
//! remembered level, or adjusted to the ambient light. It reacts to activity
//! triggers (typically a GPIO edge) and to lux readings from an ambient light
//! sensor, smoothed by a moving average.
//!
//! The decision logic lives in [`Controller`], which never does I/O: the
//! caller feeds it one tick at a time and applies the returned [`Action`].
//! [`Daemon`] is that caller for sysfs devices.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use libbacklight::{Action, Configuration, Controller, Timestamp};
//!
//! fn main() -> Result<(), libbacklight::ConfigError> {
//!     let conf = Configuration::new(10, 5)
//!         .with_trigger(Duration::from_secs(30))
//!         .with_sensor(42, 600);
//!     let mut ctrl = Controller::new(Timestamp::ZERO, conf)?;
//!
//!     // A dark room pulls the brightness down over a few ticks.
//!     for t in 0..20 {
//!         if ctrl.evaluate(Timestamp::from_secs(t), false, 42) == Action::SetBrightness {
//!             println!("t={}s: step {}", t, ctrl.current_brightness());
//!         }
//!     }
//!     assert_eq!(ctrl.current_brightness(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Running against hardware
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::time::Duration;
//! use libbacklight::{
//!     Backlight, Configuration, Controller, Daemon, GpioTrigger, MonotonicClock,
//!     SysfsBacklight,
//! };
//!
//! let backlight = SysfsBacklight::open("/sys/class/backlight/backlight-lvds")?;
//! let clock = MonotonicClock::new();
//! let conf = Configuration::new(backlight.max_brightness(), backlight.max_brightness())
//!     .with_trigger(Duration::from_secs(30));
//! let ctrl = Controller::new(libbacklight::Clock::now(&clock), conf)?;
//!
//! let shutdown = AtomicBool::new(false);
//! Daemon::new(ctrl, backlight, clock)
//!     .with_trigger(GpioTrigger::open("/sys/class/gpio/gpio12")?)
//!     .run(&shutdown)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Testing
//!
//! Use the [`mock`] devices to drive a [`Daemon`] without hardware:
//!
//! ```
//! use std::time::Duration;
//! use libbacklight::{Clock, Configuration, Controller, Daemon};
//! use libbacklight::mock::{ManualClock, MockBacklight, ScriptedTrigger};
//!
//! let clock = ManualClock::new();
//! let conf = Configuration::new(10, 10).with_trigger(Duration::from_secs(1));
//! let ctrl = Controller::new(clock.now(), conf).unwrap();
//! let backlight = MockBacklight::new(255, 255);
//! let mut daemon = Daemon::new(ctrl, backlight.clone(), clock.clone())
//!     .with_trigger(ScriptedTrigger::new(clock, []));
//!
//! for _ in 0..10 {
//!     daemon.tick().unwrap();
//! }
//! assert_eq!(backlight.writes(), vec![0]);
//! ```

#![warn(missing_docs)]

mod config;
mod controller;
mod daemon;
mod device;
mod error;
pub mod mock;
mod ringbuf;
mod state;
mod time;

// Re-export public API
pub use config::Configuration;
pub use controller::{Action, Controller, SAMPLE_CAPACITY};
pub use daemon::{DEFAULT_POLL_INTERVAL, Daemon};
pub use device::{
    Backlight, Clock, GpioTrigger, IioLightSensor, LightSensor, MonotonicClock, StepScale,
    SysfsBacklight, TriggerSource,
};
pub use error::{ConfigError, DeviceError};
pub use mock::MockBacklight;
pub use ringbuf::MovingAverageBuffer;
pub use state::ControllerState;
pub use time::Timestamp;
