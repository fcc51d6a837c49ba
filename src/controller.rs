//! Brightness decision state machine.

use log::debug;

use crate::config::Configuration;
use crate::error::ConfigError;
use crate::ringbuf::MovingAverageBuffer;
use crate::state::ControllerState;
use crate::time::Timestamp;

/// Number of lux samples averaged by the controller.
pub const SAMPLE_CAPACITY: usize = 10;

/// What the caller has to do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Nothing changed.
    #[default]
    None,
    /// Write [`Controller::current_brightness`] to the backlight.
    SetBrightness,
}

/// The brightness controller.
///
/// Owns the configuration, the current brightness step, the time of the last
/// trigger and, in sensor mode, the lux sample buffer. It never touches a
/// device: the caller feeds it one tick at a time through
/// [`evaluate`](Self::evaluate) and applies the returned [`Action`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use libbacklight::{Action, Configuration, Controller, Timestamp};
///
/// let conf = Configuration::new(10, 5).with_trigger(Duration::from_secs(10));
/// let mut ctrl = Controller::new(Timestamp::ZERO, conf)?;
///
/// assert_eq!(ctrl.evaluate(Timestamp::from_secs(9), false, 0), Action::None);
/// assert_eq!(ctrl.evaluate(Timestamp::from_secs(10), false, 0), Action::SetBrightness);
/// assert_eq!(ctrl.current_brightness(), 0);
/// # Ok::<(), libbacklight::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Controller {
    conf: Configuration,
    last_trigger: Timestamp,
    brightness_step: u32,
    lux_per_step: u32,
    samples: Option<MovingAverageBuffer>,
}

impl Controller {
    /// Create a controller starting at `initial_brightness_step`.
    ///
    /// In sensor mode the sample buffer is pre-filled with the lux value of
    /// the initial step, so the first real readings are not averaged against
    /// zeros.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `conf` fails [`Configuration::validate`].
    pub fn new(now: Timestamp, conf: Configuration) -> Result<Self, ConfigError> {
        conf.validate()?;

        let divisor = conf.max_brightness_step.saturating_sub(1).max(1);
        // Ranges narrower than the step count would give 0 and divide by zero
        // in lux_to_step.
        let lux_per_step = (conf.max_lux.saturating_sub(conf.min_lux) / divisor).max(1);

        let mut ctrl = Self {
            brightness_step: conf.initial_brightness_step,
            last_trigger: now,
            lux_per_step,
            samples: None,
            conf,
        };

        if ctrl.conf.enable_sensor {
            let mut samples = MovingAverageBuffer::new(SAMPLE_CAPACITY)?;
            samples.fill(ctrl.step_to_lux(ctrl.conf.initial_brightness_step));
            ctrl.samples = Some(samples);
        }

        debug!(
            "controller created: step={}/{}, trigger={}, sensor={}, lux_per_step={}",
            ctrl.brightness_step,
            ctrl.conf.max_brightness_step,
            ctrl.conf.enable_trigger,
            ctrl.conf.enable_sensor,
            ctrl.lux_per_step
        );
        Ok(ctrl)
    }

    /// Process one tick.
    ///
    /// `triggered` is ignored unless trigger mode is enabled and `lux` is
    /// ignored unless sensor mode is enabled. Trigger handling runs first;
    /// the sensor then works from the resulting step. Any change made during
    /// the tick is reported as a single [`Action::SetBrightness`].
    #[must_use]
    pub fn evaluate(&mut self, now: Timestamp, triggered: bool, lux: u32) -> Action {
        let before = self.brightness_step;

        if self.conf.enable_trigger {
            self.handle_trigger(now, triggered);
        }
        if self.conf.enable_sensor {
            self.handle_sensor(lux);
        }

        if self.brightness_step == before {
            Action::None
        } else {
            Action::SetBrightness
        }
    }

    fn handle_trigger(&mut self, now: Timestamp, triggered: bool) {
        if triggered {
            self.last_trigger = now;
            if self.brightness_step == 0 {
                self.brightness_step = self.conf.initial_brightness_step;
                debug!("trigger: backlight on at step {}", self.brightness_step);
            }
        } else if self.brightness_step > 0 {
            let idle = now.abs_diff(self.last_trigger);
            if idle >= self.conf.trigger_timeout {
                debug!("trigger: idle for {:?}, backlight off", idle);
                self.brightness_step = 0;
            }
        }
    }

    fn handle_sensor(&mut self, lux: u32) {
        let Some(samples) = self.samples.as_mut() else {
            return;
        };
        samples.push(lux);
        let Some(average) = samples.average() else {
            return;
        };

        // The sensor only adjusts a lit backlight.
        if self.brightness_step == 0 {
            return;
        }

        let step = self.lux_to_step(average);
        if step != self.brightness_step {
            debug!(
                "sensor: average {} lux, step {} -> {}",
                average, self.brightness_step, step
            );
            self.brightness_step = step;
        }
    }

    /// Lux value at the bottom of `step`'s bucket.
    pub fn step_to_lux(&self, step: u32) -> u32 {
        let offset = u64::from(self.lux_per_step) * u64::from(step.saturating_sub(1));
        (u64::from(self.conf.min_lux) + offset).min(u64::from(u32::MAX)) as u32
    }

    /// Brightness step for an ambient `lux` value.
    ///
    /// Values at or above `max_lux` give the maximum step, values below
    /// `min_lux` give step 1. In between the mapping truncates, so every
    /// `lux_per_step` wide bucket shares one step.
    pub fn lux_to_step(&self, lux: u32) -> u32 {
        let max_step = self.conf.max_brightness_step;
        if lux >= self.conf.max_lux {
            return max_step;
        }
        if lux < self.conf.min_lux {
            return 1;
        }
        ((lux - self.conf.min_lux) / self.lux_per_step + 1).min(max_step)
    }

    /// Current brightness step (0 = off).
    pub fn current_brightness(&self) -> u32 {
        self.brightness_step
    }

    /// The configuration this controller was created with.
    pub fn configuration(&self) -> &Configuration {
        &self.conf
    }

    /// Width of one brightness step in lux.
    pub fn lux_per_step(&self) -> u32 {
        self.lux_per_step
    }

    /// Moving average of the recent lux samples, if sensor mode is enabled.
    pub fn average_lux(&self) -> Option<u32> {
        self.samples.as_ref().and_then(MovingAverageBuffer::average)
    }

    /// Get a snapshot of the current controller state.
    pub fn snapshot(&self) -> ControllerState {
        ControllerState {
            brightness_step: self.brightness_step,
            last_trigger_time: self.last_trigger,
            average_lux: self.average_lux(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn secs(s: u64) -> Timestamp {
        Timestamp::from_secs(s)
    }

    fn trigger_conf() -> Configuration {
        Configuration::new(10, 5).with_trigger(Duration::from_secs(10))
    }

    fn sensor_conf() -> Configuration {
        Configuration::new(10, 5).with_sensor(42, 600)
    }

    #[test]
    fn test_create_simple() {
        let ctrl = Controller::new(secs(0), Configuration::new(10, 5)).unwrap();
        assert_eq!(ctrl.current_brightness(), 5);
        assert_eq!(ctrl.configuration().max_brightness_step, 10);
        assert_eq!(ctrl.average_lux(), None);
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let err = Controller::new(secs(0), Configuration::new(0, 0)).unwrap_err();
        assert_eq!(err, ConfigError::ZeroBrightnessSteps);

        let conf = Configuration::new(10, 5).with_trigger(Duration::ZERO);
        let err = Controller::new(secs(0), conf).unwrap_err();
        assert_eq!(err, ConfigError::ZeroTriggerTimeout);

        let conf = Configuration::new(10, 5).with_sensor(10, 0);
        assert!(matches!(
            Controller::new(secs(0), conf),
            Err(ConfigError::InvalidLuxRange { .. })
        ));
    }

    #[test]
    fn test_trigger_timeout() {
        let mut ctrl = Controller::new(secs(0), trigger_conf()).unwrap();

        for i in 0..10 {
            assert_eq!(ctrl.evaluate(secs(i), false, 0), Action::None);
            assert_eq!(ctrl.current_brightness(), 5);
        }

        assert_eq!(ctrl.evaluate(secs(10), false, 0), Action::SetBrightness);
        assert_eq!(ctrl.current_brightness(), 0);
    }

    #[test]
    fn test_trigger_timeline() {
        let mut ctrl = Controller::new(secs(0), trigger_conf()).unwrap();

        assert_eq!(ctrl.evaluate(secs(9), false, 0), Action::None);
        assert_eq!(ctrl.current_brightness(), 5);

        assert_eq!(ctrl.evaluate(secs(10), false, 0), Action::SetBrightness);
        assert_eq!(ctrl.current_brightness(), 0);

        assert_eq!(ctrl.evaluate(secs(10), true, 0), Action::SetBrightness);
        assert_eq!(ctrl.current_brightness(), 5);

        assert_eq!(ctrl.evaluate(secs(21), false, 0), Action::SetBrightness);
        assert_eq!(ctrl.current_brightness(), 0);
    }

    #[test]
    fn test_settled_off_is_idempotent() {
        let mut ctrl = Controller::new(secs(0), trigger_conf()).unwrap();
        assert_eq!(ctrl.evaluate(secs(10), false, 0), Action::SetBrightness);

        for _ in 0..5 {
            assert_eq!(ctrl.evaluate(secs(10), false, 0), Action::None);
            assert_eq!(ctrl.current_brightness(), 0);
        }
        assert_eq!(ctrl.evaluate(secs(100), false, 0), Action::None);
    }

    #[test]
    fn test_trigger_while_on_extends_timeout() {
        let mut ctrl = Controller::new(secs(0), trigger_conf()).unwrap();

        assert_eq!(ctrl.evaluate(secs(8), true, 0), Action::None);
        assert_eq!(ctrl.snapshot().last_trigger_time, secs(8));
        assert_eq!(ctrl.evaluate(secs(17), false, 0), Action::None);
        assert_eq!(ctrl.evaluate(secs(18), false, 0), Action::SetBrightness);
    }

    #[test]
    fn test_subsecond_timeout_boundary() {
        let conf = Configuration::new(10, 5).with_trigger(Duration::from_millis(1_500));
        let mut ctrl = Controller::new(Timestamp::from_millis(900), conf).unwrap();

        assert_eq!(
            ctrl.evaluate(Timestamp::from_millis(2_399), false, 0),
            Action::None
        );
        assert_eq!(
            ctrl.evaluate(Timestamp::from_millis(2_400), false, 0),
            Action::SetBrightness
        );
    }

    #[test]
    fn test_out_of_order_timestamp_uses_distance() {
        let mut ctrl = Controller::new(secs(0), trigger_conf()).unwrap();
        assert_eq!(ctrl.evaluate(secs(100), true, 0), Action::None);

        assert_eq!(ctrl.evaluate(secs(95), false, 0), Action::None);
        assert_eq!(ctrl.evaluate(secs(90), false, 0), Action::SetBrightness);
    }

    #[test]
    fn test_trigger_ignored_when_disabled() {
        let mut ctrl = Controller::new(secs(0), Configuration::new(10, 5)).unwrap();
        assert_eq!(ctrl.evaluate(secs(1_000), false, 0), Action::None);
        assert_eq!(ctrl.evaluate(secs(1_001), true, 0), Action::None);
        assert_eq!(ctrl.current_brightness(), 5);
    }

    #[test]
    fn test_lux_per_step() {
        let ctrl = Controller::new(secs(0), sensor_conf()).unwrap();
        assert_eq!(ctrl.lux_per_step(), 62);
        assert_eq!(ctrl.step_to_lux(5), 290);
        assert_eq!(ctrl.average_lux(), Some(290));
    }

    #[test]
    fn test_lux_to_step_boundaries() {
        let ctrl = Controller::new(secs(0), sensor_conf()).unwrap();

        assert_eq!(ctrl.lux_to_step(42), 1);
        assert_eq!(ctrl.lux_to_step(0), 1);
        assert_eq!(ctrl.lux_to_step(41), 1);
        assert_eq!(ctrl.lux_to_step(600), 10);
        assert_eq!(ctrl.lux_to_step(601), 10);
        assert_eq!(ctrl.lux_to_step(u32::MAX), 10);
        // Buckets are 62 lux wide and truncate.
        assert_eq!(ctrl.lux_to_step(103), 1);
        assert_eq!(ctrl.lux_to_step(104), 2);
        assert_eq!(ctrl.lux_to_step(599), 9);
    }

    #[test]
    fn test_narrow_lux_range_still_maps() {
        // 3 lux across 10 steps: buckets are 1 lux wide and the top steps
        // are only reachable at max_lux.
        let conf = Configuration::new(10, 1).with_sensor(10, 13);
        let ctrl = Controller::new(secs(0), conf).unwrap();
        assert_eq!(ctrl.lux_per_step(), 1);
        assert_eq!(ctrl.lux_to_step(10), 1);
        assert_eq!(ctrl.lux_to_step(12), 3);
        assert_eq!(ctrl.lux_to_step(13), 10);
    }

    #[test]
    fn test_single_step() {
        let conf = Configuration::new(1, 1).with_sensor(0, 100);
        let mut ctrl = Controller::new(secs(0), conf).unwrap();
        assert_eq!(ctrl.lux_to_step(0), 1);
        assert_eq!(ctrl.lux_to_step(50), 1);
        assert_eq!(ctrl.lux_to_step(100), 1);
        for i in 0..20 {
            assert_eq!(ctrl.evaluate(secs(i), false, 100), Action::None);
        }
    }

    #[test]
    fn test_sensor_converges_to_min() {
        let mut ctrl = Controller::new(secs(0), sensor_conf()).unwrap();
        for i in 0..100 {
            let _ = ctrl.evaluate(secs(i), false, 42);
        }
        assert_eq!(ctrl.current_brightness(), 1);
        assert_eq!(ctrl.average_lux(), Some(42));
    }

    #[test]
    fn test_sensor_converges_to_max() {
        let mut ctrl = Controller::new(secs(0), sensor_conf()).unwrap();
        for i in 0..100 {
            let _ = ctrl.evaluate(secs(i), false, 600);
        }
        assert_eq!(ctrl.current_brightness(), 10);
    }

    #[test]
    fn test_sensor_initial_lux_is_stable() {
        let mut ctrl = Controller::new(secs(0), sensor_conf()).unwrap();
        let lux = ctrl.step_to_lux(5);
        for i in 0..100 {
            assert_eq!(ctrl.evaluate(secs(i), false, lux), Action::None);
            assert_eq!(ctrl.current_brightness(), 5);
        }
    }

    #[test]
    fn test_sensor_smooths_single_spike() {
        let mut ctrl = Controller::new(secs(0), sensor_conf()).unwrap();
        // (9 * 290 + 600) / 10 = 321 -> step 5
        assert_eq!(ctrl.evaluate(secs(0), false, 600), Action::None);
        assert_eq!(ctrl.current_brightness(), 5);
    }

    #[test]
    fn test_sensor_first_change() {
        let mut ctrl = Controller::new(secs(0), sensor_conf()).unwrap();
        // (9 * 290 + 42) / 10 = 265 -> step 4
        assert_eq!(ctrl.evaluate(secs(0), false, 42), Action::SetBrightness);
        assert_eq!(ctrl.current_brightness(), 4);
    }

    #[test]
    fn test_sensor_never_switches_on() {
        let conf = sensor_conf().with_trigger(Duration::from_secs(10));
        let mut ctrl = Controller::new(secs(0), conf).unwrap();

        assert_eq!(ctrl.evaluate(secs(10), false, 290), Action::SetBrightness);
        assert_eq!(ctrl.current_brightness(), 0);

        for i in 11..40 {
            assert_eq!(ctrl.evaluate(secs(i), false, 600), Action::None);
            assert_eq!(ctrl.current_brightness(), 0);
        }
        assert_eq!(ctrl.average_lux(), Some(600));
    }

    #[test]
    fn test_trigger_restore_uses_fresh_average() {
        let conf = sensor_conf().with_trigger(Duration::from_secs(10));
        let mut ctrl = Controller::new(secs(0), conf).unwrap();

        assert_eq!(ctrl.evaluate(secs(10), false, 600), Action::SetBrightness);
        for i in 11..30 {
            let _ = ctrl.evaluate(secs(i), false, 600);
        }

        // Restore to step 5 and adjust to the bright average in one tick.
        assert_eq!(ctrl.evaluate(secs(30), true, 600), Action::SetBrightness);
        assert_eq!(ctrl.current_brightness(), 10);
    }

    #[test]
    fn test_trigger_restore_without_sensor_change() {
        let conf = sensor_conf().with_trigger(Duration::from_secs(10));
        let mut ctrl = Controller::new(secs(0), conf).unwrap();

        assert_eq!(ctrl.evaluate(secs(10), false, 290), Action::SetBrightness);
        assert_eq!(ctrl.evaluate(secs(11), true, 290), Action::SetBrightness);
        assert_eq!(ctrl.current_brightness(), 5);
    }

    #[test]
    fn test_snapshot() {
        let conf = sensor_conf().with_trigger(Duration::from_secs(10));
        let ctrl = Controller::new(secs(3), conf).unwrap();
        let state = ctrl.snapshot();
        assert!(state.is_on());
        assert_eq!(state.brightness_step, 5);
        assert_eq!(state.last_trigger_time, secs(3));
        assert_eq!(state.average_lux, Some(290));
    }

    proptest! {
        #[test]
        fn prop_step_lux_round_trip(
            max_step in 1u32..200,
            min_lux in 0u32..10_000,
            span in 0u32..100_000,
        ) {
            let max_lux = (min_lux + span).max(1);
            let conf = Configuration::new(max_step, 1).with_sensor(min_lux, max_lux);
            let ctrl = Controller::new(secs(0), conf).unwrap();

            for step in 1..=max_step {
                let lux = ctrl.step_to_lux(step);
                let back = ctrl.lux_to_step(lux);
                if lux >= max_lux {
                    // Collapsed into the top bucket.
                    prop_assert_eq!(back, max_step);
                } else {
                    prop_assert_eq!(back, step);
                }
            }
        }

        #[test]
        fn prop_step_stays_in_range(
            lux in proptest::collection::vec(any::<u32>(), 1..50),
            triggers in proptest::collection::vec(any::<bool>(), 1..50),
        ) {
            let conf = sensor_conf().with_trigger(Duration::from_secs(3));
            let mut ctrl = Controller::new(secs(0), conf).unwrap();
            for (i, (lux, triggered)) in lux.iter().zip(triggers.iter()).enumerate() {
                let before = ctrl.current_brightness();
                let action = ctrl.evaluate(secs(i as u64), *triggered, *lux);
                let after = ctrl.current_brightness();
                prop_assert!(after <= 10);
                prop_assert_eq!(action == Action::SetBrightness, before != after);
            }
        }
    }
}
