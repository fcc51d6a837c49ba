//! Controller configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// Immutable controller configuration.
///
/// Fields are public so adapters can fill in whichever modes they support;
/// [`validate`](Self::validate) is run by [`Controller::new`](crate::Controller::new).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Total number of discrete brightness levels.
    pub max_brightness_step: u32,
    /// Step used at startup and when a trigger turns the backlight back on.
    pub initial_brightness_step: u32,
    /// Turn the backlight off after `trigger_timeout` without a trigger.
    pub enable_trigger: bool,
    /// Idle time until the backlight is turned off.
    pub trigger_timeout: Duration,
    /// Derive the brightness step from ambient light.
    pub enable_sensor: bool,
    /// Lux value corresponding to step 1.
    pub min_lux: u32,
    /// Lux value corresponding to `max_brightness_step`.
    pub max_lux: u32,
}

impl Configuration {
    /// A configuration with both modes disabled.
    pub fn new(max_brightness_step: u32, initial_brightness_step: u32) -> Self {
        Self {
            max_brightness_step,
            initial_brightness_step,
            enable_trigger: false,
            trigger_timeout: Duration::ZERO,
            enable_sensor: false,
            min_lux: 0,
            max_lux: 0,
        }
    }

    /// Enable trigger mode with the given idle timeout.
    pub fn with_trigger(mut self, timeout: Duration) -> Self {
        self.enable_trigger = true;
        self.trigger_timeout = timeout;
        self
    }

    /// Enable sensor mode over the given lux range.
    pub fn with_sensor(mut self, min_lux: u32, max_lux: u32) -> Self {
        self.enable_sensor = true;
        self.min_lux = min_lux;
        self.max_lux = max_lux;
        self
    }

    /// Check the configuration for values the controller cannot work with.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_brightness_step == 0 {
            return Err(ConfigError::ZeroBrightnessSteps);
        }
        if self.initial_brightness_step == 0
            || self.initial_brightness_step > self.max_brightness_step
        {
            return Err(ConfigError::InitialStepOutOfRange {
                step: self.initial_brightness_step,
                max: self.max_brightness_step,
            });
        }
        if self.enable_trigger && self.trigger_timeout.is_zero() {
            return Err(ConfigError::ZeroTriggerTimeout);
        }
        if self.enable_sensor && (self.max_lux == 0 || self.min_lux > self.max_lux) {
            return Err(ConfigError::InvalidLuxRange {
                min_lux: self.min_lux,
                max_lux: self.max_lux,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_config_is_valid() {
        assert_eq!(Configuration::new(10, 5).validate(), Ok(()));
    }

    #[test]
    fn test_zero_steps() {
        assert_eq!(
            Configuration::new(0, 0).validate(),
            Err(ConfigError::ZeroBrightnessSteps)
        );
    }

    #[test]
    fn test_initial_step_range() {
        assert_eq!(
            Configuration::new(10, 0).validate(),
            Err(ConfigError::InitialStepOutOfRange { step: 0, max: 10 })
        );
        assert_eq!(
            Configuration::new(10, 11).validate(),
            Err(ConfigError::InitialStepOutOfRange { step: 11, max: 10 })
        );
        assert_eq!(Configuration::new(10, 10).validate(), Ok(()));
    }

    #[test]
    fn test_trigger_timeout() {
        let conf = Configuration::new(10, 5).with_trigger(Duration::ZERO);
        assert_eq!(conf.validate(), Err(ConfigError::ZeroTriggerTimeout));

        let conf = Configuration::new(10, 5).with_trigger(Duration::from_nanos(1));
        assert_eq!(conf.validate(), Ok(()));
    }

    #[test]
    fn test_lux_range() {
        let conf = Configuration::new(10, 5).with_sensor(0, 0);
        assert_eq!(
            conf.validate(),
            Err(ConfigError::InvalidLuxRange {
                min_lux: 0,
                max_lux: 0
            })
        );

        let conf = Configuration::new(10, 5).with_sensor(601, 600);
        assert!(conf.validate().is_err());

        let conf = Configuration::new(10, 5).with_sensor(600, 600);
        assert_eq!(conf.validate(), Ok(()));
    }

    #[test]
    fn test_disabled_modes_ignore_their_fields() {
        let mut conf = Configuration::new(10, 5);
        conf.min_lux = 100;
        conf.max_lux = 0;
        assert_eq!(conf.validate(), Ok(()));
    }
}
