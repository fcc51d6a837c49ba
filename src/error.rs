//! Error types for the backlight controller and its device adapters.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while building a [`Controller`](crate::Controller) or one of its parts.
///
/// These only occur at construction. Once a controller exists,
/// [`Controller::evaluate`](crate::Controller::evaluate) cannot fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The configuration asked for zero brightness steps.
    #[error("max brightness step must be at least 1")]
    ZeroBrightnessSteps,

    /// The initial step lies outside `1..=max_brightness_step`.
    #[error("initial brightness step {step} out of range (expected 1-{max})")]
    InitialStepOutOfRange {
        /// The step that was requested.
        step: u32,
        /// The configured maximum step.
        max: u32,
    },

    /// Trigger mode is enabled but the timeout is zero.
    #[error("trigger timeout must be non-zero when trigger is enabled")]
    ZeroTriggerTimeout,

    /// Sensor mode is enabled with an unusable lux range.
    #[error("invalid lux range {min_lux}-{max_lux} (max must be >= 1 and >= min)")]
    InvalidLuxRange {
        /// Lux value mapped to step 1.
        min_lux: u32,
        /// Lux value mapped to the maximum step.
        max_lux: u32,
    },

    /// A sample buffer was requested with no room for samples.
    #[error("sample buffer capacity must be non-zero")]
    ZeroCapacity,
}

/// Errors from the sysfs/IIO device adapters and the control loop.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Reading or writing a device attribute failed.
    #[error("{path}: {source}")]
    Io {
        /// The attribute file involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An attribute did not contain the expected number.
    #[error("{path}: cannot parse {value:?} as a number")]
    Parse {
        /// The attribute file involved.
        path: PathBuf,
        /// The offending content, trimmed.
        value: String,
    },

    /// The device reports a maximum brightness of zero.
    #[error("{path}: max_brightness is 0")]
    ZeroMaxBrightness {
        /// The backlight device directory.
        path: PathBuf,
    },

    /// No illuminance channel was found on an IIO device.
    #[error("{path}: no in_illuminance_input or in_illuminance_raw attribute")]
    NoIlluminanceChannel {
        /// The IIO device directory.
        path: PathBuf,
    },

    /// Polling a GPIO value file failed.
    #[error("{path}: poll: {source}")]
    Poll {
        /// The GPIO value file.
        path: PathBuf,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// The wait is longer than `poll(2)` can express.
    #[error("timeout {timeout:?} is too long to poll for")]
    TimeoutTooLong {
        /// The requested timeout.
        timeout: Duration,
    },

    /// Poll returned without the priority event a GPIO edge produces.
    #[error("{path}: unexpected poll event")]
    UnexpectedPollEvent {
        /// The GPIO value file.
        path: PathBuf,
    },
}

impl DeviceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
