//! Device traits and their Linux sysfs implementations.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::error::DeviceError;
use crate::time::Timestamp;

// =============================================================================
// Device Traits
// =============================================================================

/// A backlight that accepts raw brightness values.
///
/// This allows for mock implementations in tests.
pub trait Backlight {
    /// Largest raw value the device accepts.
    fn max_brightness(&self) -> u32;

    /// Raw value currently in effect.
    fn actual_brightness(&self) -> Result<u32, DeviceError>;

    /// Write a raw brightness value (0 = off).
    fn set_brightness(&mut self, value: u32) -> Result<(), DeviceError>;
}

/// A source of activity triggers.
pub trait TriggerSource {
    /// Block for at most `timeout` waiting for a trigger.
    ///
    /// Returns `true` if a trigger fired, `false` on timeout.
    fn wait(&mut self, timeout: Duration) -> Result<bool, DeviceError>;
}

/// An ambient light sensor.
pub trait LightSensor {
    /// Read the current illuminance in lux.
    fn read_lux(&mut self) -> Result<u32, DeviceError>;
}

/// A monotonic time source that can also sleep.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Timestamp;

    /// Block the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

// =============================================================================
// Step Scaling
// =============================================================================

/// Linear mapping between controller steps and raw device values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepScale {
    max_step: u32,
    max_raw: u32,
}

impl StepScale {
    /// Map `1..=max_step` onto `1..=max_raw`. Zero arguments are treated as 1.
    pub fn new(max_step: u32, max_raw: u32) -> Self {
        Self {
            max_step: max_step.max(1),
            max_raw: max_raw.max(1),
        }
    }

    /// Raw device value for `step`. Step 0 is 0, `max_step` is `max_raw`.
    ///
    /// Lit steps never map to 0, even when there are more steps than raw values.
    pub fn to_raw(&self, step: u32) -> u32 {
        if step == 0 {
            return 0;
        }
        let step = u64::from(step.min(self.max_step));
        let raw = step * u64::from(self.max_raw) / u64::from(self.max_step);
        (raw as u32).max(1)
    }

    /// Step for a raw device value, rounded up so any lit value is at least step 1.
    pub fn to_step(&self, raw: u32) -> u32 {
        let raw = u64::from(raw.min(self.max_raw));
        let max_raw = u64::from(self.max_raw);
        ((raw * u64::from(self.max_step)).div_ceil(max_raw)) as u32
    }
}

// =============================================================================
// Sysfs Helpers
// =============================================================================

fn read_attr(path: &Path) -> Result<String, DeviceError> {
    let content = fs::read_to_string(path).map_err(|e| DeviceError::io(path, e))?;
    Ok(content.trim().to_string())
}

fn parse_attr<T: FromStr>(path: &Path) -> Result<T, DeviceError> {
    let value = read_attr(path)?;
    value.parse().map_err(|_| DeviceError::Parse {
        path: path.to_path_buf(),
        value,
    })
}

fn write_attr(path: &Path, value: u32) -> Result<(), DeviceError> {
    fs::write(path, format!("{value}\n")).map_err(|e| DeviceError::io(path, e))
}

// =============================================================================
// SysfsBacklight
// =============================================================================

/// A backlight under `/sys/class/backlight`.
///
/// The device directory must provide `brightness`, `actual_brightness` and
/// `max_brightness`.
#[derive(Debug)]
pub struct SysfsBacklight {
    brightness: PathBuf,
    actual_brightness: PathBuf,
    max_brightness: u32,
}

impl SysfsBacklight {
    /// Open the backlight at `dir`, e.g. `/sys/class/backlight/backlight-lvds`.
    ///
    /// # Errors
    /// Fails if `max_brightness` cannot be read or is 0.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let dir = dir.as_ref();
        let max_brightness: u32 = parse_attr(&dir.join("max_brightness"))?;
        if max_brightness == 0 {
            return Err(DeviceError::ZeroMaxBrightness {
                path: dir.to_path_buf(),
            });
        }
        debug!("backlight {}: max_brightness={}", dir.display(), max_brightness);

        Ok(Self {
            brightness: dir.join("brightness"),
            actual_brightness: dir.join("actual_brightness"),
            max_brightness,
        })
    }
}

impl Backlight for SysfsBacklight {
    fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    fn actual_brightness(&self) -> Result<u32, DeviceError> {
        parse_attr(&self.actual_brightness)
    }

    fn set_brightness(&mut self, value: u32) -> Result<(), DeviceError> {
        debug!("backlight: set brightness {}", value);
        write_attr(&self.brightness, value.min(self.max_brightness))
    }
}

// =============================================================================
// GpioTrigger
// =============================================================================

/// Edge triggers from one or more sysfs GPIO `value` files.
///
/// Each GPIO must already have its `edge` attribute configured (see the
/// kernel's `Documentation/gpio/sysfs.txt`). An edge on any of the lines
/// counts as a trigger.
#[derive(Debug)]
pub struct GpioTrigger {
    lines: Vec<(PathBuf, File)>,
}

impl GpioTrigger {
    /// Open the GPIO at `dir`, e.g. `/sys/class/gpio/gpio12`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, DeviceError> {
        Self::open_all([dir])
    }

    /// Open several GPIOs whose edges are OR-combined.
    pub fn open_all<I, P>(dirs: I) -> Result<Self, DeviceError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut lines = Vec::new();
        for dir in dirs {
            let path = dir.as_ref().join("value");
            let file = File::open(&path).map_err(|e| DeviceError::io(&path, e))?;
            // An unread value file reports an edge straight away.
            rearm(&path, &file)?;
            debug!("interrupt: value: {}", path.display());
            lines.push((path, file));
        }
        Ok(Self { lines })
    }
}

fn rearm(path: &Path, mut file: &File) -> Result<(), DeviceError> {
    let mut buf = [0u8; 8];
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read(&mut buf))
        .map(|_| ())
        .map_err(|e| DeviceError::io(path, e))
}

impl TriggerSource for GpioTrigger {
    fn wait(&mut self, timeout: Duration) -> Result<bool, DeviceError> {
        let poll_timeout = PollTimeout::try_from(timeout)
            .map_err(|_| DeviceError::TimeoutTooLong { timeout })?;

        let fired: Vec<Option<PollFlags>> = {
            let mut fds: Vec<PollFd<'_>> = self
                .lines
                .iter()
                .map(|(_, file)| PollFd::new(file.as_fd(), PollFlags::POLLPRI))
                .collect();

            match poll(&mut fds, poll_timeout) {
                Ok(0) => return Ok(false),
                Ok(_) => fds.iter().map(|fd| fd.revents()).collect(),
                // A signal interrupted the wait; let the caller check for shutdown.
                Err(nix::Error::EINTR) => return Ok(false),
                Err(source) => {
                    let path = self.lines.first().map(|(path, _)| path.clone());
                    return Err(DeviceError::Poll {
                        path: path.unwrap_or_default(),
                        source,
                    });
                }
            }
        };

        let mut triggered = false;
        for ((path, file), revents) in self.lines.iter().zip(fired) {
            let Some(revents) = revents else { continue };
            if revents.contains(PollFlags::POLLPRI) {
                trace!("interrupt: edge on {}", path.display());
                rearm(path, file)?;
                triggered = true;
            } else if !revents.is_empty() {
                return Err(DeviceError::UnexpectedPollEvent { path: path.clone() });
            }
        }
        Ok(triggered)
    }
}

// =============================================================================
// IioLightSensor
// =============================================================================

#[derive(Debug)]
enum Channel {
    Processed(PathBuf),
    Raw {
        raw: PathBuf,
        scale: f64,
        offset: f64,
    },
}

/// An ambient light sensor under `/sys/bus/iio/devices`.
///
/// Uses the processed `in_illuminance_input` channel when available and
/// falls back to `(in_illuminance_raw + offset) * scale`.
#[derive(Debug)]
pub struct IioLightSensor {
    channel: Channel,
}

impl IioLightSensor {
    /// Open the IIO device at `dir`, e.g. `/sys/bus/iio/devices/iio:device0`.
    ///
    /// # Errors
    /// Fails with [`DeviceError::NoIlluminanceChannel`] if the device has no
    /// illuminance attributes.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let dir = dir.as_ref();
        if let Some(input) = find_attr(dir, &["in_illuminance_input", "in_illuminance0_input"]) {
            debug!("sensor: processed channel {}", input.display());
            return Ok(Self {
                channel: Channel::Processed(input),
            });
        }

        let raw = find_attr(dir, &["in_illuminance_raw", "in_illuminance0_raw"]).ok_or_else(|| {
            DeviceError::NoIlluminanceChannel {
                path: dir.to_path_buf(),
            }
        })?;
        let scale = match find_attr(dir, &["in_illuminance_scale", "in_illuminance0_scale"]) {
            Some(path) => parse_attr(&path)?,
            None => 1.0,
        };
        let offset = match find_attr(dir, &["in_illuminance_offset", "in_illuminance0_offset"]) {
            Some(path) => parse_attr(&path)?,
            None => 0.0,
        };
        debug!(
            "sensor: raw channel {} (scale={}, offset={})",
            raw.display(),
            scale,
            offset
        );

        Ok(Self {
            channel: Channel::Raw { raw, scale, offset },
        })
    }
}

fn find_attr(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

fn lux_from_f64(lux: f64) -> u32 {
    // `as` saturates: negative and NaN readings become 0.
    lux.round() as u32
}

impl LightSensor for IioLightSensor {
    fn read_lux(&mut self) -> Result<u32, DeviceError> {
        let lux = match &self.channel {
            Channel::Processed(path) => parse_attr::<f64>(path)?,
            Channel::Raw { raw, scale, offset } => (parse_attr::<f64>(raw)? + offset) * scale,
        };
        Ok(lux_from_f64(lux))
    }
}

// =============================================================================
// MonotonicClock
// =============================================================================

/// Wall-independent clock measuring from its creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock at [`Timestamp::ZERO`].
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.origin.elapsed())
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
