use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};
use libbacklight::{Configuration, DEFAULT_POLL_INTERVAL, StepScale};
use serde::{Deserialize, Serialize};

/// Trigger timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Settings as written in the config file or given on the command line.
///
/// Every field is optional so a file and the command line can be layered
/// with [`RawConfig::merge`].
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Backlight sysfs device directory.
    pub backlight: Option<PathBuf>,

    /// GPIO sysfs directories used as triggers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interrupts: Vec<PathBuf>,

    /// IIO ambient light sensor directory.
    pub sensor: Option<PathBuf>,

    /// Number of brightness steps (defaults to the device's max_brightness).
    pub steps: Option<u32>,

    /// Step used at startup and after a trigger.
    pub initial_step: Option<u32>,

    /// Idle time until the backlight is turned off, e.g. "30s".
    pub timeout: Option<String>,

    /// Lux value mapped to step 1.
    pub min_lux: Option<u32>,

    /// Lux value mapped to the highest step.
    pub max_lux: Option<u32>,

    /// Time between ticks, e.g. "100ms".
    pub poll_interval: Option<String>,
}

impl RawConfig {
    /// Parse the config file at the specified path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file at {:?}", path))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .context("Failed to read config file to string")?;
        toml::from_str(&contents).context(format!("Failed to parse config file at {:?}", path))
    }

    pub fn example() -> Self {
        Self {
            backlight: Some(PathBuf::from("/sys/class/backlight/backlight-lvds")),
            interrupts: vec![PathBuf::from("/sys/class/gpio/gpio12")],
            sensor: Some(PathBuf::from("/sys/bus/iio/devices/iio:device0")),
            steps: Some(10),
            initial_step: Some(5),
            timeout: Some("30s".to_string()),
            min_lux: Some(42),
            max_lux: Some(600),
            poll_interval: Some("100ms".to_string()),
        }
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: RawConfig) -> Self {
        Self {
            backlight: overrides.backlight.or(self.backlight),
            interrupts: if overrides.interrupts.is_empty() {
                self.interrupts
            } else {
                overrides.interrupts
            },
            sensor: overrides.sensor.or(self.sensor),
            steps: overrides.steps.or(self.steps),
            initial_step: overrides.initial_step.or(self.initial_step),
            timeout: overrides.timeout.or(self.timeout),
            min_lux: overrides.min_lux.or(self.min_lux),
            max_lux: overrides.max_lux.or(self.max_lux),
            poll_interval: overrides.poll_interval.or(self.poll_interval),
        }
    }
}

/// Validated settings.
#[derive(Debug, PartialEq)]
pub struct Settings {
    pub backlight: PathBuf,
    pub interrupts: Vec<PathBuf>,
    pub sensor: Option<PathBuf>,
    pub steps: Option<u32>,
    pub initial_step: Option<u32>,
    pub timeout: Duration,
    pub min_lux: u32,
    pub max_lux: u32,
    pub poll_interval: Duration,
}

impl Settings {
    /// Build the controller configuration for a device with the given
    /// `max_brightness` and current `actual_brightness`.
    pub fn configuration(&self, max_brightness: u32, actual_brightness: u32) -> Configuration {
        let steps = self.steps.unwrap_or(max_brightness);
        let initial = self.initial_step.unwrap_or_else(|| {
            StepScale::new(steps, max_brightness)
                .to_step(actual_brightness)
                .max(1)
        });

        let mut conf = Configuration::new(steps, initial);
        if !self.interrupts.is_empty() {
            conf = conf.with_trigger(self.timeout);
        }
        if self.sensor.is_some() {
            conf = conf.with_sensor(self.min_lux, self.max_lux);
        }
        conf
    }
}

impl TryFrom<RawConfig> for Settings {
    type Error = anyhow::Error;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let Some(backlight) = raw.backlight else {
            bail!("mandatory argument PATH missing");
        };
        if raw.interrupts.is_empty() && raw.sensor.is_none() {
            bail!("at least one of -i/--int or -s/--sensor is required");
        }
        let max_lux = match (raw.sensor.is_some(), raw.max_lux) {
            (_, Some(max_lux)) => max_lux,
            (true, None) => bail!("--max-lux is required with -s/--sensor"),
            (false, None) => 0,
        };

        let timeout = match raw.timeout {
            Some(s) => parse_duration(&s).context("invalid timeout")?,
            None => DEFAULT_TIMEOUT,
        };
        let poll_interval = match raw.poll_interval {
            Some(s) => parse_duration(&s).context("invalid poll interval")?,
            None => DEFAULT_POLL_INTERVAL,
        };
        if poll_interval.is_zero() {
            bail!("poll interval must be non-zero");
        }

        Ok(Settings {
            backlight,
            interrupts: raw.interrupts,
            sensor: raw.sensor,
            steps: raw.steps,
            initial_step: raw.initial_step,
            timeout,
            min_lux: raw.min_lux.unwrap_or(0),
            max_lux,
            poll_interval,
        })
    }
}

/// Parse durations like "250ms", "30s", "2m" or a bare number of seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: u64 = number
        .parse()
        .context(format!("{:?} does not start with a number", s))?;

    match unit.trim() {
        "" | "s" => Ok(Duration::from_secs(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "m" | "min" => match value.checked_mul(60) {
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => bail!("{:?} is too long", s),
        },
        other => bail!("unknown unit {:?} in {:?}", other, s),
    }
}
