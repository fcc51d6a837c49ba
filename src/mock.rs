//! Mock devices for testing.
//!
//! Every mock is a cheap handle around shared state, so a test can hand one
//! clone to a [`Daemon`](crate::Daemon) and keep another to inspect.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::device::{Backlight, Clock, LightSensor, TriggerSource};
use crate::error::DeviceError;
use crate::time::Timestamp;

// =============================================================================
// MockBacklight
// =============================================================================

#[derive(Debug, Default)]
struct BacklightState {
    max_brightness: u32,
    actual: u32,
    writes: Vec<u32>,
    fail_writes: bool,
}

/// A mock backlight that records every write.
///
/// # Example
///
/// ```
/// use libbacklight::{Backlight, MockBacklight};
///
/// let mock = MockBacklight::new(255, 128);
/// let mut handle = mock.clone();
/// handle.set_brightness(64).unwrap();
/// assert_eq!(mock.writes(), vec![64]);
/// assert_eq!(mock.actual_brightness().unwrap(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct MockBacklight {
    state: Arc<Mutex<BacklightState>>,
}

impl MockBacklight {
    /// Create a mock with the given maximum and current raw brightness.
    pub fn new(max_brightness: u32, actual: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(BacklightState {
                max_brightness,
                actual,
                ..Default::default()
            })),
        }
    }

    /// All raw values written so far, oldest first.
    pub fn writes(&self) -> Vec<u32> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Make subsequent writes fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }
}

impl Default for MockBacklight {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

impl Backlight for MockBacklight {
    fn max_brightness(&self) -> u32 {
        self.state.lock().unwrap().max_brightness
    }

    fn actual_brightness(&self) -> Result<u32, DeviceError> {
        Ok(self.state.lock().unwrap().actual)
    }

    fn set_brightness(&mut self, value: u32) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(DeviceError::io(
                "mock/brightness",
                io::Error::other("write rejected"),
            ));
        }
        state.actual = value.min(state.max_brightness);
        state.writes.push(value);
        Ok(())
    }
}

// =============================================================================
// ManualClock
// =============================================================================

/// A clock that only moves when slept on or advanced explicitly.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Create a clock at [`Timestamp::ZERO`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(*self.now.lock().unwrap())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

// =============================================================================
// ScriptedTrigger
// =============================================================================

/// A trigger source replaying a fixed sequence of wait results.
///
/// A `false` entry stands for a timed-out wait and advances the shared
/// [`ManualClock`] by the timeout. Once the script is used up every wait
/// times out.
#[derive(Debug, Clone)]
pub struct ScriptedTrigger {
    script: Arc<Mutex<VecDeque<bool>>>,
    clock: ManualClock,
}

impl ScriptedTrigger {
    /// Create a trigger source driving `clock`.
    pub fn new(clock: ManualClock, script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            clock,
        }
    }

    /// Append a result to the script.
    pub fn push(&self, triggered: bool) {
        self.script.lock().unwrap().push_back(triggered);
    }
}

impl TriggerSource for ScriptedTrigger {
    fn wait(&mut self, timeout: Duration) -> Result<bool, DeviceError> {
        let triggered = self.script.lock().unwrap().pop_front().unwrap_or(false);
        if !triggered {
            self.clock.advance(timeout);
        }
        Ok(triggered)
    }
}

// =============================================================================
// ScriptedSensor
// =============================================================================

/// A light sensor replaying a fixed sequence of readings.
///
/// `None` entries fail the read. Once the script is used up the last
/// successful reading repeats.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    script: Arc<Mutex<VecDeque<Option<u32>>>>,
    last: Arc<Mutex<u32>>,
}

impl ScriptedSensor {
    /// Create a sensor replaying `script`.
    pub fn new(script: impl IntoIterator<Item = Option<u32>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            last: Arc::new(Mutex::new(0)),
        }
    }

    /// A sensor that always reads `lux`.
    pub fn constant(lux: u32) -> Self {
        let sensor = Self::new([]);
        *sensor.last.lock().unwrap() = lux;
        sensor
    }

    /// Append `count` readings of `lux` to the script.
    pub fn push_repeated(&self, lux: u32, count: usize) {
        let mut script = self.script.lock().unwrap();
        script.extend(std::iter::repeat_n(Some(lux), count));
    }
}

impl LightSensor for ScriptedSensor {
    fn read_lux(&mut self) -> Result<u32, DeviceError> {
        let mut last = self.last.lock().unwrap();
        match self.script.lock().unwrap().pop_front() {
            Some(Some(lux)) => {
                *last = lux;
                Ok(lux)
            }
            Some(None) => Err(DeviceError::io(
                "mock/in_illuminance_input",
                io::Error::other("read failed"),
            )),
            None => Ok(*last),
        }
    }
}
