//! The control loop tying a [`Controller`] to real devices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use crate::controller::{Action, Controller};
use crate::device::{Backlight, Clock, LightSensor, StepScale, TriggerSource};
use crate::error::DeviceError;

/// Default time between ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Samples trigger and sensor inputs, feeds the controller and applies its
/// decisions to the backlight.
///
/// The daemon is the controller's single owner, so ticks are serialised by
/// construction. Shutdown is requested through the flag passed to
/// [`run`](Self::run).
pub struct Daemon<B, C> {
    controller: Controller,
    backlight: B,
    clock: C,
    scale: StepScale,
    trigger: Option<Box<dyn TriggerSource>>,
    sensor: Option<Box<dyn LightSensor>>,
    poll_interval: Duration,
    last_lux: u32,
}

impl<B: Backlight, C: Clock> Daemon<B, C> {
    /// Create a daemon with no inputs attached.
    pub fn new(controller: Controller, backlight: B, clock: C) -> Self {
        let scale = StepScale::new(
            controller.configuration().max_brightness_step,
            backlight.max_brightness(),
        );
        // Until the sensor delivers, keep feeding the pre-filled average.
        let last_lux = controller.average_lux().unwrap_or(0);
        Self {
            controller,
            backlight,
            clock,
            scale,
            trigger: None,
            sensor: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_lux,
        }
    }

    /// Attach the trigger source; its wait doubles as the tick delay.
    pub fn with_trigger(mut self, trigger: impl TriggerSource + 'static) -> Self {
        self.trigger = Some(Box::new(trigger));
        self
    }

    /// Attach the ambient light sensor.
    pub fn with_sensor(mut self, sensor: impl LightSensor + 'static) -> Self {
        self.sensor = Some(Box::new(sensor));
        self
    }

    /// Set the time between ticks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The controller driven by this daemon.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// The backlight driven by this daemon.
    pub fn backlight(&self) -> &B {
        &self.backlight
    }

    /// Run one tick: wait for inputs, evaluate, and write the backlight if needed.
    ///
    /// # Errors
    /// Trigger and backlight failures are returned. A failed sensor read is
    /// logged and the previous reading is used instead.
    pub fn tick(&mut self) -> Result<Action, DeviceError> {
        let triggered = match self.trigger.as_mut() {
            Some(trigger) => trigger.wait(self.poll_interval)?,
            None => {
                self.clock.sleep(self.poll_interval);
                false
            }
        };

        if let Some(sensor) = self.sensor.as_mut() {
            match sensor.read_lux() {
                Ok(lux) => self.last_lux = lux,
                Err(e) => warn!("sensor read failed, reusing {} lux: {}", self.last_lux, e),
            }
        }

        let now = self.clock.now();
        let action = self.controller.evaluate(now, triggered, self.last_lux);
        if action == Action::SetBrightness {
            self.apply()?;
        }

        if triggered {
            // Let the line settle before polling it again.
            self.clock.sleep(self.poll_interval);
        }
        Ok(action)
    }

    /// Drive the backlight until `shutdown` is set or a device fails.
    ///
    /// The initial brightness is written on entry and restored on exit,
    /// whichever way the loop ends.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), DeviceError> {
        info!(
            "control loop started: step {}/{}, poll interval {:?}",
            self.controller.current_brightness(),
            self.controller.configuration().max_brightness_step,
            self.poll_interval
        );

        let mut result = self.apply();
        while result.is_ok() && !shutdown.load(Ordering::SeqCst) {
            result = self.tick().map(|_| ());
        }

        let restored = self.restore();
        if let (Err(e), Err(_)) = (&restored, &result) {
            warn!("restoring brightness failed: {}", e);
        }
        info!("control loop stopped");
        result.and(restored)
    }

    fn apply(&mut self) -> Result<(), DeviceError> {
        let step = self.controller.current_brightness();
        let raw = self.scale.to_raw(step);
        debug!("applying step {} (raw {})", step, raw);
        self.backlight.set_brightness(raw)
    }

    fn restore(&mut self) -> Result<(), DeviceError> {
        let step = self.controller.configuration().initial_brightness_step;
        let raw = self.scale.to_raw(step);
        info!("restoring step {} (raw {})", step, raw);
        self.backlight.set_brightness(raw)
    }
}
