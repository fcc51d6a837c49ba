use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::Context;
use clap::Parser;
use libbacklight::{
    Backlight, Clock, Controller, Daemon, GpioTrigger, IioLightSensor, MonotonicClock,
    SysfsBacklight,
};
use log::{debug, info};

mod config;

use crate::config::{RawConfig, Settings};

/// Automatic backlight control.
///
/// Turns the backlight off after a period without GPIO activity and/or
/// follows the ambient light reported by an IIO sensor.
#[derive(Parser, Debug)]
#[command(about, version)]
struct Args {
    /// Path to backlight sysfs device, e.g. /sys/class/backlight/backlight-lvds.
    /// Needs brightness, actual_brightness and max_brightness.
    #[arg(value_name = "PATH")]
    backlight: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// GPIO interrupt input, e.g. /sys/class/gpio/gpio12, with its edge
    /// already configured. May be repeated; any edge counts as a trigger.
    #[arg(short = 'i', long = "int", value_name = "GPIO")]
    interrupts: Vec<PathBuf>,

    /// IIO ambient light sensor, e.g. /sys/bus/iio/devices/iio:device0
    #[arg(short, long, value_name = "IIO")]
    sensor: Option<PathBuf>,

    /// Path to config file; command line options take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Idle time until the backlight is turned off [default: 1s]
    #[arg(short, long, value_name = "DURATION")]
    timeout: Option<String>,

    /// Number of brightness steps [default: device max_brightness]
    #[arg(long)]
    steps: Option<u32>,

    /// Step used at startup and after a trigger [default: current brightness]
    #[arg(long)]
    initial_step: Option<u32>,

    /// Lux value mapped to step 1 [default: 0]
    #[arg(long)]
    min_lux: Option<u32>,

    /// Lux value mapped to the highest step
    #[arg(long)]
    max_lux: Option<u32>,

    /// Time between ticks [default: 100ms]
    #[arg(long, value_name = "DURATION")]
    poll_interval: Option<String>,

    /// Print an example config file and exit
    #[arg(long)]
    example_config: bool,
}

impl Args {
    fn to_raw_config(&self) -> RawConfig {
        RawConfig {
            backlight: self.backlight.clone(),
            interrupts: self.interrupts.clone(),
            sensor: self.sensor.clone(),
            steps: self.steps,
            initial_step: self.initial_step,
            timeout: self.timeout.clone(),
            min_lux: self.min_lux,
            max_lux: self.max_lux,
            poll_interval: self.poll_interval.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.example_config {
        print!("{}", toml::to_string(&RawConfig::example())?);
        return Ok(());
    }

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Parse config, command line wins over the file
    let file_config = match &args.config {
        Some(path) => RawConfig::load(path)?,
        None => RawConfig::default(),
    };
    let settings: Settings = file_config.merge(args.to_raw_config()).try_into()?;
    debug!("settings: {:?}", settings);

    let backlight = SysfsBacklight::open(&settings.backlight).context(format!(
        "Failed initializing backlight at {:?}",
        settings.backlight
    ))?;
    let actual = backlight
        .actual_brightness()
        .context("Failed reading actual brightness")?;

    let conf = settings.configuration(backlight.max_brightness(), actual);
    info!(
        "backlight {:?}: max_brightness={}, actual_brightness={}, steps={}, initial step={}",
        settings.backlight,
        backlight.max_brightness(),
        actual,
        conf.max_brightness_step,
        conf.initial_brightness_step
    );

    let clock = MonotonicClock::new();
    let controller = Controller::new(clock.now(), conf).context("Invalid configuration")?;
    let mut daemon =
        Daemon::new(controller, backlight, clock).with_poll_interval(settings.poll_interval);

    if !settings.interrupts.is_empty() {
        let trigger = GpioTrigger::open_all(&settings.interrupts)
            .context("Failed initializing interrupt")?;
        info!(
            "trigger: {:?}, timeout {:?}",
            settings.interrupts, settings.timeout
        );
        daemon = daemon.with_trigger(trigger);
    }
    if let Some(path) = &settings.sensor {
        let sensor = IioLightSensor::open(path)
            .context(format!("Failed initializing light sensor at {:?}", path))?;
        info!(
            "sensor: {:?}, {}-{} lux",
            path, settings.min_lux, settings.max_lux
        );
        daemon = daemon.with_sensor(sensor);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("Failed initializing signal handler")?;
    }

    daemon.run(&shutdown).context("Backlight control failed")?;
    Ok(())
}
