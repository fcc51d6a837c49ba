//! Example: simulate a day at the panel with mock devices.
//!
//! Run with: `RUST_LOG=debug cargo run --example simulate`

use std::time::Duration;

use libbacklight::mock::{ManualClock, MockBacklight, ScriptedSensor, ScriptedTrigger};
use libbacklight::{Action, Clock, Configuration, Controller, Daemon};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (optional)
    env_logger::init();

    let clock = ManualClock::new();
    let conf = Configuration::new(10, 5)
        .with_trigger(Duration::from_secs(2))
        .with_sensor(42, 600);
    let controller = Controller::new(clock.now(), conf)?;

    // Someone touches the panel, walks away, the room darkens, they come back.
    let trigger = ScriptedTrigger::new(clock.clone(), [true]);
    let sensor = ScriptedSensor::new([]);
    sensor.push_repeated(600, 15);
    sensor.push_repeated(42, 30);

    let backlight = MockBacklight::new(255, 128);
    let mut daemon = Daemon::new(controller, backlight.clone(), clock.clone())
        .with_trigger(trigger.clone())
        .with_sensor(sensor);

    for tick in 0..60 {
        if tick == 50 {
            trigger.push(true);
        }
        if daemon.tick()? == Action::SetBrightness {
            println!(
                "{:>6.1}s  step {:>2}  raw {:>3}",
                clock.now().as_duration().as_secs_f32(),
                daemon.controller().current_brightness(),
                backlight.writes().last().copied().unwrap_or_default()
            );
        }
    }

    println!("{} writes: {:?}", backlight.writes().len(), backlight.writes());
    Ok(())
}
