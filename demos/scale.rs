//! HX711 scale demo on Linux sysfs GPIO.
//!
//! Defaults match a BeagleBoard wiring: DOUT on P9_23 (gpio49), SCK on P9_27
//! (gpio115), 3.3V. Override with `HX711_DOUT`, `HX711_SCK`,
//! `HX711_KNOWN_WEIGHT` and `HX711_READINGS`.

use std::env;
use std::io;
use std::process::ExitCode;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use hx711_loadcell::hx711::Gain;
use hx711_loadcell::sensor::LoadCellSensor;
use hx711_loadcell::sysfs::SysfsHx711;
use hx711_loadcell::LoadCell;
use log::{error, info, warn};

fn setting<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let dout: u64 = setting("HX711_DOUT", 49);
    let sck: u64 = setting("HX711_SCK", 115);
    let known_weight: f64 = setting("HX711_KNOWN_WEIGHT", 2.0);
    let readings: usize = setting("HX711_READINGS", 20);

    let hx711 = match SysfsHx711::open_sysfs(dout, sck, Gain::A128) {
        Ok(hx711) => hx711,
        Err(e) => {
            error!("HX711 init failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let sensor = match LoadCellSensor::new(&hx711, 1.0) {
        Ok(sensor) => sensor,
        Err(e) => {
            error!("sensor init failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let status = if let Err(e) = setup(&sensor, known_weight) {
        error!("{e}");
        ExitCode::FAILURE
    } else {
        info!("calibrated, reading weights");
        for _ in 0..readings {
            match sensor.read_weight(5) {
                Ok(weight) => info!("weight: {weight:.3}"),
                Err(e) => warn!("read error: {e}"),
            }
            thread::sleep(Duration::from_millis(500));
        }
        ExitCode::SUCCESS
    };

    sensor.close();
    if let Err(e) = hx711.power_down() {
        warn!("power down failed: {e}");
    }
    hx711.close();
    status
}

fn setup<L>(sensor: &L, known_weight: f64) -> Result<(), String>
where
    L: LoadCell,
    L::Error: std::fmt::Display,
{
    info!("taring... remove weight and wait");
    sensor.tare(10).map_err(|e| format!("tare failed: {e}"))?;

    info!("place {known_weight:.2} kg and press Enter to calibrate");
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| format!("stdin: {e}"))?;

    sensor
        .calibrate(known_weight, 10)
        .map_err(|e| format!("calibration failed: {e}"))
}
