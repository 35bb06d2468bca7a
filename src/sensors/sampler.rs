//! # Sensor Sampler
//!
//! Collects one [`SampleSet`] per uplink cycle.
//!
//! The accelerometer, hygrometer and analog inputs are read directly. The
//! colour sensor needs its target lit: the white LED is switched on, the
//! sampler waits for the settle interval (24 ms integration time plus margin),
//! reads red/green/blue and switches the LED off again.
//!
//! A failed read only blanks its own channel; the cycle always completes.

use std::time::Duration;
use tracing::warn;

use super::registers::*;
use super::{Accelerometer, AnalogInput, Channel, ColorSensor, Hygrometer, Illumination, SampleSet};
use crate::error::Result;

/// Default delay between LED on and colour read
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(30);

/// Every collaborator the sampler drives
///
/// The sampler owns them exclusively, so bus transactions never overlap.
pub struct SensorSuite {
    pub accelerometer: Box<dyn Accelerometer>,
    pub hygrometer: Box<dyn Hygrometer>,
    pub color: Box<dyn ColorSensor>,
    pub soil_moisture: Box<dyn AnalogInput>,
    pub light: Box<dyn AnalogInput>,
    pub illumination: Box<dyn Illumination>,
}

/// Per-cycle sensor orchestration
pub struct SensorSampler {
    sensors: SensorSuite,
    settle: Duration,
}

impl std::fmt::Debug for SensorSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSampler")
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl SensorSampler {
    pub fn new(sensors: SensorSuite, settle: Duration) -> Self {
        Self { sensors, settle }
    }

    /// Take one full set of readings
    pub async fn sample(&mut self) -> SampleSet {
        let sensors = &mut self.sensors;

        let ax = channel(Channel::Ax, sensors.accelerometer.read_axis(ACCEL_OUT_X_MSB));
        let ay = channel(Channel::Ay, sensors.accelerometer.read_axis(ACCEL_OUT_Y_MSB));
        let az = channel(Channel::Az, sensors.accelerometer.read_axis(ACCEL_OUT_Z_MSB));

        let temperature = channel(
            Channel::Temperature,
            sensors.hygrometer.read_register(HYGRO_MEASURE_TEMPERATURE),
        );
        let humidity = channel(Channel::Humidity, sensors.hygrometer.read_register(HYGRO_MEASURE_HUMIDITY));

        let soil_moisture = channel(Channel::SoilMoisture, sensors.soil_moisture.read_analog());
        let light_level = channel(Channel::LightLevel, sensors.light.read_analog());

        sensors.illumination.set_enabled(true);
        tokio::time::sleep(self.settle).await;

        let red = channel(Channel::Red, sensors.color.read_channel(COLOR_RED_LOW));
        let green = channel(Channel::Green, sensors.color.read_channel(COLOR_GREEN_LOW));
        let blue = channel(Channel::Blue, sensors.color.read_channel(COLOR_BLUE_LOW));

        sensors.illumination.set_enabled(false);

        SampleSet {
            ax,
            ay,
            az,
            temperature,
            humidity,
            soil_moisture,
            light_level,
            red,
            green,
            blue,
        }
    }
}

fn channel<T>(channel: Channel, reading: Result<T>) -> Option<T> {
    match reading {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to read {}: {}", channel.name(), e);
            None
        }
    }
}
