//! # Sensors Module
//!
//! Collaborator traits for the on-board transducers and the per-cycle
//! [`SampleSet`] they produce.
//!
//! Register-level bus I/O lives behind these traits; the node only decides
//! ordering, illumination and the settle delay. Readings are raw register
//! values and are transmitted without calibration.

pub mod registers;
pub mod sampler;
pub mod simulated;

use serde::Serialize;

use crate::error::Result;

pub use sampler::{SensorSampler, SensorSuite};

/// MMA8451Q-style accelerometer
#[cfg_attr(test, mockall::automock)]
pub trait Accelerometer: Send {
    /// Read a 14-bit axis value starting at its MSB register
    fn read_axis(&mut self, msb_register: u8) -> Result<i16>;
}

/// Si7021-style temperature/humidity sensor
#[cfg_attr(test, mockall::automock)]
pub trait Hygrometer: Send {
    /// Issue a measurement command and read the 16-bit result
    fn read_register(&mut self, command: u8) -> Result<u16>;
}

/// TCS34725-style colour sensor
#[cfg_attr(test, mockall::automock)]
pub trait ColorSensor: Send {
    /// Read a 16-bit channel starting at its low-byte register
    fn read_channel(&mut self, register: u8) -> Result<u16>;
}

/// Analog input (soil moisture probe, phototransistor)
#[cfg_attr(test, mockall::automock)]
pub trait AnalogInput: Send {
    /// Read the input scaled to 16 bits
    fn read_analog(&mut self) -> Result<u16>;
}

/// White LED lighting the colour sensor's target
#[cfg_attr(test, mockall::automock)]
pub trait Illumination: Send {
    fn set_enabled(&mut self, enabled: bool);
}

/// Individual sample channels, in frame order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    Ax,
    Ay,
    Az,
    Temperature,
    Humidity,
    SoilMoisture,
    LightLevel,
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 10] = [
        Channel::Ax,
        Channel::Ay,
        Channel::Az,
        Channel::Temperature,
        Channel::Humidity,
        Channel::SoilMoisture,
        Channel::LightLevel,
        Channel::Red,
        Channel::Green,
        Channel::Blue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Ax => "ax",
            Channel::Ay => "ay",
            Channel::Az => "az",
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::SoilMoisture => "soil_moisture",
            Channel::LightLevel => "light_level",
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        }
    }
}

/// Raw readings from one uplink cycle
///
/// A `None` channel failed to read this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SampleSet {
    pub ax: Option<i16>,
    pub ay: Option<i16>,
    pub az: Option<i16>,
    pub temperature: Option<u16>,
    pub humidity: Option<u16>,
    pub soil_moisture: Option<u16>,
    pub light_level: Option<u16>,
    pub red: Option<u16>,
    pub green: Option<u16>,
    pub blue: Option<u16>,
}

impl SampleSet {
    /// Whether `channel` produced a reading
    pub fn is_present(&self, channel: Channel) -> bool {
        match channel {
            Channel::Ax => self.ax.is_some(),
            Channel::Ay => self.ay.is_some(),
            Channel::Az => self.az.is_some(),
            Channel::Temperature => self.temperature.is_some(),
            Channel::Humidity => self.humidity.is_some(),
            Channel::SoilMoisture => self.soil_moisture.is_some(),
            Channel::LightLevel => self.light_level.is_some(),
            Channel::Red => self.red.is_some(),
            Channel::Green => self.green.is_some(),
            Channel::Blue => self.blue.is_some(),
        }
    }

    /// Channels that failed to read, in frame order
    pub fn missing_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|&channel| !self.is_present(channel))
            .collect()
    }
}
