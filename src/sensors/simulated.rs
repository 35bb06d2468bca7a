//! Bench sensors for running the node without the sensor board attached.
//!
//! Readings are deterministic raw values in the ranges the real parts report,
//! with a slow drift so consecutive uplinks differ.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use super::registers::*;
use super::{Accelerometer, AnalogInput, ColorSensor, Hygrometer, Illumination, SensorSuite};
use crate::error::{FieldNodeError, Result};

/// Shared cycle counter driving the drift
#[derive(Debug, Clone, Default)]
struct Drift(Arc<AtomicU16>);

impl Drift {
    fn current(&self) -> u16 {
        self.0.load(Ordering::Relaxed)
    }

    fn advance(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

struct BenchAccelerometer(Drift);

impl Accelerometer for BenchAccelerometer {
    fn read_axis(&mut self, msb_register: u8) -> Result<i16> {
        let wobble = (self.0.current() % 16) as i16 - 8;
        match msb_register {
            ACCEL_OUT_X_MSB => Ok(wobble),
            ACCEL_OUT_Y_MSB => Ok(-wobble),
            // 1 g at the ±2 g, 14-bit setting
            ACCEL_OUT_Z_MSB => Ok(4096 + wobble),
            other => Err(FieldNodeError::Sensor(format!("unknown axis register 0x{:02X}", other))),
        }
    }
}

struct BenchHygrometer(Drift);

impl Hygrometer for BenchHygrometer {
    fn read_register(&mut self, command: u8) -> Result<u16> {
        let step = self.0.current() % 64;
        match command {
            // ~21.5 °C and ~45 %RH in the sensor's raw encoding
            HYGRO_MEASURE_TEMPERATURE => Ok(0x6A4C + step),
            HYGRO_MEASURE_HUMIDITY => Ok(0x7E12 - step),
            other => Err(FieldNodeError::Sensor(format!("unknown hygrometer command 0x{:02X}", other))),
        }
    }
}

struct BenchColorSensor {
    drift: Drift,
    lit: Arc<AtomicBool>,
}

impl ColorSensor for BenchColorSensor {
    fn read_channel(&mut self, register: u8) -> Result<u16> {
        // Reading dark gives near-zero counts, like the real sensor.
        let base = if self.lit.load(Ordering::Relaxed) { 300 } else { 5 };
        let step = self.drift.current() % 32;
        match register {
            COLOR_RED_LOW => Ok(base + step),
            COLOR_GREEN_LOW => Ok(base + 120 + step),
            COLOR_BLUE_LOW => Ok(base + 60 + step),
            other => Err(FieldNodeError::Sensor(format!("unknown colour register 0x{:02X}", other))),
        }
    }
}

struct BenchAnalog {
    drift: Drift,
    level: u16,
    advances: bool,
}

impl AnalogInput for BenchAnalog {
    fn read_analog(&mut self) -> Result<u16> {
        let value = self.level.wrapping_add(self.drift.current().wrapping_mul(7));
        if self.advances {
            self.drift.advance();
        }
        Ok(value)
    }
}

struct BenchLamp(Arc<AtomicBool>);

impl Illumination for BenchLamp {
    fn set_enabled(&mut self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

/// Build a complete bench sensor suite
pub fn bench_suite() -> SensorSuite {
    let drift = Drift::default();
    let lit = Arc::new(AtomicBool::new(false));

    SensorSuite {
        accelerometer: Box::new(BenchAccelerometer(drift.clone())),
        hygrometer: Box::new(BenchHygrometer(drift.clone())),
        color: Box::new(BenchColorSensor {
            drift: drift.clone(),
            lit: lit.clone(),
        }),
        soil_moisture: Box::new(BenchAnalog {
            drift: drift.clone(),
            level: 21000,
            advances: false,
        }),
        // Light is read last among the direct channels, so it advances the cycle.
        light: Box::new(BenchAnalog {
            drift,
            level: 38000,
            advances: true,
        }),
        illumination: Box::new(BenchLamp(lit)),
    }
}
