//! Register addresses and commands passed to the sensor collaborators.

/// Accelerometer X axis MSB register (LSB follows at +1)
pub const ACCEL_OUT_X_MSB: u8 = 0x01;
/// Accelerometer Y axis MSB register
pub const ACCEL_OUT_Y_MSB: u8 = 0x03;
/// Accelerometer Z axis MSB register
pub const ACCEL_OUT_Z_MSB: u8 = 0x05;

/// Hygrometer: measure temperature, hold master mode
pub const HYGRO_MEASURE_TEMPERATURE: u8 = 0xE3;
/// Hygrometer: measure relative humidity, hold master mode
pub const HYGRO_MEASURE_HUMIDITY: u8 = 0xE5;

/// Colour sensor red channel low byte
pub const COLOR_RED_LOW: u8 = 0x16;
/// Colour sensor green channel low byte
pub const COLOR_GREEN_LOW: u8 = 0x18;
/// Colour sensor blue channel low byte
pub const COLOR_BLUE_LOW: u8 = 0x1A;
