//! # Field Node Library
//!
//! Environmental field node: tracks the GPS fix from an NMEA receiver, samples
//! motion, climate, soil, light and colour sensors, and ships each sample set
//! as a fixed 28-byte frame over a duty-cycled long-range uplink. Downlink
//! frames drive an RGB indicator.

pub mod actuator;
pub mod config;
pub mod error;
pub mod fix;
pub mod network;
pub mod nmea;
pub mod payload;
pub mod positioning;
pub mod sensors;
pub mod serial;
pub mod uplink;
