//! # NMEA Module
//!
//! Streaming NMEA-0183 handling for the GPS receiver.
//!
//! This module handles:
//! - Framing the serial byte stream into newline-terminated sentences
//! - Decoding `$GPGGA` fix reports into position and fix quality
//! - XOR checksum calculation and verification

pub mod checksum;
pub mod decoder;
pub mod framer;
