//! # Payload Module
//!
//! Fixed-layout uplink frame codec and downlink command matching.

pub mod decoder;
pub mod encoder;
pub mod protocol;

pub use decoder::{decode_command, decode_frame};
pub use encoder::{encode, encode_versioned};
pub use protocol::{UplinkFrame, UPLINK_FRAME_LEN, VERSIONED_FRAME_LEN};
