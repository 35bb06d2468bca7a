//! # Uplink Module
//!
//! Connection state machine, timer queue and the dispatcher that drives
//! them against the network stack.

pub mod controller;
pub mod dispatcher;
pub mod timers;

pub use controller::{
    Action, ConnectionState, CycleTrigger, StopReason, UplinkController, UplinkEvent, UplinkPolicy,
};
pub use dispatcher::{UplinkNode, UplinkStats};
pub use timers::TimerQueue;

use crate::config::SessionConfig;
use crate::error::{FieldNodeError, Result};

/// Device EUI shipped in the board's example configuration
pub const PLACEHOLDER_DEV_EUI: [u8; 8] = [0x40, 0x39, 0x32, 0x35, 0x59, 0x37, 0x91, 0x94];

/// Reject identities that cannot have been provisioned
///
/// # Errors
///
/// Returns [`FieldNodeError::FatalInit`] if the device EUI is the placeholder
/// or all zeros, or if the application key is all zeros.
pub fn validate_identity(session: &SessionConfig) -> Result<()> {
    if session.dev_eui == PLACEHOLDER_DEV_EUI {
        return Err(FieldNodeError::FatalInit(
            "dev_eui is still the placeholder value, set the provisioned device EUI".to_string(),
        ));
    }
    if session.dev_eui.iter().all(|byte| *byte == 0) {
        return Err(FieldNodeError::FatalInit("dev_eui must not be all zeros".to_string()));
    }
    if session.app_key.iter().all(|byte| *byte == 0) {
        return Err(FieldNodeError::FatalInit("app_key must not be all zeros".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionConfig {
        SessionConfig {
            dev_eui: [0x86, 0x39, 0x32, 0x35, 0x59, 0x37, 0x91, 0x94],
            app_eui: [0; 8],
            app_key: [0x2B; 16],
            join_trials: 3,
        }
    }

    #[test]
    fn test_provisioned_identity_is_accepted() {
        assert!(validate_identity(&session()).is_ok());
    }

    #[test]
    fn test_placeholder_eui_is_rejected() {
        let mut session = session();
        session.dev_eui = PLACEHOLDER_DEV_EUI;
        assert!(matches!(validate_identity(&session), Err(FieldNodeError::FatalInit(_))));
    }

    #[test]
    fn test_zero_key_or_eui_is_rejected() {
        let mut zero_key = session();
        zero_key.app_key = [0; 16];
        assert!(validate_identity(&zero_key).is_err());

        let mut zero_eui = session();
        zero_eui.dev_eui = [0; 8];
        assert!(validate_identity(&zero_eui).is_err());
    }
}
