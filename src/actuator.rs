//! # Actuator Module
//!
//! Indicator states selectable from the downlink, and the collaborator that
//! applies them to the RGB LED.

use tracing::info;

/// Indicator state commanded by the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActuatorState {
    #[default]
    AllOff,
    Green,
    Red,
}

impl ActuatorState {
    /// Pattern for the active-low red/green/blue bus (bit 0 = red, bit 2 = blue)
    ///
    /// A set bit switches the colour off.
    pub fn bus_pattern(self) -> u8 {
        match self {
            ActuatorState::AllOff => 0b111,
            ActuatorState::Green => 0b101,
            ActuatorState::Red => 0b110,
        }
    }
}

/// Collaborator driving the physical indicator
pub trait Actuator: Send {
    fn apply(&mut self, state: ActuatorState);
}

/// Indicator that only logs, for bench runs without the LED wired
#[derive(Debug, Default)]
pub struct LoggingIndicator {
    state: ActuatorState,
}

impl LoggingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }
}

impl Actuator for LoggingIndicator {
    fn apply(&mut self, state: ActuatorState) {
        info!("Indicator -> {:?} (bus 0b{:03b})", state, state.bus_pattern());
        self.state = state;
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every applied state
    #[derive(Clone, Default)]
    pub struct RecordingActuator {
        pub applied: Arc<Mutex<Vec<ActuatorState>>>,
    }

    impl RecordingActuator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_applied(&self) -> Vec<ActuatorState> {
            self.applied.lock().unwrap().clone()
        }
    }

    impl Actuator for RecordingActuator {
        fn apply(&mut self, state: ActuatorState) {
            self.applied.lock().unwrap().push(state);
        }
    }
}
