//! # Network Module
//!
//! Abstraction over the long-range radio stack used for uplinks.
//!
//! The stack reports asynchronous outcomes (join, transmission, reception)
//! as [`NetworkEvent`]s on the channel handed to
//! [`NetworkService::initialize`]. Submission itself is non-blocking: a send
//! that cannot be queued right now returns [`SendError::WouldBlock`].

pub mod simulated;

pub use simulated::SimulatedNetwork;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::error::Result;

/// Depth of the stack-to-dispatcher event queue
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Cause of a failed transmission the stack may recover from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientCause {
    /// No acknowledgement or TX done within the stack's window
    Timeout,
    /// Radio reported an error during transmission
    Radio,
    /// MIC or encryption failure
    Crypto,
    /// The stack could not schedule the transmission
    Scheduling,
}

/// Asynchronous outcome reported by the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    JoinSucceeded,
    JoinFailed,
    Disconnected,
    SendCompleted,
    SendFailed(TransientCause),
    ReceiveReady,
    ReceiveFailed,
    /// The network server asked for an uplink (e.g. to deliver MAC commands)
    UplinkRequired,
}

/// Over-the-air activation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParams {
    pub dev_eui: [u8; 8],
    pub app_eui: [u8; 8],
    pub app_key: [u8; 16],
    pub trials: u8,
}

impl From<&SessionConfig> for JoinParams {
    fn from(session: &SessionConfig) -> Self {
        Self {
            dev_eui: session.dev_eui,
            app_eui: session.app_eui,
            app_key: session.app_key,
            trials: session.join_trials,
        }
    }
}

/// Result of a connect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Session already established
    Connected,
    /// Join request sent; the outcome arrives as an event
    InProgress,
}

/// Synchronous send failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The stack is busy (duty-cycle restriction or a transmission in flight)
    #[error("stack busy, send would block")]
    WouldBlock,

    /// The stack refused the frame
    #[error("send rejected with status {0}")]
    Rejected(i16),
}

/// Inbound application frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downlink {
    pub port: u8,
    pub payload: Vec<u8>,
}

/// Radio stack collaborator
#[async_trait]
pub trait NetworkService: Send {
    /// Bring up the stack and register the event sink
    async fn initialize(&mut self, events: mpsc::Sender<NetworkEvent>) -> Result<()>;

    /// Number of retransmissions for confirmed messages
    fn set_retry_count(&mut self, retries: u8) -> Result<()>;

    fn enable_adaptive_rate(&mut self) -> Result<()>;

    /// Start an over-the-air join
    async fn connect(&mut self, params: &JoinParams) -> Result<ConnectStatus>;

    /// Submit a frame on an application port
    ///
    /// Returns the number of bytes accepted. Completion is reported later as
    /// [`NetworkEvent::SendCompleted`] or [`NetworkEvent::SendFailed`].
    async fn send(&mut self, port: u8, payload: &[u8]) -> std::result::Result<usize, SendError>;

    /// Fetch the frame announced by [`NetworkEvent::ReceiveReady`]
    async fn receive(&mut self) -> Result<Downlink>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::FieldNodeError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock radio stack for testing
    ///
    /// Every successful send pops one scripted event (if any) and emits it,
    /// standing in for the stack's completion report.
    #[derive(Clone, Default)]
    pub struct MockNetwork {
        pub calls: Arc<Mutex<Vec<String>>>,
        pub sent: Arc<Mutex<Vec<(u8, Vec<u8>)>>>,
        pub send_results: Arc<Mutex<VecDeque<std::result::Result<usize, SendError>>>>,
        pub completions: Arc<Mutex<VecDeque<NetworkEvent>>>,
        pub downlinks: Arc<Mutex<VecDeque<Downlink>>>,
        pub events: Arc<Mutex<Option<mpsc::Sender<NetworkEvent>>>>,
        pub connect_error: Arc<Mutex<bool>>,
    }

    impl MockNetwork {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_send_result(&self, result: std::result::Result<usize, SendError>) {
            self.send_results.lock().unwrap().push_back(result);
        }

        pub fn push_completion(&self, event: NetworkEvent) {
            self.completions.lock().unwrap().push_back(event);
        }

        pub fn push_downlink(&self, payload: &[u8]) {
            self.downlinks.lock().unwrap().push_back(Downlink {
                port: 15,
                payload: payload.to_vec(),
            });
        }

        pub fn set_connect_error(&self, fail: bool) {
            *self.connect_error.lock().unwrap() = fail;
        }

        /// Emit an event as the stack would
        pub fn emit(&self, event: NetworkEvent) {
            if let Some(events) = self.events.lock().unwrap().as_ref() {
                events.try_send(event).unwrap();
            }
        }

        pub fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn get_sent(&self) -> Vec<(u8, Vec<u8>)> {
            self.sent.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl NetworkService for MockNetwork {
        async fn initialize(&mut self, events: mpsc::Sender<NetworkEvent>) -> Result<()> {
            self.record("initialize".to_string());
            *self.events.lock().unwrap() = Some(events);
            Ok(())
        }

        fn set_retry_count(&mut self, retries: u8) -> Result<()> {
            self.record(format!("set_retry_count({})", retries));
            Ok(())
        }

        fn enable_adaptive_rate(&mut self) -> Result<()> {
            self.record("enable_adaptive_rate".to_string());
            Ok(())
        }

        async fn connect(&mut self, params: &JoinParams) -> Result<ConnectStatus> {
            self.record(format!("connect(trials={})", params.trials));
            if *self.connect_error.lock().unwrap() {
                return Err(FieldNodeError::Network("radio not responding".to_string()));
            }
            Ok(ConnectStatus::InProgress)
        }

        async fn send(&mut self, port: u8, payload: &[u8]) -> std::result::Result<usize, SendError> {
            self.sent.lock().unwrap().push((port, payload.to_vec()));
            let result = self
                .send_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(payload.len()));

            if result.is_ok() {
                let completion = self.completions.lock().unwrap().pop_front();
                if let Some(event) = completion {
                    self.emit(event);
                }
            }
            result
        }

        async fn receive(&mut self) -> Result<Downlink> {
            self.downlinks
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| FieldNodeError::Network("no downlink pending".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_params_from_session() {
        let session = SessionConfig {
            dev_eui: [1; 8],
            app_eui: [2; 8],
            app_key: [3; 16],
            join_trials: 5,
        };
        let params = JoinParams::from(&session);

        assert_eq!(params.dev_eui, [1; 8]);
        assert_eq!(params.app_key, [3; 16]);
        assert_eq!(params.trials, 5);
    }

    #[test]
    fn test_send_error_messages() {
        assert_eq!(SendError::WouldBlock.to_string(), "stack busy, send would block");
        assert_eq!(SendError::Rejected(-1010).to_string(), "send rejected with status -1010");
    }
}
