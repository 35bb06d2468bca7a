//! Simulated radio stack for bench runs.
//!
//! Joins after a fixed delay, holds each transmission for its airtime and can
//! enforce a band off-time afterwards. Downlinks queued with
//! [`SimulatedNetwork::queue_downlink`] are announced after the next
//! completed uplink, like a class A receive window.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ConnectStatus, Downlink, JoinParams, NetworkEvent, NetworkService, SendError};
use crate::error::{FieldNodeError, Result};

/// Stack not initialized
pub const STATUS_NOT_INITIALIZED: i16 = -1011;
/// No session established yet
pub const STATUS_NO_ACTIVE_SESSIONS: i16 = -1017;
/// Payload longer than the current data rate allows
pub const STATUS_LENGTH_ERROR: i16 = -1009;

/// Largest application payload at the slowest data rate
pub const MAX_PAYLOAD_LEN: usize = 51;

/// Port on which simulated downlinks arrive
const DOWNLINK_PORT: u8 = 15;

/// In-process stand-in for the radio stack
#[derive(Debug)]
pub struct SimulatedNetwork {
    join_delay: Duration,
    airtime: Duration,
    off_time: Duration,
    events: Option<mpsc::Sender<NetworkEvent>>,
    joined: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
    band_free_at: Arc<Mutex<Option<Instant>>>,
    downlinks: Arc<Mutex<VecDeque<Downlink>>>,
    retries: u8,
    adaptive_rate: bool,
}

impl SimulatedNetwork {
    pub fn new(join_delay: Duration, airtime: Duration) -> Self {
        Self {
            join_delay,
            airtime,
            off_time: Duration::ZERO,
            events: None,
            joined: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicBool::new(false)),
            band_free_at: Arc::new(Mutex::new(None)),
            downlinks: Arc::new(Mutex::new(VecDeque::new())),
            retries: 0,
            adaptive_rate: false,
        }
    }

    /// Keep the band closed for `off_time` after each transmission
    pub fn with_off_time(mut self, off_time: Duration) -> Self {
        self.off_time = off_time;
        self
    }

    /// Queue a frame for the next receive window
    pub async fn queue_downlink(&self, payload: &[u8]) {
        self.downlinks.lock().await.push_back(Downlink {
            port: DOWNLINK_PORT,
            payload: payload.to_vec(),
        });
    }

    pub fn retry_count(&self) -> u8 {
        self.retries
    }

    pub fn adaptive_rate(&self) -> bool {
        self.adaptive_rate
    }

    fn sender(&self) -> std::result::Result<mpsc::Sender<NetworkEvent>, SendError> {
        self.events
            .clone()
            .ok_or(SendError::Rejected(STATUS_NOT_INITIALIZED))
    }
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_millis(400))
    }
}

async fn emit(events: &mpsc::Sender<NetworkEvent>, event: NetworkEvent) {
    if events.send(event).await.is_err() {
        debug!("Dropping {:?}: dispatcher gone", event);
    }
}

#[async_trait]
impl NetworkService for SimulatedNetwork {
    async fn initialize(&mut self, events: mpsc::Sender<NetworkEvent>) -> Result<()> {
        info!("Simulated radio stack initialized");
        self.events = Some(events);
        Ok(())
    }

    fn set_retry_count(&mut self, retries: u8) -> Result<()> {
        self.retries = retries;
        Ok(())
    }

    fn enable_adaptive_rate(&mut self) -> Result<()> {
        self.adaptive_rate = true;
        Ok(())
    }

    async fn connect(&mut self, params: &JoinParams) -> Result<ConnectStatus> {
        let events = self
            .events
            .clone()
            .ok_or_else(|| FieldNodeError::Network("stack not initialized".to_string()))?;

        if self.joined.load(Ordering::Acquire) {
            return Ok(ConnectStatus::Connected);
        }

        info!(
            "Joining with device EUI {:02X?} ({} trials)",
            params.dev_eui, params.trials
        );

        let joined = self.joined.clone();
        let join_delay = self.join_delay;
        tokio::spawn(async move {
            tokio::time::sleep(join_delay).await;
            joined.store(true, Ordering::Release);
            emit(&events, NetworkEvent::JoinSucceeded).await;
        });

        Ok(ConnectStatus::InProgress)
    }

    async fn send(&mut self, port: u8, payload: &[u8]) -> std::result::Result<usize, SendError> {
        let events = self.sender()?;

        if !self.joined.load(Ordering::Acquire) {
            return Err(SendError::Rejected(STATUS_NO_ACTIVE_SESSIONS));
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(SendError::Rejected(STATUS_LENGTH_ERROR));
        }

        {
            let band_free_at = self.band_free_at.lock().await;
            if band_free_at.map_or(false, |at| Instant::now() < at) {
                return Err(SendError::WouldBlock);
            }
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SendError::WouldBlock);
        }

        debug!("Transmitting {} bytes on port {}", payload.len(), port);

        let in_flight = self.in_flight.clone();
        let band_free_at = self.band_free_at.clone();
        let downlinks = self.downlinks.clone();
        let airtime = self.airtime;
        let off_time = self.off_time;
        tokio::spawn(async move {
            tokio::time::sleep(airtime).await;
            *band_free_at.lock().await = Some(Instant::now() + off_time);
            in_flight.store(false, Ordering::Release);
            emit(&events, NetworkEvent::SendCompleted).await;

            let pending = !downlinks.lock().await.is_empty();
            if pending {
                emit(&events, NetworkEvent::ReceiveReady).await;
            }
        });

        Ok(payload.len())
    }

    async fn receive(&mut self) -> Result<Downlink> {
        self.downlinks
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| FieldNodeError::Network("no downlink pending".to_string()))
    }
}
