//! # Uplink Dispatcher
//!
//! Single task that owns the network service, the sensor sampler and the
//! indicator, feeds every event through the [`UplinkController`] and carries
//! out the resulting actions strictly one after another.
//!
//! Events come from three places, in this priority:
//!
//! 1. Follow-ups the controller asked to handle immediately
//! 2. The network stack's event channel
//! 3. The deadline-ordered [`TimerQueue`]

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::controller::{Action, StopReason, UplinkController, UplinkEvent, UplinkPolicy};
use super::timers::TimerQueue;
use super::validate_identity;
use crate::actuator::Actuator;
use crate::config::Config;
use crate::error::{FieldNodeError, Result};
use crate::fix::{Fix, FixReader};
use crate::network::{JoinParams, NetworkEvent, NetworkService, SendError, EVENT_QUEUE_DEPTH};
use crate::payload::{decode_command, encode, encode_versioned, UPLINK_FRAME_LEN, VERSIONED_FRAME_LEN};
use crate::sensors::{SampleSet, SensorSampler};

/// Counters reported when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UplinkStats {
    pub cycles: u64,
    pub submitted: u64,
    pub completed: u64,
    pub blocked: u64,
    pub rejected: u64,
    pub transient_failures: u64,
    pub exhausted: u64,
    pub downlinks_applied: u64,
}

/// What one cycle sends, as logged at debug
#[derive(Debug, Serialize)]
struct CycleRecord<'a> {
    samples: &'a SampleSet,
    fix: &'a Fix,
}

/// A joined (or joining) node ready to run
pub struct UplinkNode<N: NetworkService> {
    controller: UplinkController,
    network: N,
    events: mpsc::Receiver<NetworkEvent>,
    sampler: SensorSampler,
    fix: FixReader,
    actuator: Box<dyn Actuator>,
    timers: TimerQueue,
    pending: VecDeque<UplinkEvent>,
    tx_buffer: [u8; VERSIONED_FRAME_LEN],
    app_port: u8,
    versioned: bool,
    stats: UplinkStats,
}

impl<N: NetworkService> std::fmt::Debug for UplinkNode<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UplinkNode")
            .field("state", &self.controller.state())
            .field("app_port", &self.app_port)
            .field("versioned", &self.versioned)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn fatal<E: std::fmt::Display>(step: &str) -> impl FnOnce(E) -> FieldNodeError + '_ {
    move |e| FieldNodeError::FatalInit(format!("{} failed: {}", step, e))
}

impl<N: NetworkService> UplinkNode<N> {
    /// Bring up the network stack and start the join
    ///
    /// Validates the session identity, initializes the stack with a fresh
    /// event channel, sets the confirmed-message retry count, enables
    /// adaptive data rate when configured and requests an over-the-air join.
    /// The join outcome arrives later as an event handled by [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`FieldNodeError::FatalInit`]; the
    /// dispatcher is never started.
    pub async fn join(
        mut network: N,
        config: &Config,
        sampler: SensorSampler,
        fix: FixReader,
        actuator: Box<dyn Actuator>,
    ) -> Result<Self> {
        validate_identity(&config.session)?;

        let (event_tx, events) = mpsc::channel(EVENT_QUEUE_DEPTH);
        network.initialize(event_tx).await.map_err(fatal("stack initialization"))?;
        network
            .set_retry_count(config.uplink.confirmed_retries)
            .map_err(fatal("setting retry count"))?;
        if config.uplink.adaptive_rate {
            network.enable_adaptive_rate().map_err(fatal("enabling adaptive rate"))?;
        }

        let status = network
            .connect(&JoinParams::from(&config.session))
            .await
            .map_err(fatal("connect"))?;
        info!("Join request accepted ({:?})", status);

        let mut controller = UplinkController::new(UplinkPolicy::from(&config.uplink));
        controller.begin_join();

        Ok(Self {
            controller,
            network,
            events,
            sampler,
            fix,
            actuator,
            timers: TimerQueue::new(),
            pending: VecDeque::new(),
            tx_buffer: [0; VERSIONED_FRAME_LEN],
            app_port: config.uplink.app_port,
            versioned: config.payload.schema_version_byte,
            stats: UplinkStats::default(),
        })
    }

    /// Dispatch events until the connection ends
    ///
    /// # Returns
    ///
    /// The uplink counters once the network reports a disconnect
    ///
    /// # Errors
    ///
    /// Returns [`FieldNodeError::JoinFailed`] if the join is rejected and
    /// [`FieldNodeError::Network`] if the stack drops its event channel.
    pub async fn run(mut self) -> Result<UplinkStats> {
        info!(
            "Uplink dispatcher running (port {}, {})",
            self.app_port,
            if self.controller.policy().duty_cycle { "duty-cycle" } else { "periodic" }
        );

        loop {
            let event = match self.pending.pop_front() {
                Some(event) => event,
                None => self.next_event().await?,
            };
            self.record(&event);

            for action in self.controller.handle(event) {
                if let Some(reason) = self.execute(action).await {
                    return self.finish(reason);
                }
            }
        }
    }

    async fn next_event(&mut self) -> Result<UplinkEvent> {
        tokio::select! {
            received = self.events.recv() => received
                .map(UplinkEvent::from)
                .ok_or_else(|| FieldNodeError::Network("event channel closed".to_string())),
            event = self.timers.wait_next() => Ok(event),
        }
    }

    async fn execute(&mut self, action: Action) -> Option<StopReason> {
        match action {
            Action::Dispatch(event) => self.pending.push_back(event),
            Action::DispatchAfter(delay, event) => self.timers.schedule_once(delay, event),
            Action::DispatchEvery(period, event) => self.timers.schedule_every(period, event),
            Action::Transmit => {
                if let Some(outcome) = self.transmit().await {
                    self.pending.push_back(outcome);
                }
            }
            Action::ReadDownlink => self.read_downlink().await,
            Action::Stop(reason) => return Some(reason),
        }
        None
    }

    /// Sample, encode and submit one frame
    ///
    /// Returns the event to handle next when the stack refuses the frame
    /// synchronously.
    async fn transmit(&mut self) -> Option<UplinkEvent> {
        let samples = self.sampler.sample().await;
        let fix = self.fix.snapshot();

        let missing = samples.missing_channels();
        if !missing.is_empty() {
            debug!("Sending with missing channels: {:?}", missing);
        }
        let record = CycleRecord {
            samples: &samples,
            fix: &fix,
        };
        match serde_json::to_string(&record) {
            Ok(json) => debug!("Uplink record {}", json),
            Err(e) => warn!("Failed to serialize uplink record: {}", e),
        }

        let len = if self.versioned {
            self.tx_buffer = encode_versioned(&samples, &fix);
            VERSIONED_FRAME_LEN
        } else {
            self.tx_buffer[..UPLINK_FRAME_LEN].copy_from_slice(&encode(&samples, &fix));
            UPLINK_FRAME_LEN
        };

        let result = self.network.send(self.app_port, &self.tx_buffer[..len]).await;
        self.tx_buffer.fill(0);

        match result {
            Ok(accepted) => {
                self.stats.submitted += 1;
                debug!("Submitted {} bytes on port {}", accepted, self.app_port);
                None
            }
            Err(SendError::WouldBlock) => Some(UplinkEvent::SendBlocked),
            Err(SendError::Rejected(status)) => Some(UplinkEvent::SendRejected(status)),
        }
    }

    async fn read_downlink(&mut self) {
        let downlink = match self.network.receive().await {
            Ok(downlink) => downlink,
            Err(e) => {
                warn!("Failed to read downlink: {}", e);
                return;
            }
        };

        match decode_command(&downlink.payload) {
            Some(state) => {
                info!("Downlink on port {} sets indicator {:?}", downlink.port, state);
                self.actuator.apply(state);
                self.stats.downlinks_applied += 1;
            }
            None => debug!(
                "Ignoring unrecognized downlink ({} bytes on port {})",
                downlink.payload.len(),
                downlink.port
            ),
        }
    }

    fn record(&mut self, event: &UplinkEvent) {
        let stats = &mut self.stats;
        match event {
            UplinkEvent::SendCycle(_) => stats.cycles += 1,
            UplinkEvent::SendCompleted => stats.completed += 1,
            UplinkEvent::SendBlocked => stats.blocked += 1,
            UplinkEvent::SendRejected(_) => stats.rejected += 1,
            UplinkEvent::SendTransientFailure(_) => stats.transient_failures += 1,
            UplinkEvent::RetriesExhausted(_) => stats.exhausted += 1,
            _ => {}
        }
    }

    fn finish(self, reason: StopReason) -> Result<UplinkStats> {
        match reason {
            StopReason::Disconnected => {
                info!(
                    "Uplink dispatcher stopped: {}",
                    serde_json::to_string(&self.stats).unwrap_or_default()
                );
                Ok(self.stats)
            }
            StopReason::JoinFailed => Err(FieldNodeError::JoinFailed(
                "network did not accept the join request".to_string(),
            )),
        }
    }
}
