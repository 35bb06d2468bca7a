//! # Uplink Controller
//!
//! Connection state machine deciding what happens after every network
//! outcome.
//!
//! The controller performs no I/O. [`UplinkController::handle`] consumes one
//! [`UplinkEvent`] and returns the [`Action`]s the dispatcher must carry out:
//! transmitting, reading a downlink, scheduling follow-up events or stopping.
//!
//! ## States
//!
//! ```text
//! Unjoined -> Joining -> Connected -> Disconnected
//!                 \______________________/^
//! ```
//!
//! ## Duty-cycle mode
//!
//! With `duty_cycle` enabled the node sends as fast as the stack allows: a
//! completed send immediately starts the next cycle and transient failures
//! are retried with exponential backoff until the attempt budget runs out. A
//! blocked send gets a single retry after a fixed delay; when that retry is
//! blocked too, the frame is dropped and a fresh cycle starts after the
//! periodic interval. Every new cycle gets the full retry budget. Without it, a
//! recurring timer starts one cycle per interval and failures simply wait for
//! the next tick.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::UplinkConfig;
use crate::network::{NetworkEvent, TransientCause};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unjoined,
    Joining,
    Connected,
    Disconnected,
}

/// What started a send cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTrigger {
    /// First cycle after the join
    Join,
    /// Recurring interval timer
    Periodic,
    /// Previous send completed under duty cycling
    Continuation,
    /// Single retry after a blocked send
    BlockedRetry,
    /// Retry number `n` after a transient failure
    TransientRetry(u32),
    /// The network asked for an uplink
    UplinkRequested,
    /// Fresh cycle after exhausted retries, a rejected send or a dropped
    /// blocked retry
    Recovery,
}

impl CycleTrigger {
    /// Whether this cycle repeats a previous attempt rather than starting a new one
    pub fn is_retry(self) -> bool {
        matches!(self, CycleTrigger::BlockedRetry | CycleTrigger::TransientRetry(_))
    }
}

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkEvent {
    JoinSucceeded,
    JoinFailed,
    Disconnected,
    /// Sample, encode and submit one frame
    SendCycle(CycleTrigger),
    SendCompleted,
    /// The stack could not accept the frame right now
    SendBlocked,
    /// The stack refused the frame outright
    SendRejected(i16),
    SendTransientFailure(TransientCause),
    /// Transient retries used up after the given number of attempts
    RetriesExhausted(u32),
    ReceiveReady,
    ReceiveFailed,
    UplinkRequired,
}

impl From<NetworkEvent> for UplinkEvent {
    fn from(event: NetworkEvent) -> Self {
        match event {
            NetworkEvent::JoinSucceeded => UplinkEvent::JoinSucceeded,
            NetworkEvent::JoinFailed => UplinkEvent::JoinFailed,
            NetworkEvent::Disconnected => UplinkEvent::Disconnected,
            NetworkEvent::SendCompleted => UplinkEvent::SendCompleted,
            NetworkEvent::SendFailed(cause) => UplinkEvent::SendTransientFailure(cause),
            NetworkEvent::ReceiveReady => UplinkEvent::ReceiveReady,
            NetworkEvent::ReceiveFailed => UplinkEvent::ReceiveFailed,
            NetworkEvent::UplinkRequired => UplinkEvent::UplinkRequired,
        }
    }
}

/// Why the dispatcher must stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Disconnected,
    JoinFailed,
}

/// Work requested from the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Handle the event next, before waiting for anything else
    Dispatch(UplinkEvent),
    /// Handle the event once after the delay
    DispatchAfter(Duration, UplinkEvent),
    /// Handle the event at every period
    DispatchEvery(Duration, UplinkEvent),
    /// Sample sensors, encode and submit a frame
    Transmit,
    /// Fetch the pending downlink and apply it
    ReadDownlink,
    Stop(StopReason),
}

/// Retry and scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UplinkPolicy {
    pub duty_cycle: bool,
    pub tx_interval: Duration,
    pub blocked_retry_delay: Duration,
    /// Transient retries allowed per cycle; 0 means unbounded
    pub transient_max_attempts: u32,
    pub transient_backoff: Duration,
    pub transient_backoff_max: Duration,
}

impl From<&UplinkConfig> for UplinkPolicy {
    fn from(config: &UplinkConfig) -> Self {
        Self {
            duty_cycle: config.duty_cycle,
            tx_interval: config.tx_interval(),
            blocked_retry_delay: config.blocked_retry_delay(),
            transient_max_attempts: config.transient_max_attempts,
            transient_backoff: config.transient_backoff(),
            transient_backoff_max: config.transient_backoff_max(),
        }
    }
}

impl Default for UplinkPolicy {
    fn default() -> Self {
        Self::from(&UplinkConfig::default())
    }
}

impl UplinkPolicy {
    /// Delay before transient retry number `attempt` (1-based)
    ///
    /// Doubles from the base per attempt and saturates at the maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.transient_backoff
            .saturating_mul(factor)
            .min(self.transient_backoff_max)
    }

    fn retry_allowed(&self, attempt: u32) -> bool {
        self.transient_max_attempts == 0 || attempt <= self.transient_max_attempts
    }
}

/// The uplink state machine
#[derive(Debug)]
pub struct UplinkController {
    state: ConnectionState,
    policy: UplinkPolicy,
    /// Trigger of the cycle whose outcome is pending
    current: Option<CycleTrigger>,
    transient_attempts: u32,
}

impl UplinkController {
    pub fn new(policy: UplinkPolicy) -> Self {
        Self {
            state: ConnectionState::Unjoined,
            policy,
            current: None,
            transient_attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &UplinkPolicy {
        &self.policy
    }

    /// Transient retries used in the current cycle
    pub fn transient_attempts(&self) -> u32 {
        self.transient_attempts
    }

    /// Record that the join request was accepted by the stack
    pub fn begin_join(&mut self) {
        if self.state == ConnectionState::Unjoined {
            self.state = ConnectionState::Joining;
        }
    }

    /// Apply one event and return the resulting actions
    pub fn handle(&mut self, event: UplinkEvent) -> Vec<Action> {
        match self.state {
            ConnectionState::Unjoined => self.handle_unjoined(event),
            ConnectionState::Joining => self.handle_joining(event),
            ConnectionState::Connected => self.handle_connected(event),
            ConnectionState::Disconnected => {
                debug!("Ignoring {:?} after disconnect", event);
                Vec::new()
            }
        }
    }

    fn handle_unjoined(&mut self, event: UplinkEvent) -> Vec<Action> {
        match event {
            UplinkEvent::Disconnected => self.disconnect(),
            UplinkEvent::JoinSucceeded
            | UplinkEvent::JoinFailed
            | UplinkEvent::SendCycle(_)
            | UplinkEvent::SendCompleted
            | UplinkEvent::SendBlocked
            | UplinkEvent::SendRejected(_)
            | UplinkEvent::SendTransientFailure(_)
            | UplinkEvent::RetriesExhausted(_)
            | UplinkEvent::ReceiveReady
            | UplinkEvent::ReceiveFailed
            | UplinkEvent::UplinkRequired => {
                warn!("Ignoring {:?} before join was started", event);
                Vec::new()
            }
        }
    }

    fn handle_joining(&mut self, event: UplinkEvent) -> Vec<Action> {
        match event {
            UplinkEvent::JoinSucceeded => {
                info!("Connection established");
                self.state = ConnectionState::Connected;
                if self.policy.duty_cycle {
                    vec![Action::Dispatch(UplinkEvent::SendCycle(CycleTrigger::Join))]
                } else {
                    vec![Action::DispatchEvery(
                        self.policy.tx_interval,
                        UplinkEvent::SendCycle(CycleTrigger::Periodic),
                    )]
                }
            }
            UplinkEvent::JoinFailed => {
                error!("Join failed");
                self.state = ConnectionState::Disconnected;
                vec![Action::Stop(StopReason::JoinFailed)]
            }
            UplinkEvent::Disconnected => self.disconnect(),
            UplinkEvent::SendCycle(_)
            | UplinkEvent::SendCompleted
            | UplinkEvent::SendBlocked
            | UplinkEvent::SendRejected(_)
            | UplinkEvent::SendTransientFailure(_)
            | UplinkEvent::RetriesExhausted(_)
            | UplinkEvent::ReceiveReady
            | UplinkEvent::ReceiveFailed
            | UplinkEvent::UplinkRequired => {
                debug!("Ignoring {:?} while joining", event);
                Vec::new()
            }
        }
    }

    fn handle_connected(&mut self, event: UplinkEvent) -> Vec<Action> {
        let duty_cycle = self.policy.duty_cycle;

        match event {
            UplinkEvent::SendCycle(trigger) => {
                debug!("Send cycle ({:?})", trigger);
                // Retries spend the budget of the cycle they belong to.
                if !trigger.is_retry() {
                    self.transient_attempts = 0;
                }
                self.current = Some(trigger);
                vec![Action::Transmit]
            }
            UplinkEvent::SendCompleted => {
                debug!("Uplink completed");
                self.current = None;
                self.transient_attempts = 0;
                if duty_cycle {
                    vec![Action::Dispatch(UplinkEvent::SendCycle(CycleTrigger::Continuation))]
                } else {
                    Vec::new()
                }
            }
            UplinkEvent::SendBlocked => {
                let retrying = self.current == Some(CycleTrigger::BlockedRetry);
                self.current = None;
                if duty_cycle && !retrying {
                    debug!(
                        "Send blocked, retrying once in {:?}",
                        self.policy.blocked_retry_delay
                    );
                    vec![Action::DispatchAfter(
                        self.policy.blocked_retry_delay,
                        UplinkEvent::SendCycle(CycleTrigger::BlockedRetry),
                    )]
                } else if duty_cycle {
                    warn!(
                        "Blocked retry blocked again, dropping frame, next cycle in {:?}",
                        self.policy.tx_interval
                    );
                    vec![Action::DispatchAfter(
                        self.policy.tx_interval,
                        UplinkEvent::SendCycle(CycleTrigger::Recovery),
                    )]
                } else {
                    warn!("Send blocked, dropping frame");
                    Vec::new()
                }
            }
            UplinkEvent::SendRejected(status) => {
                error!("Send rejected by the stack (status {})", status);
                self.current = None;
                if duty_cycle {
                    vec![Action::DispatchAfter(
                        self.policy.tx_interval,
                        UplinkEvent::SendCycle(CycleTrigger::Recovery),
                    )]
                } else {
                    Vec::new()
                }
            }
            UplinkEvent::SendTransientFailure(cause) => {
                self.current = None;
                if !duty_cycle {
                    warn!("Transmission failed ({:?}), waiting for next interval", cause);
                    return Vec::new();
                }

                self.transient_attempts += 1;
                let attempt = self.transient_attempts;
                if self.policy.retry_allowed(attempt) {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Transmission failed ({:?}), retry {} in {:?}",
                        cause, attempt, delay
                    );
                    vec![Action::DispatchAfter(
                        delay,
                        UplinkEvent::SendCycle(CycleTrigger::TransientRetry(attempt)),
                    )]
                } else {
                    vec![Action::Dispatch(UplinkEvent::RetriesExhausted(attempt - 1))]
                }
            }
            UplinkEvent::RetriesExhausted(attempts) => {
                error!(
                    "Giving up after {} transient retries, next cycle in {:?}",
                    attempts, self.policy.tx_interval
                );
                self.transient_attempts = 0;
                if duty_cycle {
                    vec![Action::DispatchAfter(
                        self.policy.tx_interval,
                        UplinkEvent::SendCycle(CycleTrigger::Recovery),
                    )]
                } else {
                    Vec::new()
                }
            }
            UplinkEvent::ReceiveReady => vec![Action::ReadDownlink],
            UplinkEvent::ReceiveFailed => {
                warn!("Downlink reception failed");
                Vec::new()
            }
            UplinkEvent::UplinkRequired => {
                if duty_cycle {
                    vec![Action::Dispatch(UplinkEvent::SendCycle(
                        CycleTrigger::UplinkRequested,
                    ))]
                } else {
                    debug!("Uplink requested, next interval will serve it");
                    Vec::new()
                }
            }
            UplinkEvent::Disconnected => self.disconnect(),
            UplinkEvent::JoinSucceeded | UplinkEvent::JoinFailed => {
                warn!("Ignoring {:?} while connected", event);
                Vec::new()
            }
        }
    }

    fn disconnect(&mut self) -> Vec<Action> {
        info!("Disconnected");
        self.state = ConnectionState::Disconnected;
        vec![Action::Stop(StopReason::Disconnected)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duty_policy() -> UplinkPolicy {
        UplinkPolicy::default()
    }

    fn periodic_policy() -> UplinkPolicy {
        UplinkPolicy {
            duty_cycle: false,
            ..UplinkPolicy::default()
        }
    }

    fn connected(policy: UplinkPolicy) -> UplinkController {
        let mut controller = UplinkController::new(policy);
        controller.begin_join();
        controller.handle(UplinkEvent::JoinSucceeded);
        assert_eq!(controller.state(), ConnectionState::Connected);
        controller
    }

    #[test]
    fn test_join_under_duty_cycle_sends_immediately() {
        let mut controller = UplinkController::new(duty_policy());
        controller.begin_join();

        let actions = controller.handle(UplinkEvent::JoinSucceeded);
        assert_eq!(
            actions,
            vec![Action::Dispatch(UplinkEvent::SendCycle(CycleTrigger::Join))]
        );
    }

    #[test]
    fn test_join_without_duty_cycle_starts_periodic_timer() {
        let mut controller = UplinkController::new(periodic_policy());
        controller.begin_join();

        let actions = controller.handle(UplinkEvent::JoinSucceeded);
        assert_eq!(
            actions,
            vec![Action::DispatchEvery(
                Duration::from_secs(20),
                UplinkEvent::SendCycle(CycleTrigger::Periodic)
            )]
        );
    }

    #[test]
    fn test_join_failure_stops() {
        let mut controller = UplinkController::new(duty_policy());
        controller.begin_join();

        let actions = controller.handle(UplinkEvent::JoinFailed);
        assert_eq!(actions, vec![Action::Stop(StopReason::JoinFailed)]);
        assert_eq!(controller.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_events_before_join_are_ignored() {
        let mut controller = UplinkController::new(duty_policy());

        assert!(controller.handle(UplinkEvent::JoinSucceeded).is_empty());
        assert!(controller
            .handle(UplinkEvent::SendCycle(CycleTrigger::Periodic))
            .is_empty());
        assert_eq!(controller.state(), ConnectionState::Unjoined);
    }

    #[test]
    fn test_send_cycle_transmits() {
        let mut controller = connected(duty_policy());
        assert_eq!(
            controller.handle(UplinkEvent::SendCycle(CycleTrigger::Join)),
            vec![Action::Transmit]
        );
    }

    #[test]
    fn test_completed_send_continues_under_duty_cycle() {
        let mut controller = connected(duty_policy());
        controller.handle(UplinkEvent::SendCycle(CycleTrigger::Join));

        assert_eq!(
            controller.handle(UplinkEvent::SendCompleted),
            vec![Action::Dispatch(UplinkEvent::SendCycle(CycleTrigger::Continuation))]
        );
    }

    #[test]
    fn test_completed_send_waits_for_tick_without_duty_cycle() {
        let mut controller = connected(periodic_policy());
        controller.handle(UplinkEvent::SendCycle(CycleTrigger::Periodic));
        assert!(controller.handle(UplinkEvent::SendCompleted).is_empty());
    }

    #[test]
    fn test_blocked_send_gets_exactly_one_retry() {
        let mut controller = connected(duty_policy());
        controller.handle(UplinkEvent::SendCycle(CycleTrigger::Join));

        let retry = UplinkEvent::SendCycle(CycleTrigger::BlockedRetry);
        assert_eq!(
            controller.handle(UplinkEvent::SendBlocked),
            vec![Action::DispatchAfter(Duration::from_millis(3000), retry)]
        );

        assert_eq!(controller.handle(retry), vec![Action::Transmit]);
        assert_eq!(
            controller.handle(UplinkEvent::SendBlocked),
            vec![Action::DispatchAfter(
                Duration::from_secs(20),
                UplinkEvent::SendCycle(CycleTrigger::Recovery)
            )]
        );
    }

    #[test]
    fn test_fresh_cycle_gets_full_retry_budget() {
        let mut controller = connected(duty_policy());
        let failure = UplinkEvent::SendTransientFailure(TransientCause::Timeout);

        controller.handle(UplinkEvent::SendCycle(CycleTrigger::Join));
        for attempt in 1..=8u32 {
            controller.handle(failure);
            controller.handle(UplinkEvent::SendCycle(CycleTrigger::TransientRetry(attempt)));
        }
        assert_eq!(controller.transient_attempts(), 8);

        controller.handle(UplinkEvent::SendRejected(-1));
        controller.handle(UplinkEvent::SendCycle(CycleTrigger::Recovery));
        assert_eq!(controller.transient_attempts(), 0);

        assert_eq!(
            controller.handle(failure),
            vec![Action::DispatchAfter(
                Duration::from_secs(1),
                UplinkEvent::SendCycle(CycleTrigger::TransientRetry(1))
            )]
        );
    }

    #[test]
    fn test_retry_cycles_keep_attempt_count() {
        let mut controller = connected(duty_policy());
        controller.handle(UplinkEvent::SendTransientFailure(TransientCause::Radio));
        controller.handle(UplinkEvent::SendCycle(CycleTrigger::TransientRetry(1)));
        controller.handle(UplinkEvent::SendCycle(CycleTrigger::BlockedRetry));
        assert_eq!(controller.transient_attempts(), 1);

        controller.handle(UplinkEvent::SendCycle(CycleTrigger::UplinkRequested));
        assert_eq!(controller.transient_attempts(), 0);
    }

    #[test]
    fn test_blocked_send_dropped_without_duty_cycle() {
        let mut controller = connected(periodic_policy());
        controller.handle(UplinkEvent::SendCycle(CycleTrigger::Periodic));
        assert!(controller.handle(UplinkEvent::SendBlocked).is_empty());
    }

    #[test]
    fn test_five_transient_failures_are_all_retried() {
        let mut controller = connected(duty_policy());
        controller.handle(UplinkEvent::SendCycle(CycleTrigger::Join));

        for attempt in 1..=5u32 {
            let actions = controller.handle(UplinkEvent::SendTransientFailure(TransientCause::Timeout));
            let retry = UplinkEvent::SendCycle(CycleTrigger::TransientRetry(attempt));
            assert_eq!(
                actions,
                vec![Action::DispatchAfter(controller.policy().backoff(attempt), retry)]
            );
            assert_eq!(controller.handle(retry), vec![Action::Transmit]);
        }
        assert_eq!(controller.transient_attempts(), 5);
    }

    #[test]
    fn test_exhausted_retries_schedule_recovery_cycle() {
        let policy = UplinkPolicy {
            transient_max_attempts: 2,
            ..UplinkPolicy::default()
        };
        let mut controller = connected(policy);
        let failure = UplinkEvent::SendTransientFailure(TransientCause::Crypto);

        controller.handle(UplinkEvent::SendCycle(CycleTrigger::Join));
        assert!(matches!(controller.handle(failure)[..], [Action::DispatchAfter(..)]));
        assert!(matches!(controller.handle(failure)[..], [Action::DispatchAfter(..)]));

        let exhausted = controller.handle(failure);
        assert_eq!(exhausted, vec![Action::Dispatch(UplinkEvent::RetriesExhausted(2))]);

        assert_eq!(
            controller.handle(UplinkEvent::RetriesExhausted(2)),
            vec![Action::DispatchAfter(
                Duration::from_secs(20),
                UplinkEvent::SendCycle(CycleTrigger::Recovery)
            )]
        );
        assert_eq!(controller.transient_attempts(), 0);
    }

    #[test]
    fn test_completion_resets_transient_attempts() {
        let mut controller = connected(duty_policy());
        controller.handle(UplinkEvent::SendTransientFailure(TransientCause::Scheduling));
        controller.handle(UplinkEvent::SendTransientFailure(TransientCause::Scheduling));
        assert_eq!(controller.transient_attempts(), 2);

        controller.handle(UplinkEvent::SendCompleted);
        assert_eq!(controller.transient_attempts(), 0);
    }

    #[test]
    fn test_unbounded_retries_when_max_is_zero() {
        let policy = UplinkPolicy {
            transient_max_attempts: 0,
            ..UplinkPolicy::default()
        };
        let mut controller = connected(policy);

        for _ in 0..100 {
            let actions = controller.handle(UplinkEvent::SendTransientFailure(TransientCause::Radio));
            assert!(matches!(actions[..], [Action::DispatchAfter(..)]));
        }
    }

    #[test]
    fn test_transient_failure_waits_for_tick_without_duty_cycle() {
        let mut controller = connected(periodic_policy());
        assert!(controller
            .handle(UplinkEvent::SendTransientFailure(TransientCause::Timeout))
            .is_empty());
        assert_eq!(controller.transient_attempts(), 0);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = UplinkPolicy::default();

        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(7), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_rejected_send_recovers_after_interval() {
        let mut controller = connected(duty_policy());
        assert_eq!(
            controller.handle(UplinkEvent::SendRejected(-1017)),
            vec![Action::DispatchAfter(
                Duration::from_secs(20),
                UplinkEvent::SendCycle(CycleTrigger::Recovery)
            )]
        );
    }

    #[test]
    fn test_receive_ready_reads_downlink() {
        let mut controller = connected(periodic_policy());
        assert_eq!(controller.handle(UplinkEvent::ReceiveReady), vec![Action::ReadDownlink]);
        assert!(controller.handle(UplinkEvent::ReceiveFailed).is_empty());
    }

    #[test]
    fn test_uplink_required_sends_under_duty_cycle() {
        let mut controller = connected(duty_policy());
        assert_eq!(
            controller.handle(UplinkEvent::UplinkRequired),
            vec![Action::Dispatch(UplinkEvent::SendCycle(CycleTrigger::UplinkRequested))]
        );

        let mut controller = connected(periodic_policy());
        assert!(controller.handle(UplinkEvent::UplinkRequired).is_empty());
    }

    #[test]
    fn test_disconnect_is_terminal() {
        let mut controller = connected(duty_policy());

        assert_eq!(
            controller.handle(UplinkEvent::Disconnected),
            vec![Action::Stop(StopReason::Disconnected)]
        );
        assert_eq!(controller.state(), ConnectionState::Disconnected);
        assert!(controller
            .handle(UplinkEvent::SendCycle(CycleTrigger::Periodic))
            .is_empty());
        assert!(controller.handle(UplinkEvent::JoinSucceeded).is_empty());
    }

    #[test]
    fn test_network_events_map_to_uplink_events() {
        assert_eq!(
            UplinkEvent::from(NetworkEvent::SendFailed(TransientCause::Timeout)),
            UplinkEvent::SendTransientFailure(TransientCause::Timeout)
        );
        assert_eq!(UplinkEvent::from(NetworkEvent::ReceiveReady), UplinkEvent::ReceiveReady);
    }
}
