//! Deadline-ordered timer queue for the dispatcher.
//!
//! Timers fire in deadline order; equal deadlines fire in scheduling order.
//! Nothing is ever cancelled, so a recurring timer and a one-shot retry may
//! both produce a send cycle close together.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use tokio::time::Instant;

use super::controller::UplinkEvent;

#[derive(Debug)]
struct Timer {
    deadline: Instant,
    seq: u64,
    period: Option<Duration>,
    event: UplinkEvent,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Pending one-shot and recurring events
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: BinaryHeap<Reverse<Timer>>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Fire `event` once after `delay`
    pub fn schedule_once(&mut self, delay: Duration, event: UplinkEvent) {
        self.push(Instant::now() + delay, None, event);
    }

    /// Fire `event` every `period`, first after one period
    pub fn schedule_every(&mut self, period: Duration, event: UplinkEvent) {
        self.push(Instant::now() + period, Some(period), event);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.peek().map(|Reverse(timer)| timer.deadline)
    }

    /// Pop the earliest timer if it is due at `now`
    ///
    /// Recurring timers are re-armed one period after their own deadline, so
    /// late handling does not drift the schedule.
    pub fn pop_due(&mut self, now: Instant) -> Option<UplinkEvent> {
        if self.next_deadline()? > now {
            return None;
        }

        let Reverse(timer) = self.timers.pop()?;
        if let Some(period) = timer.period {
            self.push(timer.deadline + period, Some(period), timer.event);
        }
        Some(timer.event)
    }

    /// Wait for the earliest timer and return its event
    ///
    /// Pends forever while the queue is empty. Cancel-safe: the queue is only
    /// touched after the sleep completes.
    pub async fn wait_next(&mut self) -> UplinkEvent {
        loop {
            match self.next_deadline() {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
            if let Some(event) = self.pop_due(Instant::now()) {
                return event;
            }
        }
    }

    fn push(&mut self, deadline: Instant, period: Option<Duration>, event: UplinkEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Reverse(Timer {
            deadline,
            seq,
            period,
            event,
        }));
    }
}
