//! Acknowledgment controller.
//!
//! Each delivery moves `Received -> Processing -> {Acked, Requeued, Nacked, Lost}`.
//! Under auto-ack the broker settled the message at receipt, so a failed
//! pipeline can only end in `Lost`. Under manual ack the controller picks the
//! acknowledgment from the outcome and the attempt number.

use lead_core::{Error, Result};
use rabbitmq::{AckMode, DEFAULT_MAX_ATTEMPTS};

use crate::handler::Outcome;

/// Lifecycle state of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Received,
    Processing,
    Acked,
    /// Returned to the queue for redelivery.
    Requeued,
    /// Rejected without requeue.
    Nacked,
    /// Settled by the broker at receipt but never processed successfully.
    Lost,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Received | Self::Processing)
    }
}

/// What to tell the broker about a processed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Ack,
    Nack { requeue: bool },
    /// Auto-ack consumer; the broker needs nothing more.
    AlreadyAcked,
}

/// Chooses acknowledgments for one queue.
#[derive(Debug, Clone, Copy)]
pub struct AckController {
    mode: AckMode,
    max_attempts: u32,
}

impl AckController {
    pub fn new(mode: AckMode) -> Self {
        Self {
            mode,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn mode(&self) -> AckMode {
        self.mode
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides the acknowledgment for a finished pipeline.
    ///
    /// `attempt` is 1-based. A retryable failure is requeued until it has
    /// used `max_attempts`, then rejected so it cannot loop forever.
    pub fn decide(&self, outcome: &Outcome, attempt: u32) -> AckDecision {
        if self.mode.is_auto() {
            return AckDecision::AlreadyAcked;
        }

        if outcome.is_retryable() {
            AckDecision::Nack {
                requeue: attempt < self.max_attempts,
            }
        } else {
            AckDecision::Ack
        }
    }

    pub fn tracker(&self) -> DeliveryTracker {
        DeliveryTracker::new(self.mode)
    }
}

/// Enforces the per-delivery state machine.
#[derive(Debug)]
pub struct DeliveryTracker {
    mode: AckMode,
    state: DeliveryState,
}

impl DeliveryTracker {
    pub fn new(mode: AckMode) -> Self {
        Self {
            mode,
            state: DeliveryState::Received,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn begin(&mut self) -> Result<()> {
        self.transition(DeliveryState::Received, DeliveryState::Processing)
    }

    /// Records that `decision` was delivered to the broker.
    pub fn settle(&mut self, decision: AckDecision, outcome: &Outcome) -> Result<DeliveryState> {
        let next = match decision {
            AckDecision::Ack => DeliveryState::Acked,
            AckDecision::Nack { requeue: true } => DeliveryState::Requeued,
            AckDecision::Nack { requeue: false } => DeliveryState::Nacked,
            AckDecision::AlreadyAcked if outcome.is_retryable() => DeliveryState::Lost,
            AckDecision::AlreadyAcked => DeliveryState::Acked,
        };

        if !self.mode.is_auto() && decision == AckDecision::AlreadyAcked {
            return Err(Error::internal(
                "manual-ack delivery settled without an acknowledgment",
            ));
        }

        self.transition(DeliveryState::Processing, next)?;
        Ok(next)
    }

    /// Records that the acknowledgment could not be sent.
    ///
    /// The broker redelivers every unacknowledged message once the channel
    /// closes.
    pub fn settle_failed(&mut self) -> Result<DeliveryState> {
        self.transition(DeliveryState::Processing, DeliveryState::Requeued)?;
        Ok(DeliveryState::Requeued)
    }

    fn transition(&mut self, from: DeliveryState, to: DeliveryState) -> Result<()> {
        if self.state != from {
            return Err(Error::internal(format!(
                "invalid delivery transition {:?} -> {:?}",
                self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }
}
