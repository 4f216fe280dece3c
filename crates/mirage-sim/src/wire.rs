//! Fault-injecting response delivery.
//!
//! Two lanes model the two real channels back to the client:
//!
//! - **Push lane** (deltas): an ordered stream — messages can be
//!   delayed but never overtake each other and never duplicate,
//!   matching a websocket carrying server-ordered state updates.
//! - **Rejection lane** (promise rejections): independent per-request
//!   failures — delayed arbitrarily, reordered against everything, and
//!   occasionally duplicated, exercising the reconciler's idempotent
//!   no-op paths.

use mirage_core::{Delta, MutationId, RequestError};
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;

/// Fault injection configuration for simulated response delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Maximum delivery delay in rounds.
    pub max_delay_rounds: u8,
    /// Percentage of rejections duplicated.
    pub duplicate_rate_percent: u8,
    /// Percentage chance of delivering ready rejections ahead of ready
    /// deltas at each tick.
    pub reorder_rate_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_delay_rounds: 3,
            duplicate_rate_percent: 5,
            reorder_rate_percent: 10,
        }
    }
}

/// One response delivered to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Delta(Delta),
    Rejection {
        mutation_id: MutationId,
        error: RequestError,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Pending {
    deliver_at_round: u64,
    message: WireMessage,
}

/// The simulated wire between server and client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseWire {
    push_lane: Vec<Pending>,
    rejection_lane: Vec<Pending>,
    fault: FaultConfig,
    last_push_round: u64,
    duplicates_sent: usize,
}

impl ResponseWire {
    #[must_use]
    pub fn new(fault: FaultConfig) -> Self {
        Self {
            push_lane: Vec::new(),
            rejection_lane: Vec::new(),
            fault,
            last_push_round: 0,
            duplicates_sent: 0,
        }
    }

    /// Queue a delta on the ordered push lane.
    pub fn send_delta(&mut self, delta: Delta, round: u64, rng: &mut DeterministicRng) {
        let delay = rng.next_bounded(u64::from(self.fault.max_delay_rounds) + 1);
        // Non-overtaking: never schedule before the previous push.
        let deliver_at_round = (round + delay).max(self.last_push_round);
        self.last_push_round = deliver_at_round;
        self.push_lane.push(Pending {
            deliver_at_round,
            message: WireMessage::Delta(delta),
        });
    }

    /// Queue a rejection; may be duplicated.
    pub fn send_rejection(
        &mut self,
        mutation_id: MutationId,
        error: RequestError,
        round: u64,
        rng: &mut DeterministicRng,
    ) {
        let copies = if rng.hit_rate_percent(self.fault.duplicate_rate_percent) {
            self.duplicates_sent += 1;
            2
        } else {
            1
        };
        for _ in 0..copies {
            let delay = rng.next_bounded(u64::from(self.fault.max_delay_rounds) + 1);
            self.rejection_lane.push(Pending {
                deliver_at_round: round + delay,
                message: WireMessage::Rejection {
                    mutation_id: mutation_id.clone(),
                    error: error.clone(),
                },
            });
        }
    }

    /// Deliver every message whose round has arrived.
    #[must_use]
    pub fn deliver_ready(&mut self, round: u64, rng: &mut DeterministicRng) -> Vec<WireMessage> {
        let mut deltas = Vec::new();
        let mut future = Vec::new();
        for pending in self.push_lane.drain(..) {
            if pending.deliver_at_round <= round {
                deltas.push(pending.message);
            } else {
                future.push(pending);
            }
        }
        self.push_lane = future;

        let mut rejections = Vec::new();
        let mut future = Vec::new();
        for pending in self.rejection_lane.drain(..) {
            if pending.deliver_at_round <= round {
                rejections.push(pending.message);
            } else {
                future.push(pending);
            }
        }
        self.rejection_lane = future;
        rng.shuffle(&mut rejections);

        if rng.hit_rate_percent(self.fault.reorder_rate_percent) {
            rejections.extend(deltas);
            rejections
        } else {
            deltas.extend(rejections);
            deltas
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.push_lane.is_empty() && self.rejection_lane.is_empty()
    }

    #[must_use]
    pub const fn duplicates_sent(&self) -> usize {
        self.duplicates_sent
    }
}
