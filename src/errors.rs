use thiserror::Error;

use crate::history::AgentId;

/// Failures of the bidding core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BidError {
    /// The solved bid falls outside the tying range of its target slot.
    /// Utility ranking and slot ranges disagree; the turn must be aborted.
    #[error("agent {agent_id}: solved bid {bid:.4} for slot {slot} outside [{min_bid:.4}, {max_bid:.4}]")]
    InvariantViolation {
        agent_id: AgentId,
        slot: usize,
        bid: f64,
        min_bid: f64,
        max_bid: f64,
    },
    /// Adjacent slots have the same click count, so the balance equation has no unique solution
    #[error("zero click differential between slot {slot} and the slot above it ({clicks} clicks)")]
    DivisionByZero { slot: usize, clicks: f64 },
    /// Lookback to a round that was not recorded
    #[error("round {requested} requested but history holds {available} rounds")]
    InsufficientHistory { requested: i64, available: usize },
    /// The round has an empty click vector
    #[error("round {round} has no slots")]
    NoSlots { round: usize },
}
