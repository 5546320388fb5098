use crate::errors::BidError;

/// Stable agent identifier
pub type AgentId = usize;

/// One cleared round of the slot auction
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    /// Submitted bids ordered by agent id
    pub bids: Vec<(AgentId, f64)>,
    /// Clicks per slot, slot 0 on top
    pub clicks: Vec<f64>,
    /// Agent holding each allocated slot, top first
    pub occupants: Vec<AgentId>,
    /// Price per click paid by each occupant
    pub per_click_prices: Vec<f64>,
}

impl Round {
    /// Round with bids and clicks only; bids are reordered by agent id
    pub fn new(mut bids: Vec<(AgentId, f64)>, clicks: Vec<f64>) -> Self {
        bids.sort_by_key(|&(agent_id, _)| agent_id);
        Self {
            bids,
            clicks,
            occupants: Vec::new(),
            per_click_prices: Vec::new(),
        }
    }

    pub fn num_slots(&self) -> usize {
        self.clicks.len()
    }

    pub fn bid_of(&self, agent_id: AgentId) -> Option<f64> {
        self.bids.iter().find(|&&(id, _)| id == agent_id).map(|&(_, bid)| bid)
    }

    /// Everyone's bid except `self_id`, in agent id order
    pub fn competitor_bids_by_id(&self, self_id: AgentId) -> Vec<(AgentId, f64)> {
        self.bids.iter()
            .copied()
            .filter(|&(agent_id, _)| agent_id != self_id)
            .collect()
    }

    /// Everyone's bid except `self_id`, highest first
    /// Equal bids keep agent id order, which is the mechanism's tie-break
    pub fn competitor_bids(&self, self_id: AgentId) -> Vec<(AgentId, f64)> {
        let mut others = self.competitor_bids_by_id(self_id);
        others.sort_by(|a, b| b.1.total_cmp(&a.1));
        others
    }
}

/// Append-only sequence of rounds; round t sits at index t
#[derive(Debug, Clone, Default)]
pub struct History {
    rounds: Vec<Round>,
}

impl History {
    pub fn new() -> Self {
        Self { rounds: Vec::new() }
    }

    pub fn push(&mut self, round: Round) {
        self.rounds.push(round);
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn round(&self, t: usize) -> Result<&Round, BidError> {
        self.rounds.get(t).ok_or(BidError::InsufficientHistory {
            requested: t as i64,
            available: self.rounds.len(),
        })
    }

    /// Round `t - back`, failing for lookback before round 0
    pub fn lookback(&self, t: usize, back: usize) -> Result<&Round, BidError> {
        match t.checked_sub(back) {
            Some(index) => self.round(index),
            None => Err(BidError::InsufficientHistory {
                requested: t as i64 - back as i64,
                available: self.rounds.len(),
            }),
        }
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }
}
