use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::GridWorld;
use crate::expert::ExpertPolicy;
use crate::policy::Policy;
use crate::types::{Action, GridError, Observation, Pos, StepOutcome};

pub const HISTORY_CAPACITY: usize = 6;

/// What the controller compares between steps to tell whether anything changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub agent_pos: Pos,
    pub holding: Option<String>,
}

impl From<&Observation> for Signature {
    fn from(obs: &Observation) -> Self {
        Self { agent_pos: obs.agent_pos, holding: obs.holding.clone() }
    }
}

/// Sliding window of the last [`HISTORY_CAPACITY`] signatures, oldest evicted first.
#[derive(Debug, Clone)]
pub struct SignatureHistory {
    buf: VecDeque<Signature>,
}

impl Default for SignatureHistory {
    fn default() -> Self {
        Self { buf: VecDeque::with_capacity(HISTORY_CAPACITY) }
    }
}

impl SignatureHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sig: Signature) {
        if self.buf.len() == HISTORY_CAPACITY {
            self.buf.pop_front();
        }
        self.buf.push_back(sig);
    }

    /// `back(1)` is the most recent entry.
    pub fn back(&self, n: usize) -> Option<&Signature> {
        if n == 0 || n > self.buf.len() {
            return None;
        }
        self.buf.get(self.buf.len() - n)
    }

    /// True when the last four entries alternate between two distinct values.
    pub fn is_oscillating(&self) -> bool {
        match (self.back(4), self.back(3), self.back(2), self.back(1)) {
            (Some(s4), Some(s3), Some(s2), Some(s1)) => s4 == s2 && s3 == s1 && s4 != s3,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryReason {
    Oscillation,
    Stall,
}

/// Result of one control-loop step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlStep {
    /// What the action source asked for.
    pub proposed: Action,
    /// The action behind `outcome`: `proposed`, or the oracle's corrective action.
    pub action: Action,
    pub outcome: StepOutcome,
    pub recovery: Option<RecoveryReason>,
}

/// Drives a [`GridWorld`] with a pluggable action source and substitutes one
/// oracle step whenever the source oscillates or stalls.
///
/// Owns its history; one controller per episode stream.
#[derive(Debug, Clone)]
pub struct RecoveringController<P> {
    source: P,
    expert: ExpertPolicy,
    history: SignatureHistory,
    recoveries: usize,
}

impl<P: Policy> RecoveringController<P> {
    pub fn new(source: P) -> Self {
        Self { source, expert: ExpertPolicy, history: SignatureHistory::new(), recoveries: 0 }
    }

    /// Forget the history; call alongside `GridWorld::reset`.
    pub fn reset(&mut self) {
        self.history.clear();
        self.recoveries = 0;
    }

    pub fn step(&mut self, world: &mut GridWorld, obs: &Observation) -> Result<ControlStep, GridError> {
        let proposed = self.source.act(obs);
        let before = Signature::from(obs);
        self.history.push(before.clone());

        let first = world.step(proposed)?;
        let after = Signature::from(&first.observation);

        let reason = if self.history.is_oscillating() {
            Some(RecoveryReason::Oscillation)
        } else if after == before {
            Some(RecoveryReason::Stall)
        } else {
            None
        };

        match reason {
            Some(reason) if !first.done => {
                let corrective = self.expert.act(&first.observation);
                self.recoveries += 1;
                info!(?reason, %proposed, %corrective, step = first.info.step, "recovering with oracle step");
                let outcome = world.step(corrective)?;
                Ok(ControlStep { proposed, action: corrective, outcome, recovery: Some(reason) })
            }
            _ => {
                debug!(%proposed, reward = first.reward, done = first.done, "policy step");
                Ok(ControlStep { proposed, action: proposed, outcome: first, recovery: None })
            }
        }
    }

    /// Step until `done` or until `budget` control steps have been taken.
    pub fn run(&mut self, world: &mut GridWorld, start: Observation, budget: usize) -> Result<Vec<ControlStep>, GridError> {
        let mut obs = start;
        let mut steps = Vec::new();
        for _ in 0..budget {
            let step = self.step(world, &obs)?;
            let done = step.outcome.done;
            obs = step.outcome.observation.clone();
            steps.push(step);
            if done {
                break;
            }
        }
        Ok(steps)
    }

    pub fn history(&self) -> &SignatureHistory {
        &self.history
    }

    pub fn recoveries(&self) -> usize {
        self.recoveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(r: usize, c: usize) -> Signature {
        Signature { agent_pos: (r, c), holding: None }
    }

    #[test]
    fn window_is_bounded() {
        let mut h = SignatureHistory::new();
        for i in 0..10 {
            h.push(sig(i, 0));
        }
        assert_eq!(h.len(), HISTORY_CAPACITY);
        assert_eq!(h.back(1), Some(&sig(9, 0)));
        assert_eq!(h.back(6), Some(&sig(4, 0)));
        assert_eq!(h.back(7), None);
        assert_eq!(h.back(0), None);
    }

    #[test]
    fn two_cycle_is_oscillation() {
        let mut h = SignatureHistory::new();
        for s in [sig(1, 1), sig(1, 2), sig(1, 1)] {
            h.push(s);
            assert!(!h.is_oscillating());
        }
        h.push(sig(1, 2));
        assert!(h.is_oscillating());
    }

    #[test]
    fn distinct_or_constant_is_not_oscillation() {
        let mut h = SignatureHistory::new();
        for s in [sig(1, 1), sig(1, 2), sig(1, 3), sig(2, 3)] {
            h.push(s);
        }
        assert!(!h.is_oscillating());

        let mut h = SignatureHistory::new();
        for _ in 0..4 {
            h.push(sig(2, 2));
        }
        assert!(!h.is_oscillating());
    }

    #[test]
    fn holding_is_part_of_signature() {
        let mut h = SignatureHistory::new();
        let held = Signature { agent_pos: (1, 1), holding: Some("red".into()) };
        for s in [sig(1, 1), held.clone(), sig(1, 1), held] {
            h.push(s);
        }
        assert!(h.is_oscillating());
    }
}
