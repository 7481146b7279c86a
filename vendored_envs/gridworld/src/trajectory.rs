use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::GridWorld;
use crate::expert::expert_action;
use crate::types::{Action, GridError, Observation};

/// Extra copies of each PICK sample; PICK is rare in demonstrations but ends the episode.
pub const PICK_OVERSAMPLE: usize = 10;

/// One recorded transition: the observation the action was chosen from, the
/// action, and the reward it earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    pub obs: Observation,
    pub action: Action,
    pub reward: f64,
}

pub type Trajectory = Vec<TrajectoryStep>;

/// Reset with a synthesized instruction and let the oracle play until done.
pub fn run_expert_episode(world: &mut GridWorld) -> Result<Trajectory, GridError> {
    let mut obs = world.reset(None);
    let mut trajectory = Vec::new();
    loop {
        let action = expert_action(&obs);
        let out = world.step(action)?;
        trajectory.push(TrajectoryStep { obs, action, reward: out.reward });
        if out.done {
            break;
        }
        obs = out.observation;
    }
    debug!(steps = trajectory.len(), "expert episode finished");
    Ok(trajectory)
}

pub fn generate_demos(world: &mut GridWorld, episodes: usize) -> Result<Vec<Trajectory>, GridError> {
    (0..episodes).map(|_| run_expert_episode(world)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub observation: Observation,
    pub action: Action,
}

/// Flattened `(observation, action)` samples for behaviour cloning.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn from_trajectories(episodes: &[Trajectory]) -> Self {
        let mut samples = Vec::new();
        for step in episodes.iter().flatten() {
            let copies = if step.action == Action::Pick { 1 + PICK_OVERSAMPLE } else { 1 };
            for _ in 0..copies {
                samples.push(Sample { observation: step.obs.clone(), action: step.action });
            }
        }
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}
