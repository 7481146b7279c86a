//! Learned action source: a logit model behind an action mask.

use std::collections::HashMap;

use gridworld_rs::{parse_target, Action, Dataset, Observation, Policy};

/// Logit assigned to actions that cannot change the state.
pub const MASKED_LOGIT: f32 = -1e9;

/// Anything that scores the six actions for an observation.
pub trait LogitModel {
    fn logits(&self, obs: &Observation) -> [f32; 6];
}

/// Which actions can change the state from `obs`. Indexed by action id.
pub fn action_mask(obs: &Observation) -> [bool; 6] {
    let (r, c) = obs.agent_pos;
    let last = obs.size.saturating_sub(1);
    let on_object = obs.object_at(obs.agent_pos).is_some();
    let holding = obs.holding.is_some();

    let mut allowed = [true; 6];
    allowed[Action::Up.index()] = r > 0;
    allowed[Action::Down.index()] = r < last;
    allowed[Action::Left.index()] = c > 0;
    allowed[Action::Right.index()] = c < last;
    allowed[Action::Pick.index()] = on_object && !holding;
    allowed[Action::Drop.index()] = holding;
    allowed
}

/// First index of the largest logit.
fn argmax(logits: &[f32; 6]) -> usize {
    let mut best = 0;
    for i in 1..logits.len() {
        if logits[i] > logits[best] {
            best = i;
        }
    }
    best
}

/// Wraps a logit model so it never picks an action that would be a no-op.
#[derive(Debug, Clone)]
pub struct MaskedAgent<M> {
    model: M,
}

impl<M: LogitModel> MaskedAgent<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn masked_logits(&self, obs: &Observation) -> [f32; 6] {
        let mut logits = self.model.logits(obs);
        for (l, ok) in logits.iter_mut().zip(action_mask(obs)) {
            if !ok {
                *l = MASKED_LOGIT;
            }
        }
        logits
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: LogitModel> Policy for MaskedAgent<M> {
    fn act(&mut self, obs: &Observation) -> Action {
        let idx = argmax(&self.masked_logits(obs));
        Action::ALL[idx]
    }
}

/// Offset sign to the target (row, col) and whether the target is held.
type FeatureKey = (i8, i8, bool);

fn features(obs: &Observation) -> Option<FeatureKey> {
    let target = parse_target(&obs.instruction)?;
    let held = obs.holding.as_deref() == Some(target.as_str());
    let (tr, tc) = obs.find_object(&target)?.pos;
    let (ar, ac) = obs.agent_pos;
    let dr = (tr as i64 - ar as i64).signum() as i8;
    let dc = (tc as i64 - ac as i64).signum() as i8;
    Some((dr, dc, held))
}

/// Count-based behaviour cloning over a coarse feature key.
///
/// Logits are `ln(1 + count)` of each action seen under the key; unseen keys score zero everywhere.
#[derive(Debug, Clone, Default)]
pub struct TabularModel {
    counts: HashMap<FeatureKey, [f32; 6]>,
}

impl TabularModel {
    pub fn train(dataset: &Dataset) -> Self {
        let mut counts: HashMap<FeatureKey, [f32; 6]> = HashMap::new();
        for sample in dataset.samples() {
            if let Some(key) = features(&sample.observation) {
                counts.entry(key).or_insert([0.0; 6])[sample.action.index()] += 1.0;
            }
        }
        Self { counts }
    }

    pub fn num_keys(&self) -> usize {
        self.counts.len()
    }
}

impl LogitModel for TabularModel {
    fn logits(&self, obs: &Observation) -> [f32; 6] {
        match features(obs).and_then(|k| self.counts.get(&k)) {
            Some(counts) => counts.map(|n| n.ln_1p()),
            None => [0.0; 6],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridworld_rs::{generate_demos, GridConfig, GridWorld, Object};

    struct Constant([f32; 6]);
    impl LogitModel for Constant {
        fn logits(&self, _obs: &Observation) -> [f32; 6] { self.0 }
    }

    fn obs(agent: (usize, usize), holding: Option<&str>) -> Observation {
        Observation {
            instruction: "pick up the red block".into(),
            agent_pos: agent,
            objects: vec![Object { color: "red".into(), pos: (3, 3) }],
            holding: holding.map(str::to_string),
            size: 7,
        }
    }

    #[test]
    fn corner_masks_walls_and_hands() {
        let m = action_mask(&obs((0, 0), None));
        assert_eq!(m, [false, true, false, true, false, false]);
        let m = action_mask(&obs((6, 6), None));
        assert_eq!(m, [true, false, true, false, false, false]);
    }

    #[test]
    fn pick_and_drop_masks_follow_hands() {
        let m = action_mask(&obs((3, 3), None));
        assert!(m[Action::Pick.index()]);
        assert!(!m[Action::Drop.index()]);
        let m = action_mask(&obs((3, 3), Some("red")));
        assert!(!m[Action::Pick.index()]);
        assert!(m[Action::Drop.index()]);
    }

    #[test]
    fn mask_uses_carried_size_even_far_from_border() {
        // Coordinates never reach 8, yet DOWN is still allowed at row 5 of a 9x9 grid.
        let mut o = obs((5, 5), None);
        o.size = 9;
        assert!(action_mask(&o)[Action::Down.index()]);
        o.agent_pos = (8, 8);
        assert!(!action_mask(&o)[Action::Down.index()]);
    }

    #[test]
    fn masked_agent_never_chooses_masked_action() {
        // Model prefers UP most, then PICK; at the top edge UP is masked.
        let mut agent = MaskedAgent::new(Constant([5.0, 0.0, 0.0, 1.0, 4.0, 3.0]));
        assert_eq!(agent.act(&obs((0, 2), None)), Action::Right);
        assert_eq!(agent.act(&obs((2, 2), None)), Action::Up);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(argmax(&[0.0, 0.0, 0.0, 0.0, 2.0, 2.0]), 4);
    }

    #[test]
    fn tabular_model_imitates_oracle() {
        let mut world = GridWorld::new(GridConfig { seed: 1, ..Default::default() }).unwrap();
        let demos = generate_demos(&mut world, 200).unwrap();
        let model = TabularModel::train(&Dataset::from_trajectories(&demos));
        assert!(model.num_keys() > 0);
        let mut agent = MaskedAgent::new(model);
        assert_eq!(agent.act(&obs((1, 1), None)), Action::Down);
        assert_eq!(agent.act(&obs((3, 3), None)), Action::Pick);
    }
}
