use crate::instruction::parse_target;
use crate::policy::Policy;
use crate::types::{Action, Observation};

/// Returned when there is no parsable target or the target is not on the grid.
/// It is a degenerate fallback, not a real no-op.
pub const FALLBACK_ACTION: Action = Action::Up;

/// Oracle action for a fully observable world.
///
/// Walks toward the target with row-first greedy steps, picks it up on arrival.
/// When the target is already held it answers DROP, which stands in for
/// "nothing left to do" and would release the object if actually applied.
pub fn expert_action(obs: &Observation) -> Action {
    let Some(target) = parse_target(&obs.instruction) else {
        return FALLBACK_ACTION;
    };
    if obs.holding.as_deref() == Some(target.as_str()) {
        return Action::Drop;
    }
    let Some(obj) = obs.find_object(&target) else {
        return FALLBACK_ACTION;
    };

    let (ar, ac) = obs.agent_pos;
    let (tr, tc) = obj.pos;
    if tr < ar {
        Action::Up
    } else if tr > ar {
        Action::Down
    } else if tc < ac {
        Action::Left
    } else if tc > ac {
        Action::Right
    } else {
        Action::Pick
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpertPolicy;

impl Policy for ExpertPolicy {
    fn act(&mut self, obs: &Observation) -> Action {
        expert_action(obs)
    }
}
