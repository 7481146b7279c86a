use crate::types::{Action, Observation};

/// Anything that maps an observation to an action: the oracle, a learned
/// agent, or a scripted sequence in tests.
pub trait Policy {
    fn act(&mut self, obs: &Observation) -> Action;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn act(&mut self, obs: &Observation) -> Action {
        (**self).act(obs)
    }
}

impl<P: Policy + ?Sized> Policy for &mut P {
    fn act(&mut self, obs: &Observation) -> Action {
        (**self).act(obs)
    }
}
