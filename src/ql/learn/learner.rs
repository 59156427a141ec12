use anyhow::Result;

use crate::environment::breakout::mechanics::GameAction;
use crate::environment::breakout::observation::Observation;
use crate::ql::model::policy::PolicyModel;

/// The improvement side of a policy, driven by the training loop.
pub trait Learner: Send {
    type M: PolicyModel;

    /// Greedy action of the policy currently under training
    fn act(&mut self, observation: &Observation) -> Result<GameAction>;

    /// Feeds the return of one completed episode; this is where the policy improves
    fn episode_finished(&mut self, episode_return: f32) -> Result<()>;

    /// Best policy found so far, as candidate for a checkpoint
    fn best(&self) -> &Self::M;
}
