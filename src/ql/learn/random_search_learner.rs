use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::environment::breakout::mechanics::GameAction;
use crate::environment::breakout::observation::Observation;
use crate::ql::learn::learner::Learner;
use crate::ql::model::linear_policy::LinearPolicy;
use crate::ql::model::policy::PolicyModel;

pub struct SearchParameter {
    /// Number of episodes a candidate plays before it gets judged
    pub episodes_per_candidate: usize,
    /// Uniform noise amplitude applied to every weight when deriving a new candidate
    pub perturbation_scale: f32,
}

impl Default for SearchParameter {
    fn default() -> Self {
        Self {
            episodes_per_candidate: 4,
            perturbation_scale: 0.05,
        }
    }
}

/// Hill climbing in the weight space of a [LinearPolicy].
///
/// A perturbed copy of the best policy (the incumbent) plays a few episodes; if its mean return
/// beats the incumbent's, it becomes the new incumbent. Then the next candidate is derived.
pub struct RandomSearchLearner {
    param: SearchParameter,
    rng: StdRng,
    incumbent: LinearPolicy,
    incumbent_score: Option<f32>,
    candidate: LinearPolicy,
    candidate_returns: Vec<f32>,
    generation: usize,
}

impl RandomSearchLearner {
    pub fn new(start: LinearPolicy, param: SearchParameter) -> Self {
        Self::with_rng(start, param, StdRng::from_entropy())
    }

    pub fn with_seed(start: LinearPolicy, param: SearchParameter, seed: u64) -> Self {
        Self::with_rng(start, param, StdRng::seed_from_u64(seed))
    }

    fn with_rng(start: LinearPolicy, param: SearchParameter, rng: StdRng) -> Self {
        assert!(param.episodes_per_candidate > 0);
        Self {
            param,
            rng,
            // the starting point gets measured first
            candidate: start.clone(),
            incumbent: start,
            incumbent_score: None,
            candidate_returns: Vec::new(),
            generation: 0,
        }
    }

    pub fn generation(&self) -> usize { self.generation }

    pub fn incumbent_score(&self) -> Option<f32> { self.incumbent_score }
}

impl Learner for RandomSearchLearner {
    type M = LinearPolicy;

    fn act(&mut self, observation: &Observation) -> Result<GameAction> { self.candidate.decide(observation) }

    fn episode_finished(&mut self, episode_return: f32) -> Result<()> {
        self.candidate_returns.push(episode_return);
        if self.candidate_returns.len() < self.param.episodes_per_candidate {
            return Ok(());
        }

        let mean = self.candidate_returns.iter().sum::<f32>() / self.candidate_returns.len() as f32;
        if self.incumbent_score.map_or(true, |score| mean > score) {
            log::debug!("generation {}: candidate takes over with mean return {:.2} (was {:?})", self.generation, mean, self.incumbent_score);
            self.incumbent = self.candidate.clone();
            self.incumbent_score = Some(mean);
        }
        self.candidate_returns.clear();
        self.candidate = self.incumbent.perturbed(&mut self.rng, self.param.perturbation_scale);
        self.generation += 1;
        Ok(())
    }

    fn best(&self) -> &LinearPolicy { &self.incumbent }
}
