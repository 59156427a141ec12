use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use num_format::ToFormattedString;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use crate::environment::breakout::mechanics::GameAction;
use crate::environment::breakout_environment::EpisodeController;
use crate::ql::learn::learner::Learner;
use crate::ql::learn::replay_buffer::ReplayBuffer;
use crate::ql::model::policy::PolicyModel;
use crate::ql::prelude::{Action, Environment};
use crate::store::policy_store::{CheckpointOutcome, PolicyStore};
use crate::util::format;
use crate::util::immutable::Immutable;

pub struct Parameter {
    pub max_steps_per_episode: usize,
    /// Every that many steps the recent mean return is compared against the stored best policy
    pub evaluation_interval_steps: usize,
    /// Number of recent episodes the mean return is computed over
    pub episode_reward_history_buffer_len: usize,
    /// Maximum epsilon greedy parameter
    pub epsilon_max: f32,
    /// Minimum epsilon greedy parameter
    pub epsilon_min: f32,
    // Number of steps over which epsilon decays from max to min
    pub epsilon_greedy_steps: f32,
    pub stats_after_steps: usize,
    /// simulation time per step in milliseconds
    pub step_dt_ms: f32,
}

impl Parameter {
    fn epsilon_interval(&self) -> f32 { self.epsilon_max - self.epsilon_min }
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            max_steps_per_episode: 20_000,
            evaluation_interval_steps: 1_000,
            episode_reward_history_buffer_len: 100,
            epsilon_max: 1.0,
            epsilon_min: 0.05,
            epsilon_greedy_steps: 500_000.0,
            stats_after_steps: 25_000,
            step_dt_ms: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingStats {
    pub steps: usize,
    pub episodes: usize,
    pub evaluations: usize,
    /// checkpoints which replaced the stored best policy
    pub checkpoints: usize,
    pub last_mean_return: Option<f32>,
    pub epsilon: f32,
}

/// Background training: drives its own self-driven [EpisodeController] episode by episode,
/// lets the [Learner] improve and offers the learner's best policy to the [PolicyStore]
/// whenever the recent mean return beats the stored quality.
pub struct TrainingLoop<L: Learner> {
    param: Immutable<Parameter>,
    environment: EpisodeController,
    learner: L,
    policy: Arc<PolicyStore<L::M>>,
    rng: StdRng,
    replay_buffer: ReplayBuffer<GameAction>,
    stats: TrainingStats,
    ///  Epsilon greedy parameter
    epsilon: f32,
}

impl<L: Learner> TrainingLoop<L> {
    /// Intervals and buffer lengths of 0 are raised to 1
    pub fn new(learner: L, policy: Arc<PolicyStore<L::M>>, mut param: Parameter) -> Self {
        param.stats_after_steps = param.stats_after_steps.max(1);
        param.evaluation_interval_steps = param.evaluation_interval_steps.max(1);
        param.episode_reward_history_buffer_len = param.episode_reward_history_buffer_len.max(1);
        param.max_steps_per_episode = param.max_steps_per_episode.max(1);

        let environment = EpisodeController::self_driven(param.max_steps_per_episode).with_timestep(param.step_dt_ms);
        // actions of the last few evaluation intervals feed the action distribution stats
        let replay_buffer = ReplayBuffer::new(param.stats_after_steps, param.episode_reward_history_buffer_len);
        let epsilon = param.epsilon_max;
        Self {
            param: Immutable::new(param),
            environment,
            learner,
            policy,
            rng: StdRng::from_entropy(),
            replay_buffer,
            stats: TrainingStats {
                epsilon,
                ..TrainingStats::default()
            },
            epsilon,
        }
    }

    pub fn stats(&self) -> &TrainingStats { &self.stats }

    pub fn learner(&self) -> &L { &self.learner }

    /// Trains until `stop` is set, then returns the statistics.
    /// A failing episode or evaluation is logged and training goes on with the next one.
    pub fn run(mut self, stop: &AtomicBool) -> TrainingStats {
        log::info!("training started");
        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.learn_episode() {
                log::error!("training episode {} failed: {e:#}", self.stats.episodes);
            }
        }
        self.learning_update_log();
        log::info!("training stopped after {} episodes", self.stats.episodes);
        self.stats
    }

    /// Plays one episode from reset until it terminates or gets truncated; returns the episode return
    pub fn learn_episode(&mut self) -> Result<f32> {
        let mut state = self.environment.reset();
        log::trace!("started learning episode {}", self.stats.episodes);

        let mut episode_reward: f32 = 0.0;
        loop {
            self.stats.steps += 1;

            // Use epsilon-greedy for exploration
            let action = if self.epsilon > self.rng.gen_range(0_f32..1_f32) {
                let a = self.rng.gen_range(0..GameAction::ACTION_SPACE);
                GameAction::try_from_numeric(a)?
            } else {
                self.learner.act(&state)?
            };

            // Decay probability of taking random action
            self.epsilon = f32::max(
                self.epsilon - self.param.epsilon_interval() / self.param.epsilon_greedy_steps,
                self.param.epsilon_min,
            );
            self.stats.epsilon = self.epsilon;

            let step = self.environment.step(action)?;
            let done = step.done();
            episode_reward += step.reward;
            self.replay_buffer.add_action(action);
            state = step.state;

            if self.stats.steps % self.param.stats_after_steps == 0 {
                self.learning_update_log();
            }

            if self.stats.steps % self.param.evaluation_interval_steps == 0 {
                if let Err(e) = self.evaluate() {
                    log::error!("evaluation at step {} failed: {e:#}", self.stats.steps);
                }
            }

            if done {
                break;
            }
        }

        self.replay_buffer.add_episode_reward(episode_reward);
        self.stats.episodes += 1;
        self.learner.episode_finished(episode_reward)?;
        Ok(episode_reward)
    }

    /// Offers the learner's best policy to the store if the recent mean return beats the stored quality.
    /// Returns `None` when there was nothing to offer.
    pub fn evaluate(&mut self) -> Result<Option<CheckpointOutcome>> {
        self.stats.evaluations += 1;
        // storage may be back since the last attempt
        self.policy.retry_pending_persist();

        let Some(mean_return) = self.replay_buffer.avg_episode_reward() else {
            return Ok(None);
        };
        self.stats.last_mean_return = Some(mean_return);

        let watermark = self.policy.quality();
        if !(mean_return > watermark) {
            log::debug!("mean return {:.2} does not beat stored quality {:.2}", mean_return, watermark);
            return Ok(None);
        }

        let blob = self.learner.best().to_blob()?;
        let outcome = self.policy.checkpoint(blob, mean_return)?;
        if let CheckpointOutcome::Replaced { .. } = outcome {
            self.stats.checkpoints += 1;
        }
        Ok(Some(outcome))
    }

    fn learning_update_log(&self) {
        let number_format = format::number_format();

        let mut action_counts = FxHashMap::<GameAction, usize>::default();
        for &a in &self.replay_buffer.actions().buffer {
            action_counts.entry(a).and_modify(|e| *e += 1).or_insert(1);
        }

        let total_actions = self.replay_buffer.actions().len();
        let action_distribution_line = action_counts
            .iter()
            .sorted_by_key(|(action, _)| action.numeric())
            .map(|(&action, &count)| {
                let ratio = 100.0 * count as f32 / total_actions as f32;
                format!("{} {:.1}%", action, ratio)
            })
            .join(", ");

        log::info!(
            "\n\
    episode: {}, steps: {}, 𝜀={:.2}, checkpoints: {}, stored_quality: {:.1}, current_rewards: {{mean: {:.1}, low: {:.1}}}\n\
    action_distribution (of last {}): {}",
            self.stats.episodes.to_formatted_string(&number_format),
            self.stats.steps.to_formatted_string(&number_format),
            self.epsilon,
            self.stats.checkpoints,
            self.policy.quality(),
            self.replay_buffer.avg_episode_reward().unwrap_or(f32::NAN),
            self.replay_buffer.min_episode_reward().unwrap_or(f32::NAN),
            total_actions.to_formatted_string(&number_format),
            action_distribution_line
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::environment::breakout::observation::Observation;
    use crate::ql::learn::random_search_learner::{RandomSearchLearner, SearchParameter};
    use crate::ql::model::linear_policy::LinearPolicy;
    use crate::store::blob_store::MemoryBlobStore;

    use super::*;

    fn store() -> Arc<PolicyStore<LinearPolicy>> {
        Arc::new(PolicyStore::restore_from_storage(Arc::new(MemoryBlobStore::default())).unwrap())
    }

    fn short_episodes() -> Parameter {
        Parameter {
            max_steps_per_episode: 50,
            evaluation_interval_steps: 100,
            stats_after_steps: 75,
            ..Parameter::default()
        }
    }

    fn learner() -> RandomSearchLearner { RandomSearchLearner::with_seed(LinearPolicy::untrained(), SearchParameter::default(), 1) }

    #[test]
    fn test_learn_episode() -> Result<()> {
        let mut training = TrainingLoop::new(learner(), store(), short_episodes());
        training.learn_episode()?;

        assert_eq!(training.stats().episodes, 1);
        // an episode of 50 steps cannot reach a terminal state with 3 lives
        assert_eq!(training.stats().steps, 50);
        assert!(training.stats().epsilon < 1.0);
        assert_eq!(training.replay_buffer.episode_rewards().len(), 1);
        Ok(())
    }

    #[test]
    fn test_zero_intervals_are_raised_to_one() -> Result<()> {
        let param = Parameter {
            max_steps_per_episode: 0,
            evaluation_interval_steps: 0,
            stats_after_steps: 0,
            episode_reward_history_buffer_len: 0,
            ..Parameter::default()
        };
        let policy = store();
        let mut training = TrainingLoop::new(learner(), Arc::clone(&policy), param);
        training.learn_episode()?;
        training.learn_episode()?;

        assert_eq!(training.stats().steps, 2);
        assert_eq!(training.stats().episodes, 2);
        // one evaluation per step
        assert_eq!(training.stats().evaluations, 2);
        assert_eq!(training.replay_buffer.episode_rewards().len(), 1);
        assert!(policy.version() >= 1);
        Ok(())
    }

    #[test]
    fn test_evaluate_without_episodes_offers_nothing() -> Result<()> {
        let policy = store();
        let mut training = TrainingLoop::new(learner(), Arc::clone(&policy), short_episodes());
        assert_eq!(training.evaluate()?, None);
        assert_eq!(policy.version(), 0);
        Ok(())
    }

    #[test]
    fn test_evaluation_checkpoints_improvement_once() -> Result<()> {
        let policy = store();
        let mut training = TrainingLoop::new(learner(), Arc::clone(&policy), short_episodes());
        let episode_return = training.learn_episode()?;

        let outcome = training.evaluate()?;
        assert_eq!(outcome, Some(CheckpointOutcome::Replaced { version: 1, persisted: true }));
        assert_eq!(policy.quality(), episode_return);
        assert_eq!(policy.snapshot().blob(), training.learner().best().to_blob()?.as_slice());

        // same mean return again: no strict improvement
        assert_eq!(training.evaluate()?, None);
        assert_eq!(policy.version(), 1);
        assert_eq!(training.stats().checkpoints, 1);
        assert_eq!(training.stats().evaluations, 2);
        Ok(())
    }

    #[test]
    fn test_run_until_stopped() {
        let policy = store();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let policy = Arc::clone(&policy);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || TrainingLoop::new(learner(), policy, short_episodes()).run(&stop))
        };
        std::thread::sleep(Duration::from_millis(200));
        stop.store(true, Ordering::Relaxed);
        let stats = handle.join().unwrap();

        assert!(stats.episodes > 0);
        assert!(stats.evaluations > 0);
        assert!(stats.checkpoints >= 1);
        assert!(policy.quality() > f32::NEG_INFINITY);
    }

    /// Learner which fails every other episode
    struct StumblingLearner {
        policy: LinearPolicy,
        episodes: usize,
    }

    impl Learner for StumblingLearner {
        type M = LinearPolicy;

        fn act(&mut self, observation: &Observation) -> Result<GameAction> { self.policy.decide(observation) }

        fn episode_finished(&mut self, _episode_return: f32) -> Result<()> {
            self.episodes += 1;
            if self.episodes % 2 == 1 {
                anyhow::bail!("improvement step failed");
            }
            Ok(())
        }

        fn best(&self) -> &LinearPolicy { &self.policy }
    }

    #[test]
    fn test_failing_cycles_do_not_stop_training() {
        let learner = StumblingLearner {
            policy: LinearPolicy::untrained(),
            episodes: 0,
        };
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || TrainingLoop::new(learner, store(), short_episodes()).run(&stop))
        };
        std::thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        let stats = handle.join().unwrap();
        assert!(stats.episodes >= 2);
    }
}
