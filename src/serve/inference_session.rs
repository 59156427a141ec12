use std::sync::Arc;

use anyhow::Result;

use crate::environment::breakout::mechanics::GameAction;
use crate::environment::breakout::observation::Observation;
use crate::environment::breakout_environment::EpisodeController;
use crate::environment::live_state::LiveState;
use crate::ql::model::policy::PolicyModel;
use crate::serve::protocol::{ClientMessage, ServerMessage};
use crate::store::policy_store::PolicyStore;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStats {
    /// completed episodes, as signaled by the client
    pub episodes: usize,
    /// sum of the returns of all completed episodes
    pub total_reward: f32,
    pub best_episode_reward: Option<f32>,
    /// return of the running episode so far
    pub episode_reward: f32,
    /// snapshots answered with an action
    pub messages: usize,
    /// messages answered with an error, whether undecodable, invalid or undecidable
    pub rejected_messages: usize,
}

impl SessionStats {
    pub fn avg_episode_reward(&self) -> Option<f32> {
        match self.episodes {
            0 => None,
            n => Some(self.total_reward / n as f32),
        }
    }

    fn finish_episode(&mut self) {
        self.episodes += 1;
        self.total_reward += self.episode_reward;
        self.best_episode_reward = Some(self.best_episode_reward.map_or(self.episode_reward, |b| b.max(self.episode_reward)));
        self.episode_reward = 0.0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActionReply {
    pub action: GameAction,
    pub reward: f32,
}

impl From<ActionReply> for ServerMessage {
    fn from(reply: ActionReply) -> Self {
        ServerMessage::Action {
            action: reply.action.wire_value(),
            reward: reply.reward,
        }
    }
}

/// Serves one live connection.
///
/// Owns an external-state [EpisodeController] which mirrors the client's snapshots;
/// the only thing shared with training is the [PolicyStore].
pub struct InferenceSession<M: PolicyModel> {
    id: usize,
    controller: EpisodeController,
    policy: Arc<PolicyStore<M>>,
    stats: SessionStats,
    last_reply: Option<ActionReply>,
}

impl<M: PolicyModel> InferenceSession<M> {
    pub fn new(id: usize, policy: Arc<PolicyStore<M>>) -> Self {
        log::info!("session {id}: client connected");
        Self {
            id,
            controller: EpisodeController::external_state(),
            policy,
            stats: SessionStats::default(),
            last_reply: None,
        }
    }

    pub fn id(&self) -> usize { self.id }

    pub fn stats(&self) -> &SessionStats { &self.stats }

    pub fn controller(&self) -> &EpisodeController { &self.controller }

    /// Mirrors the snapshot, asks the current policy for an action and computes the reward.
    /// A snapshot failing validation, or a policy failing to decide, is rejected before anything changes.
    pub fn handle(&mut self, snapshot: &LiveState) -> Result<ActionReply> {
        match self.answer(snapshot) {
            Ok(reply) => {
                self.stats.messages += 1;
                Ok(reply)
            }
            Err(e) => {
                self.stats.rejected_messages += 1;
                Err(e)
            }
        }
    }

    fn answer(&mut self, snapshot: &LiveState) -> Result<ActionReply> {
        let mirrored = self.controller.mirrored_state(snapshot)?;
        let action = self.policy.decide(&Observation::encode(&mirrored))?;
        self.controller.commit_mirrored_state(mirrored)?;
        let reward = self.controller.compute_reward();

        self.stats.episode_reward += reward;
        if snapshot.episode_ended() {
            self.stats.finish_episode();
            self.log_stats();
        }

        let reply = ActionReply { action, reward };
        if self.last_reply != Some(reply) {
            match reward == 0.0 {
                true => log::debug!("session {}: action {}", self.id, action),
                false => log::debug!("session {}: action {}, reward {:.2}", self.id, action, reward),
            }
            self.last_reply = Some(reply);
        }
        Ok(reply)
    }

    /// Handles one raw client message. Failures become an error reply; the session stays usable.
    pub fn handle_message(&mut self, line: &str) -> ServerMessage {
        let result = match ClientMessage::decode(line) {
            Ok(ClientMessage::State(snapshot)) => self.handle(&snapshot),
            Err(e) => {
                self.stats.rejected_messages += 1;
                Err(e)
            }
        };
        match result {
            Ok(reply) => reply.into(),
            Err(e) => {
                log::warn!("session {}: message rejected: {e:#}", self.id);
                ServerMessage::Error {
                    message: format!("{e:#}"),
                }
            }
        }
    }

    fn log_stats(&self) {
        log::info!(
            "session {}: episodes: {}, avg reward: {:.2}, best reward: {:.2}, policy v{}",
            self.id,
            self.stats.episodes,
            self.stats.avg_episode_reward().unwrap_or(0.0),
            self.stats.best_episode_reward.unwrap_or(0.0),
            self.policy.version()
        );
    }
}

impl<M: PolicyModel> Drop for InferenceSession<M> {
    fn drop(&mut self) {
        log::info!("session {}: client disconnected after {} messages", self.id, self.stats.messages);
    }
}
