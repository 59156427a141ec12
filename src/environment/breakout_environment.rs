use std::fmt::{Display, Formatter};

use anyhow::Result;

use crate::environment::breakout::mechanics::{GameAction, GameState, SimulationEngine, TIMESTEP_MS};
use crate::environment::breakout::observation::Observation;
use crate::environment::live_state::LiveState;
use crate::ql::prelude::{Action, Environment, ModelActionType, QlError, Step};

impl Action for GameAction {
    const ACTION_SPACE: ModelActionType = 5;

    fn numeric(&self) -> ModelActionType {
        match self {
            GameAction::Left => 0,
            GameAction::None => 1,
            GameAction::Right => 2,
            GameAction::Jump => 3,
            GameAction::Launch => 4,
        }
    }

    fn try_from_numeric(value: ModelActionType) -> Result<Self> {
        match value {
            0 => Ok(GameAction::Left),
            1 => Ok(GameAction::None),
            2 => Ok(GameAction::Right),
            3 => Ok(GameAction::Jump),
            4 => Ok(GameAction::Launch),
            _ => Err(QlError::InvalidAction(value as i64).into()),
        }
    }
}

/// How an [EpisodeController] gets its game state; fixed for the lifetime of the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerMode {
    /// the controller advances the physics itself (training)
    SelfDriven,
    /// the controller mirrors snapshots from a live client (inference)
    ExternalState,
}

impl Display for ControllerMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerMode::SelfDriven => f.write_str("self-driven"),
            ControllerMode::ExternalState => f.write_str("external-state"),
        }
    }
}

/// Episode Controller: wraps one privately owned [SimulationEngine] and exposes the step/reset contract.
///
/// Each controller has exactly one owner; training and every inference session use distinct instances.
pub struct EpisodeController {
    mode: ControllerMode,
    engine: SimulationEngine,
    dt_ms: f32,
    max_steps_per_episode: usize,
    episode_steps: usize,
}

impl EpisodeController {
    pub fn self_driven(max_steps_per_episode: usize) -> Self {
        Self {
            mode: ControllerMode::SelfDriven,
            engine: SimulationEngine::new(),
            dt_ms: TIMESTEP_MS,
            max_steps_per_episode,
            episode_steps: 0,
        }
    }

    pub fn external_state() -> Self {
        Self {
            mode: ControllerMode::ExternalState,
            engine: SimulationEngine::new(),
            dt_ms: TIMESTEP_MS,
            max_steps_per_episode: usize::MAX,
            episode_steps: 0,
        }
    }

    /// Overrides the fixed simulation step (milliseconds)
    pub fn with_timestep(mut self, dt_ms: f32) -> Self {
        assert!(dt_ms >= 0.0 && dt_ms.is_finite());
        self.dt_ms = dt_ms;
        self
    }

    pub fn mode(&self) -> ControllerMode { self.mode }

    pub fn game_state(&self) -> &GameState { self.engine.state() }

    pub fn episode_steps(&self) -> usize { self.episode_steps }

    pub fn observe(&self) -> Observation { self.engine.observe() }

    /// Overwrites paddle, ball and block activity with the snapshot's values.
    /// Score, lives and the terminal flags stay engine-local.
    ///
    /// A snapshot failing validation is rejected without touching the engine.
    pub fn ingest_external_state(&mut self, snapshot: &LiveState) -> Result<Observation> {
        let mirrored = self.mirrored_state(snapshot)?;
        self.commit_mirrored_state(mirrored)?;
        Ok(self.engine.observe())
    }

    /// The state [Self::ingest_external_state] would produce for `snapshot`; the engine stays as it is.
    pub fn mirrored_state(&self, snapshot: &LiveState) -> Result<GameState> {
        self.require_mode(ControllerMode::ExternalState)?;
        snapshot.validate()?;

        let mut state = self.engine.state().clone();
        state.paddle.pos.x = snapshot.paddle.x;
        state.paddle.pos.y = snapshot.paddle.y;
        state.paddle.velocity.x = snapshot.paddle.vx;
        state.paddle.velocity.y = snapshot.paddle.vy;

        state.ball.pos.x = snapshot.ball.x;
        state.ball.pos.y = snapshot.ball.y;
        state.ball.velocity.x = snapshot.ball.dx;
        state.ball.velocity.y = snapshot.ball.dy;
        state.ball.launched = snapshot.ball.is_launched;

        for (block, live_block) in state.blocks.iter_mut().zip(snapshot.blocks.iter()) {
            block.active = live_block.active;
        }
        Ok(state)
    }

    /// Adopts a state built by [Self::mirrored_state]
    pub fn commit_mirrored_state(&mut self, mirrored: GameState) -> Result<()> {
        self.require_mode(ControllerMode::ExternalState)?;
        *self.engine.state_mut() = mirrored;
        Ok(())
    }

    /// Reward of the engine's current state (in external-state mode: the last ingested snapshot)
    pub fn compute_reward(&self) -> f32 { self.engine.compute_reward() }

    fn require_mode(&self, expected: ControllerMode) -> Result<()> {
        if self.mode != expected {
            return Err(QlError::ModeMismatch {
                expected: expected.to_string(),
                actual: self.mode.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Environment for EpisodeController {
    type S = Observation;
    type A = GameAction;

    fn reset(&mut self) -> Observation {
        self.engine.reset();
        self.episode_steps = 0;
        self.engine.observe()
    }

    /// In external-state mode no physics happen: the current observation comes back with zero reward.
    fn step(&mut self, action: GameAction) -> Result<Step<Observation>> {
        match self.mode {
            ControllerMode::ExternalState => Ok(Step {
                state: self.engine.observe(),
                reward: 0.0,
                terminated: false,
                truncated: false,
            }),
            ControllerMode::SelfDriven => {
                let (state, reward) = self.engine.update(self.dt_ms, Some(action));
                let terminated = state.is_terminal();
                self.episode_steps += 1;
                let truncated = !terminated && self.episode_steps >= self.max_steps_per_episode;
                Ok(Step {
                    state: self.engine.observe(),
                    reward,
                    terminated,
                    truncated,
                })
            }
        }
    }
}
