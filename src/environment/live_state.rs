use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::environment::breakout::mechanics::{GameState, NUM_BLOCKS};
use crate::ql::prelude::QlError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LivePaddle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveBall {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    #[serde(rename = "isLaunched")]
    pub is_launched: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveBlock {
    pub active: bool,
}

/// Game state snapshot as reported by a live game client.
///
/// Carries the geometry plus the client's episode-end signals; score and lives stay with the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
    pub paddle: LivePaddle,
    pub ball: LiveBall,
    pub blocks: Vec<LiveBlock>,
    #[serde(default)]
    pub ball_missed: bool,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub victory: bool,
}

impl LiveState {
    pub fn from_game_state(state: &GameState) -> Self {
        Self {
            paddle: LivePaddle {
                x: state.paddle.pos.x,
                y: state.paddle.pos.y,
                vx: state.paddle.velocity.x,
                vy: state.paddle.velocity.y,
            },
            ball: LiveBall {
                x: state.ball.pos.x,
                y: state.ball.pos.y,
                dx: state.ball.velocity.x,
                dy: state.ball.velocity.y,
                is_launched: state.ball.launched,
            },
            blocks: state.blocks.iter().map(|b| LiveBlock { active: b.active }).collect(),
            ball_missed: false,
            game_over: state.game_over,
            victory: state.victory,
        }
    }

    /// Checks everything needed to mirror this snapshot into an engine
    pub fn validate(&self) -> Result<()> {
        if self.blocks.len() != NUM_BLOCKS {
            return Err(QlError::MalformedState(format!("expected {} blocks, got {}", NUM_BLOCKS, self.blocks.len())).into());
        }
        let values = [
            ("paddle.x", self.paddle.x),
            ("paddle.y", self.paddle.y),
            ("paddle.vx", self.paddle.vx),
            ("paddle.vy", self.paddle.vy),
            ("ball.x", self.ball.x),
            ("ball.y", self.ball.y),
            ("ball.dx", self.ball.dx),
            ("ball.dy", self.ball.dy),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(QlError::MalformedState(format!("{name} is not a finite number: {value}")).into());
        }
        Ok(())
    }

    /// the client signals the end of an episode (missed ball, game over or victory)
    pub fn episode_ended(&self) -> bool { self.ball_missed || self.game_over || self.victory }
}
