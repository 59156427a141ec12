use std::ops::Deref;

use crate::environment::breakout::mechanics::{GameState, NUM_BLOCKS};

/// paddle x,y,vx,vy + ball x,y,dx,dy
pub const NUM_CONTINUOUS_VALUES: usize = 8;
pub const LAUNCH_FLAG_IDX: usize = NUM_CONTINUOUS_VALUES;
pub const FIRST_BLOCK_IDX: usize = LAUNCH_FLAG_IDX + 1;
pub const OBSERVATION_LEN: usize = FIRST_BLOCK_IDX + NUM_BLOCKS;

/// Fixed-length numeric encoding of a [GameState] as seen by a policy.
///
/// Layout: `[paddle.x, paddle.y, paddle.vx, paddle.vy, ball.x, ball.y, ball.dx, ball.dy, launched, block_0 .. block_287]`,
/// with `1.0` for a set flag / an active block and `0.0` otherwise.
/// Score, lives and the terminal flags are not part of it.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation([f32; OBSERVATION_LEN]);

impl Observation {
    pub fn encode(state: &GameState) -> Self {
        let mut values = [0.0_f32; OBSERVATION_LEN];
        let paddle = &state.paddle;
        let ball = &state.ball;
        values[..NUM_CONTINUOUS_VALUES].copy_from_slice(&[
            paddle.pos.x,
            paddle.pos.y,
            paddle.velocity.x,
            paddle.velocity.y,
            ball.pos.x,
            ball.pos.y,
            ball.velocity.x,
            ball.velocity.y,
        ]);
        values[LAUNCH_FLAG_IDX] = flag(ball.launched);
        for (value, block) in values[FIRST_BLOCK_IDX..].iter_mut().zip(state.blocks.iter()) {
            *value = flag(block.active);
        }
        Observation(values)
    }
}

impl Deref for Observation {
    type Target = [f32];

    fn deref(&self) -> &Self::Target { &self.0 }
}

fn flag(v: bool) -> f32 {
    match v {
        true => 1.0,
        false => 0.0,
    }
}
