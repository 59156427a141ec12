use std::fmt::{Display, Formatter};

use anyhow::Result;
use lazy_static::lazy_static;

use crate::environment::breakout::algebra_2d::{AaBB, Pos2, Vec2};
use crate::environment::breakout::observation::Observation;
use crate::ql::prelude::QlError;

/// TOP / LEFT corner is 0/0; the field is the unit square
pub const FIELD_LEN: f32 = 1.0;

/// fixed simulation step used for self-driven play
pub const TIMESTEP_MS: f32 = 1.0;

pub const BLOCK_ROWS: usize = 12;
pub const BLOCK_COLUMNS: usize = 24;
pub const NUM_BLOCKS: usize = BLOCK_ROWS * BLOCK_COLUMNS;
const BLOCK_LEN_X: f32 = FIELD_LEN / BLOCK_COLUMNS as f32;
const BLOCK_LEN_Y: f32 = FIELD_LEN / BLOCK_ROWS as f32;

pub const PADDLE_WIDTH: f32 = 0.2;
pub const PADDLE_HEIGHT: f32 = 0.02;
pub const PADDLE_START_X: f32 = 0.5;
/// resting height of the paddle; it may jump upwards from here, never go below
pub const PADDLE_FLOOR_Y: f32 = 0.9;
pub const PADDLE_SPEED_PER_SEC: f32 = 0.5;
pub const PADDLE_JUMP_SPEED_PER_SEC: f32 = 0.3;
/// downward acceleration of the paddle (per second²)
pub const GRAVITY: f32 = 0.001;

pub const BALL_RADIUS: f32 = 0.01;
pub const BALL_SPEED_PER_SEC: f32 = 0.4;
pub const BALL_LAUNCH_DX: f32 = 0.2;
/// distance of an unlaunched ball above the paddle center
pub const BALL_PIN_OFFSET_Y: f32 = 0.05;

pub const INITIAL_LIVES: u32 = 3;
pub const SCORE_PER_BLOCK: u32 = 100;

pub const REWARD_BALL_MISSED: f32 = -5.0;
pub const REWARD_BALL_RETURNED: f32 = 0.5;
pub const REWARD_BLOCK_DESTROYED: f32 = 1.0;
pub const REWARD_VICTORY: f32 = 10.0;
pub const REWARD_GAME_OVER: f32 = -10.0;
pub const REWARD_BALL_IDLE: f32 = -0.01;
/// vertical distance to the paddle within which an upward moving ball counts as returned
const BALL_RETURNED_DISTANCE_Y: f32 = 0.02;

lazy_static! {
    static ref INITIAL_BLOCKS: Vec<Block> = (0..NUM_BLOCKS).map(Block::new).collect();
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GameAction {
    Left,
    /// stops horizontal paddle movement
    None,
    Right,
    Jump,
    Launch,
}

impl GameAction {
    pub const ALL: [GameAction; 5] = [GameAction::Left, GameAction::None, GameAction::Right, GameAction::Jump, GameAction::Launch];

    /// value used by the game client
    pub fn wire_value(&self) -> i8 {
        match self {
            GameAction::Left => -1,
            GameAction::None => 0,
            GameAction::Right => 1,
            GameAction::Jump => 2,
            GameAction::Launch => 3,
        }
    }

    pub fn try_from_wire(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(GameAction::Left),
            0 => Ok(GameAction::None),
            1 => Ok(GameAction::Right),
            2 => Ok(GameAction::Jump),
            3 => Ok(GameAction::Launch),
            _ => Err(QlError::InvalidAction(value).into()),
        }
    }
}

impl Display for GameAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GameAction::Left => f.write_str("←"),
            GameAction::None => f.write_str("o"),
            GameAction::Right => f.write_str("→"),
            GameAction::Jump => f.write_str("↑"),
            GameAction::Launch => f.write_str("*"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Paddle {
    /// center
    pub pos: Pos2,
    pub velocity: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Paddle {
    fn initial() -> Self {
        Self {
            pos: Pos2::new(PADDLE_START_X, PADDLE_FLOOR_Y),
            velocity: Vec2::ZERO,
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
        }
    }

    fn at_floor(&self) -> bool { self.pos.y >= PADDLE_FLOOR_Y }

    /// physically move one time step forward; gravity applies after moving
    fn proceed(&mut self, dt_secs: f32) {
        self.pos += self.velocity * dt_secs;
        self.velocity.y += GRAVITY * dt_secs;

        let half_width = self.width / 2.0;
        self.pos.x = self.pos.x.clamp(half_width, FIELD_LEN - half_width);
        self.pos.y = self.pos.y.clamp(0.0, PADDLE_FLOOR_Y);
        if self.at_floor() {
            self.velocity.y = 0.0;
        }
    }

    /// the ball is inside the paddle's vertical strike band and horizontally over the paddle
    fn strikes(&self, ball: &Ball) -> bool {
        ball.pos.y >= self.pos.y - ball.radius
            && ball.pos.y <= self.pos.y + self.height
            && (ball.pos.x - self.pos.x).abs() < self.width / 2.0
    }

    /// relative strike position across the paddle: 0.0 = left edge, 1.0 = right edge
    fn strike_offset(&self, ball: &Ball) -> f32 {
        (ball.pos.x - (self.pos.x - self.width / 2.0)) / self.width
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ball {
    pub pos: Pos2,
    pub velocity: Vec2,
    pub radius: f32,
    pub speed: f32,
    pub launched: bool,
}

impl Ball {
    fn pinned_to(paddle: &Paddle) -> Self {
        Self {
            pos: Self::pin_position(paddle),
            velocity: Vec2::ZERO,
            radius: BALL_RADIUS,
            speed: BALL_SPEED_PER_SEC,
            launched: false,
        }
    }

    fn pin_position(paddle: &Paddle) -> Pos2 { Pos2::new(paddle.pos.x, paddle.pos.y - BALL_PIN_OFFSET_Y) }

    fn launch(&mut self) {
        if !self.launched {
            self.launched = true;
            self.velocity = Vec2::new(BALL_LAUNCH_DX, -self.speed);
        }
    }
}

/// One cell of the block grid. The geometry is fixed by its index; only `active` changes.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    shape: AaBB,
    pub active: bool,
}

impl Block {
    /// blocks are stored row by row
    fn new(idx: usize) -> Self {
        let row = idx / BLOCK_COLUMNS;
        let column = idx % BLOCK_COLUMNS;
        let min = Pos2::new(column as f32 / BLOCK_COLUMNS as f32, row as f32 / BLOCK_ROWS as f32);
        Self {
            shape: AaBB {
                min,
                max: min + Vec2::new(BLOCK_LEN_X, BLOCK_LEN_Y),
            },
            active: true,
        }
    }

    pub fn shape(&self) -> &AaBB { &self.shape }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    pub paddle: Paddle,
    pub ball: Ball,
    pub blocks: Vec<Block>,
    pub score: u32,
    pub lives: u32,
    pub game_over: bool,
    pub victory: bool,
}

impl GameState {
    pub fn initial() -> Self {
        let paddle = Paddle::initial();
        let ball = Ball::pinned_to(&paddle);
        Self {
            paddle,
            ball,
            blocks: INITIAL_BLOCKS.clone(),
            score: 0,
            lives: INITIAL_LIVES,
            game_over: false,
            victory: false,
        }
    }

    pub fn is_terminal(&self) -> bool { self.game_over || self.victory }

    pub fn active_blocks(&self) -> usize { self.blocks.iter().filter(|b| b.active).count() }
}

/// What happened during one engine step; input for the reward function
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepEvents {
    pub ball_missed: bool,
    pub blocks_destroyed: u32,
    pub victory_reached: bool,
    pub game_over_reached: bool,
}

impl StepEvents {
    /// Events as far as they can be read off a state without having simulated the step
    /// (used for externally supplied states).
    pub fn observed_in(state: &GameState) -> Self {
        Self {
            ball_missed: state.ball.pos.y > FIELD_LEN,
            blocks_destroyed: 0,
            victory_reached: state.victory,
            game_over_reached: state.game_over,
        }
    }
}

/// Reward for a state right after a step. All conditions are independent and add up.
pub fn reward(state: &GameState, events: &StepEvents) -> f32 {
    let mut reward = 0.0;
    if events.ball_missed {
        reward += REWARD_BALL_MISSED;
    }
    if state.ball.velocity.y < 0.0 && (state.ball.pos.y - state.paddle.pos.y).abs() < BALL_RETURNED_DISTANCE_Y {
        reward += REWARD_BALL_RETURNED;
    }
    reward += events.blocks_destroyed as f32 * REWARD_BLOCK_DESTROYED;
    if events.victory_reached {
        reward += REWARD_VICTORY;
    }
    if events.game_over_reached {
        reward += REWARD_GAME_OVER;
    }
    if !state.ball.launched {
        reward += REWARD_BALL_IDLE;
    }
    reward
}

/// Deterministic physics, collision and scoring for one game instance.
///
/// There is no internal locking: an engine is owned by exactly one caller at a time.
#[derive(Clone, Debug)]
pub struct SimulationEngine {
    state: GameState,
}

impl SimulationEngine {
    pub fn new() -> Self {
        Self {
            state: GameState::initial(),
        }
    }

    pub fn reset(&mut self) { self.state = GameState::initial(); }

    pub fn state(&self) -> &GameState { &self.state }

    /// Direct access for external overwrite (live-state sync)
    pub fn state_mut(&mut self) -> &mut GameState { &mut self.state }

    pub fn observe(&self) -> Observation { Observation::encode(&self.state) }

    /// Reward of the current state, derived from the state alone
    pub fn compute_reward(&self) -> f32 { reward(&self.state, &StepEvents::observed_in(&self.state)) }

    /// Physically move one time step forward.
    ///
    /// An absent `action` leaves the paddle's horizontal velocity as it is.
    /// A terminal state stays untouched until [Self::reset].
    pub fn update(&mut self, dt_ms: f32, action: Option<GameAction>) -> (&GameState, f32) {
        if self.state.is_terminal() {
            log::trace!("update on terminal state ignored");
            return (&self.state, 0.0);
        }
        if let Some(action) = action {
            self.process_input(action);
        }

        self.proceed(dt_ms / 1000.0);
        let blocks_destroyed = self.check_collisions();
        let mut events = self.check_game_end_situation();
        events.blocks_destroyed = blocks_destroyed;

        #[cfg(debug_assertions)]
        self.state.assert();

        let reward = reward(&self.state, &events);
        (&self.state, reward)
    }

    fn process_input(&mut self, action: GameAction) {
        let paddle = &mut self.state.paddle;
        match action {
            GameAction::Left => paddle.velocity.x = -PADDLE_SPEED_PER_SEC,
            GameAction::None => paddle.velocity.x = 0.0,
            GameAction::Right => paddle.velocity.x = PADDLE_SPEED_PER_SEC,
            GameAction::Jump => {
                if paddle.at_floor() {
                    paddle.velocity.y = -PADDLE_JUMP_SPEED_PER_SEC;
                }
            }
            GameAction::Launch => self.state.ball.launch(),
        }
    }

    fn proceed(&mut self, dt_secs: f32) {
        self.state.paddle.proceed(dt_secs);

        let ball = &mut self.state.ball;
        if ball.launched {
            ball.pos += ball.velocity * dt_secs;
        } else {
            ball.pos = Ball::pin_position(&self.state.paddle);
        }
    }

    /// Resolves wall, paddle and block contacts in that order.
    /// Every active block containing the ball is destroyed and flips the ball's vertical direction.
    ///
    /// Returns the number of destroyed blocks
    fn check_collisions(&mut self) -> u32 {
        let GameState { paddle, ball, blocks, score, .. } = &mut self.state;

        if ball.pos.x <= ball.radius || ball.pos.x >= FIELD_LEN - ball.radius {
            ball.velocity.x = -ball.velocity.x;
        }
        if ball.pos.y <= ball.radius {
            ball.velocity.y = -ball.velocity.y;
        }

        if paddle.strikes(ball) {
            let offset = paddle.strike_offset(ball);
            ball.velocity = Vec2::new((offset - 0.5) * ball.speed * 2.0, -ball.speed);
        }

        let mut destroyed = 0;
        for block in blocks.iter_mut().filter(|b| b.active) {
            if block.shape.contains(ball.pos) {
                block.active = false;
                *score += SCORE_PER_BLOCK;
                ball.velocity.y = -ball.velocity.y;
                destroyed += 1;
            }
        }
        destroyed
    }

    /// A missed ball costs a life and goes back onto the paddle.
    /// Victory takes priority when the last block falls in the same step the last life is lost.
    fn check_game_end_situation(&mut self) -> StepEvents {
        let state = &mut self.state;
        let mut events = StepEvents::default();

        let mut out_of_lives = false;
        if state.ball.pos.y > FIELD_LEN {
            debug_assert!(state.lives > 0, "ball missed without lives left");
            events.ball_missed = true;
            state.lives = state.lives.saturating_sub(1);
            state.ball = Ball::pinned_to(&state.paddle);
            out_of_lives = state.lives == 0;
        }

        if state.blocks.iter().all(|b| !b.active) {
            state.victory = true;
            events.victory_reached = true;
        } else if out_of_lives {
            state.game_over = true;
            events.game_over_reached = true;
        }
        events
    }
}

impl Default for SimulationEngine {
    fn default() -> Self { SimulationEngine::new() }
}

pub trait Assert {
    fn assert(&self);
}

impl Assert for Paddle {
    fn assert(&self) {
        assert!(self.pos.x >= self.width / 2.0 && self.pos.x <= FIELD_LEN - self.width / 2.0);
        assert!(self.pos.y >= 0.0 && self.pos.y <= PADDLE_FLOOR_Y);
        if self.at_floor() {
            assert!(self.velocity.y <= 0.0);
        }
    }
}

impl Assert for GameState {
    fn assert(&self) {
        self.paddle.assert();
        assert!(!(self.game_over && self.victory));
        assert_eq!(self.blocks.len(), NUM_BLOCKS);
        assert_eq!(self.score, (NUM_BLOCKS - self.active_blocks()) as u32 * SCORE_PER_BLOCK);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn assert_eq_roughly(what: &str, a: f32, b: f32, tolerance: f32) {
        assert!(!tolerance.is_sign_negative());
        assert!((a - b).abs() <= tolerance, "'{what}' difference between {a} and {b} more than {tolerance}");
    }

    /// all blocks gone except the top-left one, so the ball flies free without ending the game
    fn engine_with_single_block() -> SimulationEngine {
        let mut engine = SimulationEngine::new();
        let state = engine.state_mut();
        for block in state.blocks.iter_mut().skip(1) {
            block.active = false;
        }
        state.score = (NUM_BLOCKS as u32 - 1) * SCORE_PER_BLOCK;
        engine
    }

    #[test]
    fn test_reset_restores_canonical_state() {
        let mut engine = SimulationEngine::new();
        engine.update(TIMESTEP_MS, Some(GameAction::Launch));
        for _ in 0..100 {
            engine.update(TIMESTEP_MS, Some(GameAction::Right));
        }
        assert_ne!(engine.state(), &GameState::initial());

        engine.reset();
        assert_eq!(engine.state(), &GameState::initial());
        assert_eq!(engine.state().lives, 3);
        assert_eq!(engine.state().score, 0);
        assert_eq!(engine.state().active_blocks(), 288);
    }

    #[test]
    fn test_observe_is_idempotent() {
        let mut engine = SimulationEngine::new();
        engine.update(TIMESTEP_MS, Some(GameAction::Launch));
        assert_eq!(engine.observe(), engine.observe());
    }

    #[test]
    fn test_block_geometry() {
        let state = GameState::initial();
        let first = state.blocks[0].shape();
        assert_eq!(first.min, Pos2::new(0.0, 0.0));
        assert_eq_roughly("first.max.x", first.max.x, 1.0 / 24.0, 1e-6);
        assert_eq_roughly("first.max.y", first.max.y, 1.0 / 12.0, 1e-6);

        // row 1, column 1
        let b = state.blocks[25].shape();
        assert_eq_roughly("b.min.x", b.min.x, 1.0 / 24.0, 1e-6);
        assert_eq_roughly("b.min.y", b.min.y, 1.0 / 12.0, 1e-6);

        let last = state.blocks[287].shape();
        assert_eq_roughly("last.max.x", last.max.x, 1.0, 1e-6);
        assert_eq_roughly("last.max.y", last.max.y, 1.0, 1e-6);
    }

    #[test]
    fn test_absent_action_keeps_paddle_velocity() {
        let mut engine = engine_with_single_block();
        engine.state_mut().paddle.velocity.x = 0.25;
        let x_before = engine.state().paddle.pos.x;

        let (state, _) = engine.update(TIMESTEP_MS, None);

        assert_eq!(state.paddle.velocity.x, 0.25);
        assert_eq!(state.paddle.pos.x, x_before + 0.25 * (TIMESTEP_MS / 1000.0));
    }

    #[rstest]
    #[case(GameAction::Left, - PADDLE_SPEED_PER_SEC)]
    #[case(GameAction::Right, PADDLE_SPEED_PER_SEC)]
    #[case(GameAction::None, 0.0)]
    fn test_paddle_control(#[case] action: GameAction, #[case] expected_vx: f32) {
        let mut engine = engine_with_single_block();
        engine.state_mut().paddle.velocity.x = 0.1;

        let (state, _) = engine.update(TIMESTEP_MS, Some(action));

        assert_eq!(state.paddle.velocity.x, expected_vx);
    }

    #[test]
    fn test_paddle_stays_within_bounds() {
        let mut engine = engine_with_single_block();
        for _ in 0..2_000 {
            engine.update(TIMESTEP_MS, Some(GameAction::Left));
        }
        assert_eq!(engine.state().paddle.pos.x, PADDLE_WIDTH / 2.0);
        // the pinned ball follows
        assert_eq!(engine.state().ball.pos.x, PADDLE_WIDTH / 2.0);

        for _ in 0..4_000 {
            engine.update(TIMESTEP_MS, Some(GameAction::Right));
        }
        assert_eq!(engine.state().paddle.pos.x, FIELD_LEN - PADDLE_WIDTH / 2.0);
    }

    #[test]
    fn test_jump_only_from_floor() {
        let mut engine = engine_with_single_block();

        let (state, _) = engine.update(TIMESTEP_MS, Some(GameAction::Jump));
        assert!(state.paddle.pos.y < PADDLE_FLOOR_Y);
        assert!(state.paddle.velocity.y < 0.0);

        let vy = engine.state().paddle.velocity.y;
        let (state, _) = engine.update(TIMESTEP_MS, Some(GameAction::Jump));
        // no new impulse in the air, only gravity
        assert_eq_roughly("vy", state.paddle.velocity.y, vy + GRAVITY * TIMESTEP_MS / 1000.0, 1e-7);
    }

    #[test]
    fn test_launch() {
        let mut engine = engine_with_single_block();

        let (state, _) = engine.update(TIMESTEP_MS, Some(GameAction::Launch));
        assert!(state.ball.launched);
        assert_eq!(state.ball.velocity, Vec2::new(BALL_LAUNCH_DX, -BALL_SPEED_PER_SEC));

        let pos_before = engine.state().ball.pos;
        let (state, _) = engine.update(TIMESTEP_MS, Some(GameAction::Launch));
        assert_eq!(state.ball.velocity, Vec2::new(BALL_LAUNCH_DX, -BALL_SPEED_PER_SEC));
        assert!(state.ball.pos.y < pos_before.y);
    }

    #[rstest]
    #[case(BALL_RADIUS)]
    #[case(FIELD_LEN - BALL_RADIUS)]
    fn test_ball_bounces_off_side_walls(#[case] x: f32) {
        let mut engine = engine_with_single_block();
        {
            let ball = &mut engine.state_mut().ball;
            ball.launched = true;
            ball.pos = Pos2::new(x, 0.5);
            ball.velocity = Vec2::new(-0.2, -0.4);
        }

        let (state, _) = engine.update(0.0, None);

        assert_eq!(state.ball.velocity, Vec2::new(0.2, -0.4));
    }

    #[test]
    fn test_ball_bounces_off_ceiling() {
        let mut engine = engine_with_single_block();
        {
            let ball = &mut engine.state_mut().ball;
            ball.launched = true;
            ball.pos = Pos2::new(0.5, BALL_RADIUS);
            ball.velocity = Vec2::new(0.2, -0.4);
        }

        let (state, _) = engine.update(0.0, None);

        assert_eq!(state.ball.velocity, Vec2::new(0.2, 0.4));
    }

    #[rstest]
    #[case(0.5, 0.0)]
    #[case(0.45, - 0.2)]
    #[case(0.55, 0.2)]
    fn test_paddle_strike_steers_ball(#[case] ball_x: f32, #[case] expected_dx: f32) {
        let mut engine = engine_with_single_block();
        {
            let ball = &mut engine.state_mut().ball;
            ball.launched = true;
            ball.pos = Pos2::new(ball_x, PADDLE_FLOOR_Y);
            ball.velocity = Vec2::new(0.1, 0.4);
        }

        let (state, reward) = engine.update(0.0, None);

        assert_eq!(state.ball.velocity.y, -BALL_SPEED_PER_SEC);
        assert_eq_roughly("dx", state.ball.velocity.x, expected_dx, 1e-5);
        // moving upwards right at the paddle
        assert_eq!(reward, REWARD_BALL_RETURNED);
    }

    #[test]
    fn test_block_hit() {
        let mut engine = SimulationEngine::new();
        {
            let state = engine.state_mut();
            state.ball.launched = true;
            // center of block row 2, column 3
            state.ball.pos = Pos2::new(3.5 / 24.0, 2.5 / 12.0);
            state.ball.velocity = Vec2::new(0.2, -0.4);
        }

        let (state, reward) = engine.update(0.0, None);

        assert!(!state.blocks[2 * BLOCK_COLUMNS + 3].active);
        assert_eq!(state.active_blocks(), NUM_BLOCKS - 1);
        assert_eq!(state.score, SCORE_PER_BLOCK);
        assert_eq!(state.ball.velocity.y, 0.4);
        assert_eq!(reward, REWARD_BLOCK_DESTROYED);
    }

    #[test]
    fn test_ball_on_shared_edge_hits_both_blocks() {
        let mut engine = SimulationEngine::new();
        {
            let state = engine.state_mut();
            state.ball.launched = true;
            // on the border between row 2 and row 3 of column 3
            state.ball.pos = state.blocks[3 * BLOCK_COLUMNS + 3].shape().min + Vec2::new(0.5 / 24.0, 0.0);
            state.ball.velocity = Vec2::new(0.2, -0.4);
        }

        let (state, reward) = engine.update(0.0, None);

        assert!(!state.blocks[2 * BLOCK_COLUMNS + 3].active);
        assert!(!state.blocks[3 * BLOCK_COLUMNS + 3].active);
        assert_eq!(state.score, 2 * SCORE_PER_BLOCK);
        // flipped twice
        assert_eq!(state.ball.velocity.y, -0.4);
        assert_eq!(reward, 2.0 * REWARD_BLOCK_DESTROYED);
    }

    #[test]
    fn test_missed_ball_costs_a_life() {
        let mut engine = engine_with_single_block();
        {
            let ball = &mut engine.state_mut().ball;
            ball.launched = true;
            ball.pos = Pos2::new(0.05, 1.0);
            ball.velocity = Vec2::new(0.0, 0.4);
        }

        let (state, reward) = engine.update(TIMESTEP_MS, None);

        assert_eq!(state.lives, 2);
        assert!(!state.game_over);
        assert!(!state.ball.launched);
        assert_eq!(state.ball.pos, Pos2::new(state.paddle.pos.x, state.paddle.pos.y - BALL_PIN_OFFSET_Y));
        assert_eq_roughly("reward", reward, REWARD_BALL_MISSED + REWARD_BALL_IDLE, 1e-6);
    }

    #[test]
    fn test_repeated_misses_end_the_game() {
        let mut engine = engine_with_single_block();
        let mut total_reward = 0.0;
        for _ in 0..INITIAL_LIVES {
            {
                let ball = &mut engine.state_mut().ball;
                ball.launched = true;
                ball.pos = Pos2::new(0.05, 1.0);
                ball.velocity = Vec2::new(0.0, 0.4);
            }
            let (_, reward) = engine.update(TIMESTEP_MS, None);
            total_reward += reward;
        }

        let state = engine.state();
        assert_eq!(state.lives, 0);
        assert!(state.game_over);
        assert!(!state.victory);
        assert_eq_roughly(
            "total_reward",
            total_reward,
            3.0 * (REWARD_BALL_MISSED + REWARD_BALL_IDLE) + REWARD_GAME_OVER,
            1e-5,
        );

        // terminal until reset
        let before = engine.state().clone();
        let (state, reward) = engine.update(TIMESTEP_MS, Some(GameAction::Launch));
        assert_eq!(state, &before);
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn test_clearing_all_blocks_wins() {
        let mut engine = engine_with_single_block();
        {
            let ball = &mut engine.state_mut().ball;
            ball.launched = true;
            ball.pos = Pos2::new(0.5 / 24.0, 0.5 / 12.0);
            ball.velocity = Vec2::new(0.2, -0.4);
        }

        let (state, reward) = engine.update(0.0, None);

        assert!(state.victory);
        assert!(!state.game_over);
        assert_eq!(state.score, NUM_BLOCKS as u32 * SCORE_PER_BLOCK);
        assert_eq_roughly("reward", reward, REWARD_BLOCK_DESTROYED + REWARD_VICTORY, 1e-6);
    }

    #[test]
    fn test_sweeping_the_last_row_wins() {
        const SWEPT_ROW: usize = 10;
        let mut engine = SimulationEngine::new();
        {
            let state = engine.state_mut();
            for (idx, block) in state.blocks.iter_mut().enumerate() {
                block.active = idx / BLOCK_COLUMNS == SWEPT_ROW;
            }
            state.score = (NUM_BLOCKS - BLOCK_COLUMNS) as u32 * SCORE_PER_BLOCK;
            // narrow enough to carry the pinned ball into both border columns
            state.paddle.width = 2.0 * BALL_RADIUS;
        }

        let mut total_reward = 0.0;
        for _ in 0..100 {
            total_reward += engine.update(10.0, Some(GameAction::Left)).1;
        }
        assert_eq_roughly("paddle x", engine.state().paddle.pos.x, BALL_RADIUS, 1e-6);
        assert!(!engine.state().victory);

        for _ in 0..200 {
            total_reward += engine.update(10.0, Some(GameAction::Right)).1;
        }

        let state = engine.state();
        assert!(state.victory);
        assert!(!state.game_over);
        assert!(!state.ball.launched);
        assert_eq!(state.lives, INITIAL_LIVES);
        assert_eq!(state.active_blocks(), 0);
        assert_eq!(state.score, NUM_BLOCKS as u32 * SCORE_PER_BLOCK);
        assert!(total_reward > BLOCK_COLUMNS as f32 * REWARD_BLOCK_DESTROYED + REWARD_VICTORY + 300.0 * REWARD_BALL_IDLE);
    }

    #[test]
    fn test_victory_wins_over_game_over_in_the_same_step() {
        let mut engine = engine_with_single_block();
        {
            let state = engine.state_mut();
            state.lives = 1;
            // the ball falls out right below the last block's column... while the last block is gone
            state.blocks[0].active = false;
            state.score = NUM_BLOCKS as u32 * SCORE_PER_BLOCK;
            state.ball.launched = true;
            state.ball.pos = Pos2::new(0.05, 1.0);
            state.ball.velocity = Vec2::new(0.0, 0.4);
        }

        let (state, reward) = engine.update(TIMESTEP_MS, None);

        assert_eq!(state.lives, 0);
        assert!(state.victory);
        assert!(!state.game_over);
        assert_eq_roughly("reward", reward, REWARD_BALL_MISSED + REWARD_VICTORY + REWARD_BALL_IDLE, 1e-6);
    }

    #[test]
    fn test_launch_then_free_flight_scenario() {
        let mut engine = SimulationEngine::new();

        // launching from the start position: the ball sits inside block (10, 12), which breaks at once
        let (state, reward) = engine.update(TIMESTEP_MS, Some(GameAction::Launch));
        assert!(state.ball.launched);
        assert!(!state.blocks[10 * BLOCK_COLUMNS + 12].active);
        assert_eq!(state.active_blocks(), NUM_BLOCKS - 1);
        assert_eq!(state.ball.velocity, Vec2::new(BALL_LAUNCH_DX, BALL_SPEED_PER_SEC));
        assert_eq!(reward, REWARD_BLOCK_DESTROYED);

        // the ball now moves downwards inside the emptied cell: nothing to hit, nothing to earn
        let (state, reward) = engine.update(TIMESTEP_MS, None);
        assert_eq!(state.active_blocks(), NUM_BLOCKS - 1);
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn test_unlaunched_ball_is_penalized() {
        let mut engine = engine_with_single_block();
        let (_, reward) = engine.update(TIMESTEP_MS, Some(GameAction::Right));
        assert_eq!(reward, REWARD_BALL_IDLE);
    }

    #[rstest]
    #[case(- 1, GameAction::Left)]
    #[case(0, GameAction::None)]
    #[case(1, GameAction::Right)]
    #[case(2, GameAction::Jump)]
    #[case(3, GameAction::Launch)]
    fn test_wire_values(#[case] wire: i64, #[case] action: GameAction) {
        assert_eq!(GameAction::try_from_wire(wire).unwrap(), action);
        assert_eq!(action.wire_value() as i64, wire);
    }

    #[test]
    fn test_invalid_wire_value() {
        assert!(GameAction::try_from_wire(4).is_err());
        assert!(GameAction::try_from_wire(-2).is_err());
    }
}
