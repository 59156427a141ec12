use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

use anyhow::Result;

/// Data type we use to encode an `Action` to feed the model.
pub type ModelActionType = u8;

pub trait Action: Display + Debug + Sized + Clone + Copy + Hash + PartialEq + Eq {
    /// Number of possible actions
    const ACTION_SPACE: ModelActionType;
    /// Identifying the Action as a unique value in range (0..Self::ACTION_SPACE)
    fn numeric(&self) -> ModelActionType;
    fn try_from_numeric(value: ModelActionType) -> Result<Self>;
}

/// Learning environment, modeling the world of a learning agent
pub trait Environment {
    type S: Clone;
    type A: Action;

    /// Resets the environment to a defined starting point and returns the first state
    fn reset(&mut self) -> Self::S;

    /// Performs one time/action-step.
    ///
    /// Applies the given `action` to the environment and returns:
    ///   - next state
    ///   - immediate reward earned during performing that step
    ///   - terminated flag (game ended)
    ///   - truncated flag (episode cut off before the game ended)
    fn step(&mut self, action: Self::A) -> Result<Step<Self::S>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step<S> {
    pub state: S,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

impl<S> Step<S> {
    pub fn done(&self) -> bool { self.terminated || self.truncated }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QlError {
    InvalidAction(i64),
    ObservationShape { expected: usize, actual: usize },
    MalformedState(String),
    ModeMismatch { expected: String, actual: String },
    Storage(String),
    PolicyFormat(String),
}

impl Display for QlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QlError::InvalidAction(v) => write!(f, "action value {v} out of range"),
            QlError::ObservationShape { expected, actual } => {
                write!(f, "observation has {actual} values, expected {expected}")
            }
            QlError::MalformedState(msg) => write!(f, "malformed game state: {msg}"),
            QlError::ModeMismatch { expected, actual } => {
                write!(f, "operation requires {expected} mode, controller runs in {actual} mode")
            }
            QlError::Storage(msg) => write!(f, "storage: {msg}"),
            QlError::PolicyFormat(msg) => write!(f, "policy blob: {msg}"),
        }
    }
}

impl std::error::Error for QlError {}
