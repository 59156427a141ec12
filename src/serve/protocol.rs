use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::environment::live_state::LiveState;

/// Message from a live game client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    State(LiveState),
}

/// Reply to a client message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Action {
        /// wire value of the chosen action
        #[serde(rename = "move")]
        action: i8,
        reward: f32,
    },
    Error {
        message: String,
    },
}

impl ClientMessage {
    pub fn decode(line: &str) -> Result<Self> { Ok(serde_json::from_str(line)?) }
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }
}
