use anyhow::Result;
use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::environment::breakout::mechanics::GameAction;
use crate::environment::breakout::observation::OBSERVATION_LEN;
use crate::ql::model::policy::{check_observation_shape, PolicyModel};
use crate::ql::prelude::{Action, ModelActionType, QlError};

const FORMAT_VERSION: u32 = 1;
const NUM_ACTIONS: usize = GameAction::ACTION_SPACE as usize;
const INITIAL_WEIGHT_SCALE: f32 = 0.01;

/// Linear action-value policy: one weight row per action over the observation, plus a bias.
/// The action with the highest value wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearPolicy {
    format_version: u32,
    /// `NUM_ACTIONS` rows of `OBSERVATION_LEN` weights
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl LinearPolicy {
    pub fn random<R: Rng>(rng: &mut R, scale: f32) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            weights: (0..NUM_ACTIONS * OBSERVATION_LEN).map(|_| rng.gen_range(-scale..=scale)).collect(),
            bias: (0..NUM_ACTIONS).map(|_| rng.gen_range(-scale..=scale)).collect(),
        }
    }

    /// A copy with every parameter shifted by uniform noise in `[-scale, scale]`
    pub fn perturbed<R: Rng>(&self, rng: &mut R, scale: f32) -> Self {
        let mut jitter = |v: &f32| v + rng.gen_range(-scale..=scale);
        Self {
            format_version: FORMAT_VERSION,
            weights: self.weights.iter().map(&mut jitter).collect(),
            bias: self.bias.iter().map(&mut jitter).collect(),
        }
    }

    pub fn action_values(&self, observation: &[f32]) -> Result<[f32; NUM_ACTIONS]> {
        check_observation_shape(observation)?;
        let mut values = [0.0_f32; NUM_ACTIONS];
        for (a, value) in values.iter_mut().enumerate() {
            let row = &self.weights[a * OBSERVATION_LEN..(a + 1) * OBSERVATION_LEN];
            *value = self.bias[a] + row.iter().zip(observation.iter()).map(|(w, o)| w * o).sum::<f32>();
        }
        Ok(values)
    }

    fn check_dims(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(QlError::PolicyFormat(format!("unsupported format version {}", self.format_version)).into());
        }
        if self.weights.len() != NUM_ACTIONS * OBSERVATION_LEN || self.bias.len() != NUM_ACTIONS {
            return Err(QlError::PolicyFormat(format!(
                "unexpected dimensions: {} weights, {} biases",
                self.weights.len(),
                self.bias.len()
            ))
            .into());
        }
        Ok(())
    }
}

impl PolicyModel for LinearPolicy {
    fn untrained() -> Self { LinearPolicy::random(&mut rand::thread_rng(), INITIAL_WEIGHT_SCALE) }

    fn from_blob(blob: &[u8]) -> Result<Self> {
        let policy: LinearPolicy = serde_json::from_slice(blob)
            .map_err(|e| QlError::PolicyFormat(e.to_string()))?;
        policy.check_dims()?;
        Ok(policy)
    }

    fn to_blob(&self) -> Result<Vec<u8>> { Ok(serde_json::to_vec(self)?) }

    fn decide(&self, observation: &[f32]) -> Result<GameAction> {
        let values = self.action_values(observation)?;
        let best = values
            .iter()
            .position_max_by(|a, b| a.total_cmp(b))
            .unwrap_or_default();
        GameAction::try_from_numeric(best as ModelActionType)
    }
}
