use anyhow::Result;

use crate::environment::breakout::mechanics::GameAction;
use crate::environment::breakout::observation::OBSERVATION_LEN;
use crate::ql::prelude::QlError;

/// Policy function boundary: maps an observation to an action and travels as an opaque blob.
///
/// Implementations are immutable once built; an improved policy is a new instance.
pub trait PolicyModel: Send + Sync + Sized + 'static {
    /// A fresh, untrained policy
    fn untrained() -> Self;

    fn from_blob(blob: &[u8]) -> Result<Self>;

    fn to_blob(&self) -> Result<Vec<u8>>;

    /// Predicts the next action based on an observation.
    ///
    /// # Arguments
    /// * `observation` the `OBSERVATION_LEN` values of an [crate::environment::breakout::observation::Observation].
    ///   Any other length is rejected.
    fn decide(&self, observation: &[f32]) -> Result<GameAction>;
}

pub fn check_observation_shape(observation: &[f32]) -> Result<()> {
    if observation.len() != OBSERVATION_LEN {
        return Err(QlError::ObservationShape {
            expected: OBSERVATION_LEN,
            actual: observation.len(),
        }
        .into());
    }
    Ok(())
}
