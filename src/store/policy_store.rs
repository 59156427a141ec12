use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::Result;

use crate::environment::breakout::mechanics::GameAction;
use crate::ql::model::policy::PolicyModel;
use crate::store::blob_store::BlobStore;

pub const BEST_MODEL_KEY: &str = "best_model";
pub const BEST_MODEL_QUALITY_KEY: &str = "best_model_quality";

/// One fully formed policy version. Never modified after creation.
pub struct PolicySnapshot<M> {
    version: u64,
    /// mean recent episodic return the policy was measured with
    quality: f32,
    blob: Vec<u8>,
    model: M,
}

impl<M> PolicySnapshot<M> {
    pub fn version(&self) -> u64 { self.version }

    pub fn quality(&self) -> f32 { self.quality }

    pub fn blob(&self) -> &[u8] { &self.blob }

    pub fn model(&self) -> &M { &self.model }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CheckpointOutcome {
    Replaced { version: u64, persisted: bool },
    Rejected { watermark: f32 },
}

struct WriterState {
    /// the current snapshot could not be written to storage yet
    unpersisted: bool,
}

/// Holds the best policy found so far.
///
/// Readers clone the current snapshot reference under a short read lock and decide without any lock held.
/// A checkpoint builds the new snapshot completely, persists it, and then swaps the reference,
/// so a reader sees either the old or the new version as a whole.
/// Checkpoints are serialized among each other by a separate writer lock, which readers never touch.
pub struct PolicyStore<M: PolicyModel> {
    current: RwLock<Arc<PolicySnapshot<M>>>,
    writer: Mutex<WriterState>,
    storage: Arc<dyn BlobStore>,
}

impl<M: PolicyModel> PolicyStore<M> {
    /// Adopts the durable best policy if there is one, else starts with an untrained policy.
    /// Unreachable storage or an unreadable blob are logged and lead to a fresh start.
    pub fn restore_from_storage(storage: Arc<dyn BlobStore>) -> Result<Self> {
        let restored = match storage.get(BEST_MODEL_KEY) {
            Ok(Some(blob)) => match M::from_blob(&blob) {
                Ok(model) => {
                    let quality = Self::restore_quality(storage.as_ref());
                    log::info!("restored best policy from storage ({} bytes, quality {:.2})", blob.len(), quality);
                    Some(PolicySnapshot { version: 0, quality, blob, model })
                }
                Err(e) => {
                    log::error!("stored policy is unusable, starting untrained: {e:#}");
                    None
                }
            },
            Ok(None) => {
                log::info!("no stored policy, starting untrained");
                None
            }
            Err(e) => {
                log::warn!("storage not readable, starting untrained: {e:#}");
                None
            }
        };

        let snapshot = match restored {
            Some(s) => s,
            None => {
                let model = M::untrained();
                PolicySnapshot {
                    version: 0,
                    quality: f32::NEG_INFINITY,
                    blob: model.to_blob()?,
                    model,
                }
            }
        };

        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(WriterState { unpersisted: false }),
            storage,
        })
    }

    fn restore_quality(storage: &dyn BlobStore) -> f32 {
        let parsed = storage
            .get(BEST_MODEL_QUALITY_KEY)
            .map(|blob| blob.and_then(|b| String::from_utf8(b).ok()).and_then(|s| s.trim().parse::<f32>().ok()));
        match parsed {
            Ok(Some(quality)) => quality,
            Ok(None) => f32::NEG_INFINITY,
            Err(e) => {
                log::warn!("could not read stored policy quality: {e:#}");
                f32::NEG_INFINITY
            }
        }
    }

    pub fn snapshot(&self) -> Arc<PolicySnapshot<M>> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// quality watermark a checkpoint candidate has to beat
    pub fn quality(&self) -> f32 { self.snapshot().quality }

    pub fn version(&self) -> u64 { self.snapshot().version }

    pub fn decide(&self, observation: &[f32]) -> Result<GameAction> { self.snapshot().model.decide(observation) }

    /// Replaces the stored best policy iff `quality` strictly exceeds the current watermark.
    ///
    /// A blob which does not decode is an error and changes nothing.
    /// A storage failure does not fail the checkpoint: the candidate becomes current in memory
    /// and gets written by a later [Self::retry_pending_persist].
    pub fn checkpoint(&self, blob: Vec<u8>, quality: f32) -> Result<CheckpointOutcome> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        // NaN never wins
        if !(quality > current.quality) {
            log::debug!("checkpoint rejected: quality {:.2} does not beat {:.2}", quality, current.quality);
            return Ok(CheckpointOutcome::Rejected {
                watermark: current.quality,
            });
        }

        let model = M::from_blob(&blob)?;
        let snapshot = Arc::new(PolicySnapshot {
            version: current.version + 1,
            quality,
            blob,
            model,
        });
        let persisted = self.persist(&snapshot);
        writer.unpersisted = !persisted;

        let version = snapshot.version;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        log::info!("new best policy v{} with quality {:.2} (was {:.2}){}", version, quality, current.quality, if persisted { "" } else { " - not persisted yet" });

        Ok(CheckpointOutcome::Replaced { version, persisted })
    }

    /// Writes the current policy to storage if an earlier attempt failed.
    /// Returns whether storage is up to date afterwards.
    pub fn retry_pending_persist(&self) -> bool {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if writer.unpersisted {
            let snapshot = self.snapshot();
            if self.persist(&snapshot) {
                log::info!("policy v{} persisted on retry", snapshot.version);
                writer.unpersisted = false;
            }
        }
        !writer.unpersisted
    }

    pub fn has_unpersisted_checkpoint(&self) -> bool { self.writer.lock().unwrap_or_else(PoisonError::into_inner).unpersisted }

    fn persist(&self, snapshot: &PolicySnapshot<M>) -> bool {
        let result = self
            .storage
            .set(BEST_MODEL_KEY, &snapshot.blob)
            .and_then(|_| self.storage.set(BEST_MODEL_QUALITY_KEY, snapshot.quality.to_string().as_bytes()));
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to persist policy v{}: {e:#}", snapshot.version);
                false
            }
        }
    }
}
