use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};

use crate::ql::learn::learner::Learner;
use crate::ql::learn::training_loop::{Parameter, TrainingLoop, TrainingStats};
use crate::ql::model::policy::PolicyModel;
use crate::serve::inference_session::InferenceSession;
use crate::store::policy_store::PolicyStore;

/// Wires the background training and the live sessions around one shared [PolicyStore].
///
/// Training gets its own episode controller on its own thread; every session gets a fresh one.
/// Nothing but the policy store is handed to more than one owner.
pub struct Coordinator<M: PolicyModel> {
    policy: Arc<PolicyStore<M>>,
    stop: Arc<AtomicBool>,
    trainer: Option<JoinHandle<TrainingStats>>,
    next_session_id: AtomicUsize,
}

impl<M: PolicyModel> Coordinator<M> {
    pub fn new(policy: Arc<PolicyStore<M>>) -> Self {
        Self {
            policy,
            stop: Arc::new(AtomicBool::new(false)),
            trainer: None,
            next_session_id: AtomicUsize::new(1),
        }
    }

    pub fn policy(&self) -> &Arc<PolicyStore<M>> { &self.policy }

    pub fn is_training(&self) -> bool { self.trainer.as_ref().is_some_and(|t| !t.is_finished()) }

    pub fn start_training<L>(&mut self, learner: L, param: Parameter) -> Result<()>
    where
        L: Learner<M = M> + 'static,
    {
        if self.trainer.is_some() {
            return Err(anyhow!("training is already running"));
        }
        self.stop.store(false, Ordering::Relaxed);
        let policy = Arc::clone(&self.policy);
        let stop = Arc::clone(&self.stop);
        let handle = std::thread::Builder::new()
            .name("training".to_string())
            .spawn(move || TrainingLoop::new(learner, policy, param).run(&stop))?;
        self.trainer = Some(handle);
        Ok(())
    }

    /// Signals the training loop to stop and waits for it.
    /// Returns `None` if no training was running.
    pub fn stop_training(&mut self) -> Result<Option<TrainingStats>> {
        self.stop.store(true, Ordering::Relaxed);
        match self.trainer.take() {
            None => Ok(None),
            Some(handle) => {
                let stats = handle.join().map_err(|_| anyhow!("training thread panicked"))?;
                Ok(Some(stats))
            }
        }
    }

    /// A new session with its own episode controller, reading from the shared policy store
    pub fn open_session(&self) -> InferenceSession<M> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        InferenceSession::new(id, Arc::clone(&self.policy))
    }
}

impl<M: PolicyModel> Drop for Coordinator<M> {
    fn drop(&mut self) {
        if self.trainer.is_some() {
            if let Err(e) = self.stop_training() {
                log::error!("{e:#}");
            }
        }
    }
}
