use std::path::Path;
use std::sync::Arc;

use arkanoid_ql::environment::breakout::mechanics::GameState;
use arkanoid_ql::environment::live_state::LiveState;
use arkanoid_ql::ql::model::linear_policy::LinearPolicy;
use arkanoid_ql::store::blob_store::FileBlobStore;
use arkanoid_ql::store::policy_store::PolicyStore;

pub fn file_backed_store(dir: &Path) -> Arc<PolicyStore<LinearPolicy>> {
    let storage = Arc::new(FileBlobStore::open(dir).unwrap());
    Arc::new(PolicyStore::restore_from_storage(storage).unwrap())
}

pub fn state_line(state: &LiveState) -> String { format!(r#"{{"type":"state","data":{}}}"#, serde_json::to_string(state).unwrap()) }

pub fn initial_live_state() -> LiveState { LiveState::from_game_state(&GameState::initial()) }
