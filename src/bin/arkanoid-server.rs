//! Arkanoid policy server: trains in the background and answers a live game client.
//!
//! The client talks newline-delimited JSON over stdin/stdout:
//! one `{"type":"state",...}` message per line in, one `{"type":"action",...}` reply per line out.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use arkanoid_ql::ql::learn::random_search_learner::{RandomSearchLearner, SearchParameter};
use arkanoid_ql::ql::learn::training_loop::Parameter;
use arkanoid_ql::ql::model::linear_policy::LinearPolicy;
use arkanoid_ql::serve::coordinator::Coordinator;
use arkanoid_ql::store::blob_store::FileBlobStore;
use arkanoid_ql::store::policy_store::PolicyStore;
use arkanoid_ql::util;

#[derive(Parser, Debug)]
#[command(name = "arkanoid-server")]
#[command(about = "Serve Arkanoid moves from a continuously trained policy", long_about = None)]
struct Args {
    /// Directory holding the best policy found so far
    #[arg(long, default_value = "policy-store")]
    storage_dir: PathBuf,

    /// Training steps between two checkpoint evaluations
    #[arg(long, default_value_t = 1_000)]
    evaluation_interval: usize,

    #[arg(long, default_value_t = 20_000)]
    max_steps_per_episode: usize,

    /// Only serve the stored policy, do not train
    #[arg(long)]
    no_training: bool,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

fn main() -> Result<()> {
    let args = Args::parse();
    util::init_logging_with_level(args.log_level);

    let storage = Arc::new(FileBlobStore::open(&args.storage_dir)?);
    let policy = Arc::new(PolicyStore::<LinearPolicy>::restore_from_storage(storage)?);
    let mut coordinator = Coordinator::new(Arc::clone(&policy));

    if !args.no_training {
        let start = policy.snapshot().model().clone();
        let param = Parameter {
            evaluation_interval_steps: args.evaluation_interval.max(1),
            max_steps_per_episode: args.max_steps_per_episode.max(1),
            ..Parameter::default()
        };
        coordinator.start_training(RandomSearchLearner::new(start, SearchParameter::default()), param)?;
    }

    serve_stdio(&coordinator)?;

    if let Some(stats) = coordinator.stop_training()? {
        log::info!("training finished: {:?}", stats);
    }
    Ok(())
}

fn serve_stdio(coordinator: &Coordinator<LinearPolicy>) -> Result<()> {
    let mut session = coordinator.open_session();
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = session.handle_message(&line).encode()?;
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}
