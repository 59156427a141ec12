pub mod learner;
pub mod random_search_learner;
pub mod replay_buffer;
pub mod training_loop;
