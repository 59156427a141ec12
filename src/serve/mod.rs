//! Live side: one inference session per client connection, coordinated with background training.

pub mod coordinator;
pub mod inference_session;
pub mod protocol;
