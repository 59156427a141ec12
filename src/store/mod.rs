pub mod blob_store;
pub mod policy_store;
