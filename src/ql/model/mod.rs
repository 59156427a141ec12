pub mod linear_policy;
pub mod policy;
