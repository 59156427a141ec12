pub mod environment;
pub mod ql;
pub mod serve;
pub mod store;
pub mod util;
