//! Database models and queries

pub mod init;
pub mod models;
pub mod options;

pub use init::*;
pub use models::*;
pub use options::*;
