//! CLI command implementations.

pub mod cache;
pub mod init;
pub mod list;
pub mod run;
pub mod validate;
