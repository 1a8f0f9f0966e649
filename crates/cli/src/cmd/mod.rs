//! Subcommand implementations

pub mod file;
pub mod run;
pub mod s3;
