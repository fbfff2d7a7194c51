pub mod common;
pub mod error;
pub mod config;
pub mod doc;
pub mod token;
pub mod pagerank;
pub mod index;
pub mod ranking;
pub mod engine;

// picked up from the working directory when no --config is given
pub const CFG_NAME: &str = ".paperir.yml";
