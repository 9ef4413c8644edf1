pub mod cache;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod layout;
pub mod session;
pub mod util;
