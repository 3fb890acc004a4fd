pub mod concurrent_engine;
pub mod config;
pub mod engine;
pub mod error;
pub mod failover;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod persistent_engine;
pub mod replication;
