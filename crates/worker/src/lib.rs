//! Worker process: configuration, the job platform adapter, and the local
//! HTTP API, all driving one [`Orchestrator`].
//!
//! [`Orchestrator`]: podbridge_pipeline::orchestrator::Orchestrator

pub mod config;
pub mod job;
pub mod runner;
pub mod server;

#[cfg(test)]
mod test_support;
