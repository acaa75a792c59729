//! Job pipeline: turns one job request into one job result.
//!
//! - [`request`] parses and validates the job payload at the boundary.
//! - [`inputs`] stages embedded input images where the engine can read them.
//! - [`outputs`] resolves produced artifacts into transportable records.
//! - [`orchestrator`] sequences the whole job and translates every failure
//!   into the error variant of [`request::JobResult`].

pub mod error;
pub mod inputs;
pub mod orchestrator;
pub mod outputs;
pub mod request;
