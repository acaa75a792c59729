//! Pure building blocks shared by the bridge crates.
//!
//! Holds the workflow graph model, the parameter-injection engine that maps
//! simplified job parameters onto graph nodes, the resolution preset and
//! template tables, the base64 transport codec, and the output-directory
//! housekeeping sweep. Nothing in this crate touches the network.

pub mod codec;
pub mod error;
pub mod graph;
pub mod housekeeping;
pub mod injection;
pub mod resolution;
pub mod templates;
