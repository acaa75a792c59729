//! ComfyUI REST client and execution wait loops.
//!
//! Provides typed wrappers over the engine's HTTP API, the [`Engine`]
//! trait that the job pipeline programs against, typed history (result
//! descriptor) parsing, and the readiness and completion wait loops that
//! relay progress and honour cancellation.
//!
//! [`Engine`]: engine::Engine

pub mod api;
pub mod engine;
pub mod error;
pub mod history;
pub mod progress;
pub mod wait;
