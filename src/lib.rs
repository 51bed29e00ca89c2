//! chatgate - Chat completion gateway with real-time event fan-out
//!
//! This library provides the core functionality for the chatgate server:
//! provider configuration, model-to-provider routing, completion dispatch,
//! and the WebSocket event hub.

pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod ws;

pub use config::Config;
pub use error::{DispatchFailure, FailureKind};
pub use registry::ModelRegistry;
