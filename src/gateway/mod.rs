//! Completion gateway: request types, dispatcher, and HTTP surface.

mod dispatch;
mod handlers;
mod server;
mod types;

pub use dispatch::{CompletionResult, Dispatcher};
pub use server::{create_router, run_server, AppState};
pub use types::{CompletionRequest, Message};
