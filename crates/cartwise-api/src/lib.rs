//! Cartwise API crate - axum HTTP server, route handlers, SSE chat streaming.
//!
//! Exposes session management, transcript listing and the streaming chat
//! endpoint that relays turn frames as server-sent events.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
