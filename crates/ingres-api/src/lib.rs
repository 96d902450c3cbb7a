//! HTTP surface for the INGRES assistant.
//!
//! Exposes `POST /chat`, `GET /health` and the embedded chat page over axum.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
