//! HTTP server for gridkv.
//!
//! Exposes the chunk engine over a small REST API: multipart upload,
//! download with the stored content type, descriptor lookup, and delete.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{ServerConfig, DEFAULT_KEYSPACE_ROOT};
pub use error::{ServerError, ServerResult};
pub use handler::HealthResponse;
pub use server::GridServer;
pub use state::{AppState, Engine};
