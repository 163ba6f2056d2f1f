//! Shared types for the order platform
//!
//! Error codes and response envelope, domain models, the realtime channel
//! protocol and small utilities used by the server and its clients.

pub mod error;
pub mod live;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, ErrorCode};
