//! Web API module for groupvault.
//!
//! REST endpoints for authentication, file upload and moderation, groups,
//! users, and the upload policy. All responses use the JSON envelopes in
//! [`dto`]; errors are rendered by [`error::ApiError`].

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use openapi::ApiDoc;
pub use router::{create_health_router, create_openapi_router, create_router};
pub use server::WebServer;
