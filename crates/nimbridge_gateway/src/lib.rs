//! OpenAI-compatible HTTP front for the injection engine.
//!
//! Accepts chat completion requests, rewrites their messages through the
//! rule engine, maps the model name and forwards to the upstream endpoint.

pub mod error;
pub mod retry;
pub mod server;
pub mod types;
pub mod upstream;

pub use error::ApiError;
pub use retry::RetryConfig;
pub use server::GatewayServer;
pub use types::{ChatCompletionRequest, HealthResponse, ModelInfo, ModelList};
pub use upstream::UpstreamClient;
