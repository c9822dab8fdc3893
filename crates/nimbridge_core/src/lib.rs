pub mod config;
pub mod message;

pub use config::{ModelConfig, ProxyConfig, RulesConfig, ServerConfig, UpstreamConfig};
pub use message::{ChatMessage, Role};
