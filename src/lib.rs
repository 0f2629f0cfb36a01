//! # AI Gateway Library
//!
//! 会话认证的 AI 服务商网关：双令牌 Cookie 会话、加密凭据保险库、
//! 以及把上游流式响应逐片段转发给调用方的中继。

pub mod app;
pub mod auth;
pub mod cipher;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod provider;
pub mod relay;
pub mod server;
pub mod vault;

// Re-export commonly used types
pub use app::{AppContext, StoreSet};
pub use config::{AppConfig, SecurityConfig};
pub use error::{GatewayError, Result};
pub use server::GatewayServer;
