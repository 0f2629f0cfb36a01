//! # HTTP 服务模块
//!
//! - `gateway`：服务器与路由组装
//! - `routes`：API 路由表
//! - `middleware`：请求 ID 与会话门禁
//! - `handlers`：各端点处理器
//! - `response`：统一 JSON 响应

pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

pub use gateway::{AppState, GatewayServer, create_router};
