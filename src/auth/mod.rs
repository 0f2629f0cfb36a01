//! # 认证授权模块
//!
//! 双令牌会话：短期访问令牌与长期刷新令牌分别使用独立密钥签名，
//! 通过 `access` / `refresh` Cookie 下发。

pub mod cookies;
pub mod jwt;
pub mod permissions;
pub mod service;
pub mod types;
pub mod users;

pub use jwt::{TokenError, TokenPair, TokenService};
pub use permissions::UserRole;
pub use service::AuthService;
pub use types::{SessionClaims, SessionIdentity};
