//! # 配置管理模块
//!
//! 非敏感配置来自可选的 `config/config.{RUST_ENV}.toml`，再由环境变量覆盖；
//! 密钥只从环境变量读取。配置在启动时构建一次，之后以 `Arc` 共享。

mod app_config;
mod database;
mod security;

pub use app_config::{AppConfig, EndpointConfig, ServerConfig, UpstreamConfig};
pub use database::DatabaseConfig;
pub use security::{
    ACCESS_TOKEN_SECRET_ENV, ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_SECRET_ENV,
    REFRESH_TOKEN_TTL_SECS, SECRET_ENCRYPTION_KEY_ENV, SecurityConfig,
};

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};

/// 默认配置文件路径
#[must_use]
pub fn default_config_path() -> PathBuf {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载配置：文件（可选） + 进程环境变量
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let default_path = default_config_path();
    let explicit = path.is_some();
    let path = path.unwrap_or(&default_path);

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;
        toml::from_str::<AppConfig>(&content)?
    } else if explicit {
        return Err(GatewayError::config(format!(
            "配置文件不存在: {}",
            path.display()
        )));
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |name| env::var(name).ok())?;
    config.validate().map_err(GatewayError::config)?;
    Ok(config)
}

/// 应用 `GATEWAY_BIND` / `GATEWAY_PORT` / `DATABASE_URL` 覆盖
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup("GATEWAY_BIND").filter(|v| !v.is_empty()) {
        config.server.bind = bind;
    }
    if let Some(port) = lookup("GATEWAY_PORT").filter(|v| !v.is_empty()) {
        config.server.port = port.parse().map_err(|e| {
            GatewayError::config_with_source(format!("GATEWAY_PORT is not a valid port: {port}"), e)
        })?;
    }
    if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
        config.database.url = url;
    }
    Ok(())
}
