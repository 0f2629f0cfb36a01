//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

use super::DatabaseConfig;

/// 应用主配置结构（不含密钥，密钥见 [`super::SecurityConfig`]）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 上游服务商配置
    pub upstream: UpstreamConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind: String,
    /// 监听端口
    pub port: u16,
    /// API 路由前缀
    pub api_prefix: String,
    /// 允许携带 Cookie 的跨域来源
    pub cors_origins: Vec<String>,
    /// Cookie 是否附加 `Secure`
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 4000,
            api_prefix: "/api".to_string(),
            cors_origins: vec!["http://localhost:4200".to_string()],
            secure_cookies: false,
        }
    }
}

impl ServerConfig {
    /// 监听地址字符串
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// 单个上游端点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// 基础 URL，不含结尾 `/`
    pub base_url: String,
    /// 模型名称
    pub model: String,
}

impl EndpointConfig {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
        }
    }
}

/// 上游服务商配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub gemini: EndpointConfig,
    pub mistral: EndpointConfig,
    pub openai: EndpointConfig,
    /// 建立连接超时（秒）；流读取本身不设截止时间
    pub connect_timeout_secs: u64,
    /// 转发通道容量（片段数）
    pub channel_capacity: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            gemini: EndpointConfig::new(
                "https://generativelanguage.googleapis.com/v1beta",
                "gemini-1.5-flash",
            ),
            mistral: EndpointConfig::new("https://api.mistral.ai/v1", "mistral-large-latest"),
            openai: EndpointConfig::new("https://api.openai.com/v1", "gpt-4o-mini"),
            connect_timeout_secs: 10,
            channel_capacity: 32,
        }
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be greater than 0".to_string());
        }
        if !self.server.api_prefix.starts_with('/') {
            return Err(format!(
                "server.api_prefix must start with '/': {}",
                self.server.api_prefix
            ));
        }
        if self.database.url.is_empty() {
            return Err("database.url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("database.max_connections must be greater than 0".to_string());
        }
        if self.upstream.channel_capacity == 0 {
            return Err("upstream.channel_capacity must be greater than 0".to_string());
        }
        for (name, endpoint) in [
            ("gemini", &self.upstream.gemini),
            ("mistral", &self.upstream.mistral),
            ("openai", &self.upstream.openai),
        ] {
            if endpoint.base_url.is_empty() || endpoint.model.is_empty() {
                return Err(format!("upstream.{name} requires base_url and model"));
            }
        }
        Ok(())
    }
}
