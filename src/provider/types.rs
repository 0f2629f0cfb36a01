use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// 上游协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini `streamGenerateContent`
    Gemini,
    /// Mistral chat completions
    Mistral,
    /// `OpenAI` chat completions
    OpenAi,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Mistral => "mistral",
            Self::OpenAi => "openai",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "mistral" => Some(Self::Mistral),
            "openai" | "gpt" | "chatgpt" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            GatewayError::validation_field(format!("unsupported provider kind: {s}"), "kind")
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 服务商描述。默认密钥存放在凭据表中，owner 为 `default`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    pub id: i32,
    /// 规范化（小写）名称
    pub name: String,
    pub kind: ProviderKind,
    pub created_at: DateTime<Utc>,
}

/// 名称规范化：去空白并转小写
#[must_use]
pub fn canonical_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
