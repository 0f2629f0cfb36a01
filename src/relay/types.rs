//! 对话轮次与输出片段

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// 轮次角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    /// 模型回复；Gemini 称为 `model`
    Assistant,
    System,
}

impl TurnRole {
    fn parse(role: &str) -> Option<Self> {
        match role.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" | "model" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// 单轮对话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// 接受 `{role, content}` 或 Gemini 风格的 `{role, parts: [{text}]}`
    pub fn from_value(value: &Value, index: usize) -> Result<Self> {
        let field = format!("contents[{index}]");
        let role = value
            .get("role")
            .and_then(Value::as_str)
            .and_then(TurnRole::parse)
            .ok_or_else(|| {
                GatewayError::validation_field("role must be user, assistant, model or system", &field)
            })?;

        let content = if let Some(text) = value.get("content").and_then(Value::as_str) {
            text.to_string()
        } else if let Some(parts) = value.get("parts").and_then(Value::as_array) {
            let texts: Option<Vec<&str>> = parts
                .iter()
                .map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            texts
                .ok_or_else(|| GatewayError::validation_field("every part needs a text field", &field))?
                .concat()
        } else {
            return Err(GatewayError::validation_field(
                "turn needs content or parts",
                &field,
            ));
        };

        Ok(Self { role, content })
    }
}

/// 解析 `contents` 数组，至少一轮
pub fn parse_turns(value: Option<&Value>) -> Result<Vec<Turn>> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::validation_field("contents must be an array", "contents"))?;
    if items.is_empty() {
        return Err(GatewayError::validation_field(
            "contents must not be empty",
            "contents",
        ));
    }
    items
        .iter()
        .enumerate()
        .map(|(index, item)| Turn::from_value(item, index))
        .collect()
}

/// 转发请求
#[derive(Debug, Clone)]
pub struct RelayRequest {
    /// 调用者（凭据所有者）
    pub caller_id: String,
    /// 服务商名称
    pub provider: String,
    /// 完整对话历史
    pub turns: Vec<Turn>,
}

/// 发往客户端的一条 NDJSON 片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub message: String,
}

impl Fragment {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// `{"message": "..."}\n`
    #[must_use]
    pub fn to_ndjson(&self) -> Bytes {
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        Bytes::from(line)
    }
}
