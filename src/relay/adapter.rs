//! 各服务商的请求构造与响应文本提取

use serde_json::{Value, json};

use super::types::{Turn, TurnRole};
use crate::config::{EndpointConfig, UpstreamConfig};
use crate::provider::ProviderKind;
use crate::vault::ProviderSecret;

/// 上游请求。密钥单独存放，`url` 可安全写入日志。
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    /// 额外查询参数（Gemini 的 `alt=sse`）
    pub query: Vec<(&'static str, String)>,
    /// 放在查询参数 `key` 中的密钥
    pub query_key: Option<ProviderSecret>,
    /// Bearer 认证密钥
    pub bearer: Option<ProviderSecret>,
    pub body: Value,
}

/// 服务商对应的端点配置
#[must_use]
pub const fn endpoint(config: &UpstreamConfig, kind: ProviderKind) -> &EndpointConfig {
    match kind {
        ProviderKind::Gemini => &config.gemini,
        ProviderKind::Mistral => &config.mistral,
        ProviderKind::OpenAi => &config.openai,
    }
}

fn gemini_body(turns: &[Turn]) -> Value {
    let system: Vec<Value> = turns
        .iter()
        .filter(|turn| turn.role == TurnRole::System)
        .map(|turn| json!({ "text": turn.content }))
        .collect();
    let contents: Vec<Value> = turns
        .iter()
        .filter(|turn| turn.role != TurnRole::System)
        .map(|turn| {
            let role = if turn.role == TurnRole::Assistant { "model" } else { "user" };
            json!({ "role": role, "parts": [{ "text": turn.content }] })
        })
        .collect();

    let mut body = json!({ "contents": contents });
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": system });
    }
    body
}

fn chat_completions_body(model: &str, turns: &[Turn]) -> Value {
    let messages: Vec<Value> = turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
                TurnRole::System => "system",
            };
            json!({ "role": role, "content": turn.content })
        })
        .collect();
    json!({ "model": model, "messages": messages, "stream": true })
}

/// 构造流式上游请求
#[must_use]
pub fn build_request(
    kind: ProviderKind,
    endpoint: &EndpointConfig,
    secret: ProviderSecret,
    turns: &[Turn],
) -> UpstreamRequest {
    let base = endpoint.base_url.trim_end_matches('/');
    match kind {
        ProviderKind::Gemini => UpstreamRequest {
            url: format!("{base}/models/{}:streamGenerateContent", endpoint.model),
            query: vec![("alt", "sse".to_string())],
            query_key: Some(secret),
            bearer: None,
            body: gemini_body(turns),
        },
        ProviderKind::Mistral | ProviderKind::OpenAi => UpstreamRequest {
            url: format!("{base}/chat/completions"),
            query: Vec::new(),
            query_key: None,
            bearer: Some(secret),
            body: chat_completions_body(&endpoint.model, turns),
        },
    }
}

/// 从一条上游事件中提取文本增量（可能为多段）
#[must_use]
pub fn extract_text(kind: ProviderKind, event: &Value) -> Vec<String> {
    let texts: Vec<String> = match kind {
        ProviderKind::Gemini => event
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        ProviderKind::Mistral | ProviderKind::OpenAi => event
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .map(|text| vec![text.to_string()])
            .unwrap_or_default(),
    };
    texts.into_iter().filter(|text| !text.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn turns() -> Vec<Turn> {
        vec![
            Turn::new(TurnRole::System, "be brief"),
            Turn::new(TurnRole::User, "hi"),
            Turn::new(TurnRole::Assistant, "hello"),
            Turn::new(TurnRole::User, "again"),
        ]
    }

    #[test]
    fn test_gemini_request() {
        let config = UpstreamConfig::default();
        let request = build_request(
            ProviderKind::Gemini,
            &config.gemini,
            ProviderSecret::new("g-key"),
            &turns(),
        );

        assert_eq!(
            request.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:streamGenerateContent"
        );
        assert!(!request.url.contains("g-key"));
        assert_eq!(request.query_key.unwrap().expose(), "g-key");
        assert!(request.bearer.is_none());
        assert_eq!(
            request.body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]},
                    {"role": "user", "parts": [{"text": "again"}]},
                ],
                "systemInstruction": {"parts": [{"text": "be brief"}]},
            })
        );
    }

    #[test]
    fn test_chat_completions_request() {
        let config = UpstreamConfig::default();
        let request = build_request(
            ProviderKind::Mistral,
            &config.mistral,
            ProviderSecret::new("m-key"),
            &turns()[1..],
        );

        assert_eq!(request.url, "https://api.mistral.ai/v1/chat/completions");
        assert_eq!(request.bearer.unwrap().expose(), "m-key");
        assert_eq!(request.body["model"], "mistral-large-latest");
        assert_eq!(request.body["stream"], true);
        assert_eq!(request.body["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_extract_text() {
        let gemini = json!({"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]});
        assert_eq!(extract_text(ProviderKind::Gemini, &gemini), vec!["a", "b"]);

        let openai = json!({"choices": [{"delta": {"content": "tok"}}]});
        assert_eq!(extract_text(ProviderKind::OpenAi, &openai), vec!["tok"]);

        let role_only = json!({"choices": [{"delta": {"role": "assistant", "content": ""}}]});
        assert!(extract_text(ProviderKind::Mistral, &role_only).is_empty());
    }
}
