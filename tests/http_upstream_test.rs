//! 测试：`relay::HttpUpstream` 对真实 HTTP 上游的请求构造与错误分类

use std::time::Duration;

use ai_gateway::config::UpstreamConfig;
use ai_gateway::provider::ProviderKind;
use ai_gateway::relay::adapter::{build_request, endpoint};
use ai_gateway::relay::{HttpUpstream, Turn, TurnRole, UpstreamClient, UpstreamError};
use ai_gateway::vault::ProviderSecret;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(base: &str) -> UpstreamConfig {
    let mut config = UpstreamConfig::default();
    config.gemini.base_url = base.to_string();
    config.openai.base_url = format!("{base}/v1");
    config
}

fn turns() -> Vec<Turn> {
    vec![Turn::new(TurnRole::User, "hello")]
}

async fn collect(upstream: &HttpUpstream, request: ai_gateway::relay::adapter::UpstreamRequest) -> Vec<u8> {
    let mut stream = upstream.open(request).await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    body
}

#[tokio::test]
async fn gemini_key_goes_in_query() {
    let server = MockServer::start().await;
    let config = config(&server.uri());
    let path_str = format!("/models/{}:streamGenerateContent", config.gemini.model);

    Mock::given(method("POST"))
        .and(path(path_str.as_str()))
        .and(query_param("alt", "sse"))
        .and(query_param("key", "gm-secret"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "hello"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: {}\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();
    let request = build_request(
        ProviderKind::Gemini,
        endpoint(&config, ProviderKind::Gemini),
        ProviderSecret::new("gm-secret"),
        &turns(),
    );
    assert!(!request.url.contains("gm-secret"));

    let body = collect(&upstream, request).await;
    assert_eq!(body, b"data: {}\n\n");
}

#[tokio::test]
async fn openai_key_goes_in_bearer_header() {
    let server = MockServer::start().await;
    let config = config(&server.uri());

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-secret"))
        .and(body_partial_json(json!({
            "model": config.openai.model,
            "stream": true,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();
    let request = build_request(
        ProviderKind::OpenAi,
        endpoint(&config, ProviderKind::OpenAi),
        ProviderSecret::new("sk-secret"),
        &turns(),
    );

    let body = collect(&upstream, request).await;
    assert_eq!(body, b"data: [DONE]\n\n");
}

#[tokio::test]
async fn non_success_status_is_reported_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let config = config(&server.uri());
    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();
    let request = build_request(
        ProviderKind::Gemini,
        endpoint(&config, ProviderKind::Gemini),
        ProviderSecret::new("gm-secret"),
        &turns(),
    );

    let err = upstream.open(request).await.err().unwrap();
    assert_eq!(
        err,
        UpstreamError::Status {
            status: 429,
            body: "quota exceeded".to_string()
        }
    );
}

#[tokio::test]
async fn connect_errors_do_not_leak_the_key() {
    // 端口 9（discard）在测试环境中通常无人监听
    let config = config("http://127.0.0.1:9");
    let upstream = HttpUpstream::new(Duration::from_secs(2)).unwrap();
    let request = build_request(
        ProviderKind::Gemini,
        endpoint(&config, ProviderKind::Gemini),
        ProviderSecret::new("gm-very-secret"),
        &turns(),
    );

    let err = upstream.open(request).await.err().unwrap();
    assert!(matches!(err, UpstreamError::Connect(_)));
    assert!(!err.to_string().contains("gm-very-secret"));
}

#[tokio::test]
async fn large_error_bodies_are_cut_short() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("e".repeat(256 * 1024)))
        .mount(&server)
        .await;

    let config = config(&server.uri());
    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();
    let request = build_request(
        ProviderKind::OpenAi,
        endpoint(&config, ProviderKind::OpenAi),
        ProviderSecret::new("sk-secret"),
        &turns(),
    );

    match upstream.open(request).await.err().unwrap() {
        UpstreamError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "e".repeat(512));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
