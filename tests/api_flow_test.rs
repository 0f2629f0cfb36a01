//! # 网关 API 流程测试
//!
//! 通过完整路由测试：
//! 1. 登录 / 刷新 / 登出与 Cookie 属性
//! 2. 会话门禁（401 与 403 可区分）
//! 3. 凭据写入、查询、回退与删除
//! 4. 流式对话（上游由 wiremock 模拟）

mod common;

use axum::http::{Method, StatusCode, header};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    ADMIN_EMAIL, ADMIN_PASSWORD, GEMINI_DEFAULT_KEY, USER_EMAIL, USER_ID, USER_PASSWORD, gateway,
    login, request, send, user_identity,
};

const GEMINI_PATH: &str = "/models/gemini-test:streamGenerateContent";

fn gemini_sse(chunks: &[&str]) -> String {
    chunks
        .iter()
        .map(|text| {
            format!(
                "data: {}\r\n\r\n",
                json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
            )
        })
        .collect()
}

fn ndjson_messages(body: &[u8]) -> Vec<String> {
    std::str::from_utf8(body)
        .unwrap()
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let value: Value = serde_json::from_str(line).unwrap();
            value["message"].as_str().unwrap().to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_ping() {
    let gw = gateway("http://127.0.0.1:9").await;
    let response = send(&gw.router, request(Method::GET, "/ping", None, None)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"pong");
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_login_sets_both_cookies() {
    let gw = gateway("http://127.0.0.1:9").await;
    let body = json!({"email": USER_EMAIL, "password": USER_PASSWORD});
    let response = send(
        &gw.router,
        request(Method::POST, "/api/auth/login", Some(&body), None),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let access = response.set_cookie("access").unwrap();
    let refresh = response.set_cookie("refresh").unwrap();
    for cookie in [&access, &refresh] {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
    }
    assert!(access.contains("Max-Age=900"));
    assert!(refresh.contains("Max-Age=604800"));

    // 访问令牌解码出正确的主体，有效期 15 分钟
    let token = response.cookie_value("access").unwrap();
    let claims = gw.context.auth.verify_session(Some(&token)).unwrap();
    assert_eq!(claims.sub, USER_ID);
    assert_eq!(claims.lifetime_seconds(), 900);

    let json = response.json();
    assert_eq!(json["data"]["user"]["email"], USER_EMAIL);
    assert!(!String::from_utf8_lossy(&response.body).contains(&token));
}

#[tokio::test]
async fn test_login_failures() {
    let gw = gateway("http://127.0.0.1:9").await;

    let wrong = json!({"email": USER_EMAIL, "password": "nope"});
    let response = send(&gw.router, request(Method::POST, "/api/auth/login", Some(&wrong), None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.set_cookies().is_empty());
    assert_eq!(response.error_code(), "AUTHENTICATION_ERROR");

    let malformed = json!({"email": USER_EMAIL});
    let response = send(
        &gw.router,
        request(Method::POST, "/api/auth/login", Some(&malformed), None),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_access_then_refresh() {
    let gw = gateway("http://127.0.0.1:9").await;
    let stale = gw
        .context
        .auth
        .tokens()
        .issue_at(&user_identity(), Utc::now() - Duration::minutes(16))
        .unwrap();

    let expired_cookie = format!("access={}", stale.access_token);
    let response = send(
        &gw.router,
        request(Method::GET, "/api/auth/me", None, Some(&expired_cookie)),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let refresh_cookie = format!("refresh={}", stale.refresh_token);
    let response = send(
        &gw.router,
        request(Method::POST, "/api/auth/refresh", None, Some(&refresh_cookie)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.set_cookie("refresh").is_none());
    let access = response.cookie_value("access").unwrap();

    let response = send(
        &gw.router,
        request(Method::GET, "/api/auth/me", None, Some(&format!("access={access}"))),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"]["user"]["id"], USER_ID);
}

#[tokio::test]
async fn test_refresh_rejections_are_forbidden() {
    let gw = gateway("http://127.0.0.1:9").await;

    let response = send(&gw.router, request(Method::POST, "/api/auth/refresh", None, None)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.set_cookies().is_empty());

    // 访问令牌不能当作刷新令牌使用
    let cookies = login(&gw.router, USER_EMAIL, USER_PASSWORD).await;
    let access = cookies
        .split("; ")
        .find_map(|pair| pair.strip_prefix("access="))
        .unwrap();
    let response = send(
        &gw.router,
        request(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(&format!("refresh={access}")),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "REFRESH_REJECTED");
}

#[tokio::test]
async fn test_token_failures_return_fixed_messages() {
    let gw = gateway("http://127.0.0.1:9").await;

    let response = send(
        &gw.router,
        request(Method::GET, "/api/auth/me", None, Some("access=abc.def.ghi")),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_message(), "authentication failed: invalid session");

    let response = send(
        &gw.router,
        request(Method::POST, "/api/auth/refresh", None, Some("refresh=not-a-jwt")),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_message(), "refresh rejected: refresh token invalid");
}

#[tokio::test]
async fn test_logout_clears_cookies() {
    let gw = gateway("http://127.0.0.1:9").await;
    let response = send(&gw.router, request(Method::POST, "/api/auth/logout", None, None)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.set_cookie("access").unwrap().contains("Max-Age=0"));
    assert!(response.set_cookie("refresh").unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_unauthenticated_and_unauthorized_are_distinct() {
    let gw = gateway("http://127.0.0.1:9").await;
    let body = json!({"name": "openai", "default_secret": "sk-default"});

    let response = send(&gw.router, request(Method::POST, "/api/providers", Some(&body), None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_code(), "AUTHENTICATION_ERROR");

    let user = login(&gw.router, USER_EMAIL, USER_PASSWORD).await;
    let response = send(
        &gw.router,
        request(Method::POST, "/api/providers", Some(&body), Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "AUTHORIZATION_ERROR");

    let admin = login(&gw.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let response = send(
        &gw.router,
        request(Method::POST, "/api/providers", Some(&body), Some(&admin)),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["data"]["kind"], "openai");

    let response = send(
        &gw.router,
        request(Method::POST, "/api/providers", Some(&body), Some(&admin)),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = send(&gw.router, request(Method::GET, "/api/providers", None, Some(&user))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_credential_lifecycle() {
    let gw = gateway("http://127.0.0.1:9").await;
    let user = login(&gw.router, USER_EMAIL, USER_PASSWORD).await;
    let body = json!({"provider": "gemini", "secret": "AIza-user-secret-1234"});

    // 还没有用户密钥：回退到默认密钥
    let response = send(
        &gw.router,
        request(Method::GET, "/api/credentials/gemini", None, Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"]["source"], "default");
    assert_eq!(response.json()["data"]["fallback_reason"], "missing");

    let response = send(
        &gw.router,
        request(Method::PUT, "/api/credentials", Some(&body), Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(
        &gw.router,
        request(Method::POST, "/api/credentials", Some(&body), Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(!String::from_utf8_lossy(&response.body).contains("AIza-user-secret-1234"));

    let response = send(
        &gw.router,
        request(Method::POST, "/api/credentials", Some(&body), Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = send(
        &gw.router,
        request(Method::GET, "/api/credentials/gemini", None, Some(&user)),
    )
    .await;
    let data = response.json()["data"].clone();
    assert_eq!(data["source"], "user");
    assert_eq!(data["masked_secret"], "********1234");

    let updated = json!({"provider": "gemini", "secret": "AIza-user-secret-9876"});
    let response = send(
        &gw.router,
        request(Method::PUT, "/api/credentials", Some(&updated), Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(
        &gw.router,
        request(Method::DELETE, "/api/credentials/gemini", None, Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"]["removed"], true);

    // 删除后再次删除仍然成功
    let response = send(
        &gw.router,
        request(Method::DELETE, "/api/credentials/gemini", None, Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"]["removed"], false);

    let response = send(
        &gw.router,
        request(Method::GET, "/api/credentials/gemini", None, Some(&user)),
    )
    .await;
    assert_eq!(response.json()["data"]["source"], "default");

    let unknown = json!({"provider": "nope", "secret": "x"});
    let response = send(
        &gw.router,
        request(Method::POST, "/api/credentials", Some(&unknown), Some(&user)),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_streams_ndjson_with_user_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(query_param("alt", "sse"))
        .and(query_param("key", "AIza-user-secret-1234"))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "hi"}]},
                {"role": "model", "parts": [{"text": "hello"}]},
                {"role": "user", "parts": [{"text": "tell me more"}]}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(gemini_sse(&["Once", " upon", " a time"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri()).await;
    let user = login(&gw.router, USER_EMAIL, USER_PASSWORD).await;
    let secret = json!({"provider": "gemini", "secret": "AIza-user-secret-1234"});
    send(
        &gw.router,
        request(Method::POST, "/api/credentials", Some(&secret), Some(&user)),
    )
    .await;

    let chat = json!({
        "user_id": USER_ID,
        "provider": "gemini",
        "contents": [
            {"role": "user", "content": "hi"},
            {"role": "model", "parts": [{"text": "hello"}]},
            {"role": "user", "content": "tell me more"}
        ]
    });
    let response = send(&gw.router, request(Method::POST, "/api/chat", Some(&chat), Some(&user))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers[header::CONTENT_TYPE].to_str().unwrap(),
        "application/x-ndjson"
    );
    assert_eq!(response.headers[header::CACHE_CONTROL].to_str().unwrap(), "no-cache");
    assert_eq!(ndjson_messages(&response.body), vec!["Once", " upon", " a time"]);
}

#[tokio::test]
async fn test_chat_falls_back_to_default_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(query_param("key", GEMINI_DEFAULT_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_string(gemini_sse(&["ok"])))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri()).await;
    let user = login(&gw.router, USER_EMAIL, USER_PASSWORD).await;
    let chat = json!({
        "user_id": USER_ID,
        "provider": "Gemini",
        "contents": [{"role": "user", "content": "ping"}]
    });
    let response = send(&gw.router, request(Method::POST, "/api/chat", Some(&chat), Some(&user))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(ndjson_messages(&response.body), vec!["ok"]);
}

#[tokio::test]
async fn test_chat_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let gw = gateway(&server.uri()).await;
    let user = login(&gw.router, USER_EMAIL, USER_PASSWORD).await;
    let contents = json!([{"role": "user", "content": "x"}]);

    let cases = [
        (json!({"provider": "gemini", "contents": contents}), StatusCode::BAD_REQUEST),
        (json!({"user_id": USER_ID, "provider": "gemini"}), StatusCode::BAD_REQUEST),
        (
            json!({"user_id": "someone-else", "provider": "gemini", "contents": contents}),
            StatusCode::FORBIDDEN,
        ),
        (
            json!({"user_id": USER_ID, "provider": "unknown", "contents": contents}),
            StatusCode::NOT_FOUND,
        ),
        (
            json!({"user_id": USER_ID, "provider": "gemini", "contents": contents}),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (body, expected) in cases {
        let response = send(&gw.router, request(Method::POST, "/api/chat", Some(&body), Some(&user))).await;
        assert_eq!(response.status, expected, "body: {body}");
    }

    let response = send(
        &gw.router,
        request(
            Method::POST,
            "/api/chat",
            Some(&json!({"user_id": USER_ID, "provider": "gemini", "contents": contents})),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_chat_without_any_credential_is_forbidden() {
    let gw = gateway("http://127.0.0.1:9").await;
    let admin = login(&gw.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    // 服务商注册后删除其默认密钥
    let provider = gw.context.providers.require("gemini").await.unwrap();
    gw.context
        .vault
        .remove(&ai_gateway::vault::Owner::Default, provider.id, "test")
        .await
        .unwrap();

    let chat = json!({
        "user_id": USER_ID,
        "provider": "gemini",
        "contents": [{"role": "user", "content": "x"}]
    });
    let response = send(&gw.router, request(Method::POST, "/api/chat", Some(&chat), Some(&admin))).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "NO_CREDENTIAL");

    let response = send(
        &gw.router,
        request(Method::GET, "/api/credentials/gemini", None, Some(&admin)),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
