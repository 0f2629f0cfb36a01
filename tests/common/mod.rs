//! # 集成测试公共工具
//!
//! 内存存储 + 真实 HTTP 上游客户端（指向 wiremock）组装的网关，
//! 通过 `tower::ServiceExt::oneshot` 直接驱动路由。

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use ai_gateway::auth::users::{UserDirectory, UserRecord};
use ai_gateway::auth::{SessionIdentity, UserRole};
use ai_gateway::config::{AppConfig, EndpointConfig};
use ai_gateway::provider::ProviderKind;
use ai_gateway::relay::HttpUpstream;
use ai_gateway::server::create_router;
use ai_gateway::server::AppState;
use ai_gateway::{AppContext, SecurityConfig, StoreSet};
use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-pass";
pub const USER_EMAIL: &str = "ada@example.com";
pub const USER_PASSWORD: &str = "ada-pass";
pub const ADMIN_ID: &str = "9a1e4c3b-0000-4000-8000-000000000001";
pub const USER_ID: &str = "9a1e4c3b-0000-4000-8000-000000000002";
pub const GEMINI_DEFAULT_KEY: &str = "AIza-default-gemini-key";

static INIT: Once = Once::new();

/// 初始化测试日志
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn security() -> SecurityConfig {
    SecurityConfig::new(
        "access-secret-for-integration-tests",
        "refresh-secret-for-integration-tests",
        &"5a".repeat(32),
    )
    .expect("valid security config")
}

/// 所有服务商都指向同一个 mock 上游
pub fn config_for(upstream_base: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.upstream.gemini = EndpointConfig {
        base_url: upstream_base.to_string(),
        model: "gemini-test".to_string(),
    };
    config.upstream.mistral = EndpointConfig {
        base_url: upstream_base.to_string(),
        model: "mistral-test".to_string(),
    };
    config.upstream.openai = EndpointConfig {
        base_url: upstream_base.to_string(),
        model: "gpt-test".to_string(),
    };
    config.upstream.channel_capacity = 4;
    config
}

pub struct TestGateway {
    pub context: Arc<AppContext>,
    pub router: Router,
}

async fn seed_user(stores: &StoreSet, id: &str, email: &str, password: &str, role: UserRole) {
    stores
        .users
        .create(UserRecord {
            id: id.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            email: email.to_string(),
            password_hash: bcrypt::hash(password, 4).unwrap(),
            role,
        })
        .await
        .unwrap();
}

/// 组装网关：一个管理员、一个普通用户、一个带默认密钥的 gemini 服务商
pub async fn gateway(upstream_base: &str) -> TestGateway {
    init_test_env();

    let stores = StoreSet::memory();
    seed_user(&stores, ADMIN_ID, ADMIN_EMAIL, ADMIN_PASSWORD, UserRole::Admin).await;
    seed_user(&stores, USER_ID, USER_EMAIL, USER_PASSWORD, UserRole::User).await;

    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();
    let context = Arc::new(AppContext::new(
        Arc::new(config_for(upstream_base)),
        &security(),
        stores,
        Arc::new(upstream),
    ));
    context
        .providers
        .register("gemini", ProviderKind::Gemini, GEMINI_DEFAULT_KEY, "test-seed")
        .await
        .unwrap();

    let router = create_router(AppState::new(Arc::clone(&context)));
    TestGateway { context, router }
}

pub fn user_identity() -> SessionIdentity {
    SessionIdentity {
        id: USER_ID.to_string(),
        name: "ada".to_string(),
        email: USER_EMAIL.to_string(),
        role: UserRole::User,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn error_code(&self) -> String {
        self.json()["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    pub fn error_message(&self) -> String {
        self.json()["error"]["message"].as_str().unwrap_or_default().to_string()
    }

    /// 全部 `Set-Cookie` 头
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// 某个 Cookie 的 `Set-Cookie` 头
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies()
            .into_iter()
            .find(|cookie| cookie.starts_with(&prefix))
    }

    /// 某个 Cookie 的值
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        self.set_cookie(name).and_then(|cookie| {
            cookie
                .split(';')
                .next()
                .and_then(|pair| pair.split_once('='))
                .map(|(_, value)| value.to_string())
        })
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn request(method: Method, uri: &str, body: Option<&Value>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// 登录并返回可直接放入 `Cookie` 头的字符串
pub async fn login(router: &Router, email: &str, password: &str) -> String {
    let body = serde_json::json!({"email": email, "password": password});
    let response = send(router, request(Method::POST, "/api/auth/login", Some(&body), None)).await;
    assert_eq!(response.status, StatusCode::OK, "login failed: {:?}", response.body);

    let access = response.cookie_value("access").expect("access cookie");
    let refresh = response.cookie_value("refresh").expect("refresh cookie");
    format!("access={access}; refresh={refresh}")
}
