//! # 认证处理器
//!
//! 登录、刷新、登出与当前会话查询。令牌只通过 Cookie 下发，不出现在响应体中。

use axum::Extension;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use super::parse_json;
use crate::auth::UserRole;
use crate::auth::cookies::{
    ACCESS_COOKIE, REFRESH_COOKIE, clear_cookie, cookie_value, session_cookie,
};
use crate::error::Result;
use crate::server::AppState;
use crate::server::middleware::{AuthContext, RequestId};
use crate::server::response;

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 会话用户信息
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: SessionUser,
    pub access_expires_in: i64,
    pub refresh_expires_in: i64,
}

/// 刷新响应
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_expires_in: i64,
}

/// 当前会话
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: SessionUser,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// 登录
pub async fn login(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Response)> {
    let request: LoginRequest = parse_json(&body)?;
    let outcome = state
        .auth
        .login(&request.email, &request.password, &request_id)
        .await?;

    let secure = state.config.server.secure_cookies;
    let jar = jar
        .add(session_cookie(
            ACCESS_COOKIE,
            &outcome.tokens.access_token,
            outcome.tokens.access_expires_in,
            secure,
        ))
        .add(session_cookie(
            REFRESH_COOKIE,
            &outcome.tokens.refresh_token,
            outcome.tokens.refresh_expires_in,
            secure,
        ));

    let identity = outcome.identity;
    let body = LoginResponse {
        user: SessionUser {
            id: identity.id,
            name: identity.name,
            email: identity.email,
            role: identity.role,
        },
        access_expires_in: outcome.tokens.access_expires_in,
        refresh_expires_in: outcome.tokens.refresh_expires_in,
    };
    Ok((jar, response::success(body)))
}

/// 用刷新令牌换取新的访问令牌；失败时不清除任何 Cookie
pub async fn refresh(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    jar: CookieJar,
) -> Result<(CookieJar, Response)> {
    let refresh_token = cookie_value(&jar, REFRESH_COOKIE);
    let access_token = state.auth.refresh(refresh_token.as_deref(), &request_id)?;

    let ttl = state.auth.tokens().access_ttl_seconds();
    let jar = jar.add(session_cookie(
        ACCESS_COOKIE,
        &access_token,
        ttl,
        state.config.server.secure_cookies,
    ));
    Ok((
        jar,
        response::success(RefreshResponse {
            access_expires_in: ttl,
        }),
    ))
}

/// 登出：清除两个 Cookie。令牌本身无状态，不做服务端吊销。
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Response) {
    let secure = state.config.server.secure_cookies;
    let jar = jar
        .add(clear_cookie(ACCESS_COOKIE, secure))
        .add(clear_cookie(REFRESH_COOKIE, secure));
    (jar, response::success_without_data("logged out"))
}

/// 当前会话信息
pub async fn me(session: AuthContext) -> Response {
    let claims = session.claims();
    response::success(MeResponse {
        user: SessionUser {
            id: claims.sub.clone(),
            name: claims.name.clone(),
            email: claims.email.clone(),
            role: claims.role,
        },
        issued_at: claims.iat,
        expires_at: claims.exp,
    })
}
