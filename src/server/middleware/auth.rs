//! # 认证中间件
//!
//! 两段式门禁：
//! 1. `require_session`：读取 `access` Cookie 并校验访问令牌，失败返回 401；
//!    成功后把会话声明注入请求扩展
//! 2. `require_admin`：要求会话角色为管理员，失败返回 403

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::request_id::RequestId;
use crate::auth::cookies::{ACCESS_COOKIE, read_cookie};
use crate::auth::{SessionClaims, UserRole};
use crate::error::GatewayError;
use crate::logging::{LogComponent, LogStage};
use crate::lwarn;
use crate::server::AppState;

/// 包含认证用户信息的上下文
#[derive(Debug, Clone)]
pub struct AuthContext {
    claims: Arc<SessionClaims>,
}

impl AuthContext {
    #[must_use]
    pub fn new(claims: SessionClaims) -> Self {
        Self {
            claims: Arc::new(claims),
        }
    }

    /// 会话主体（用户 ID）
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    #[must_use]
    pub fn role(&self) -> UserRole {
        self.claims.role
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.claims.role.is_admin()
    }

    #[must_use]
    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    /// 要求会话角色属于给定集合
    pub fn require_any(&self, roles: &[UserRole]) -> Result<(), GatewayError> {
        if roles.contains(&self.claims.role) {
            Ok(())
        } else {
            Err(GatewayError::authorization(format!(
                "role {} is not permitted for this operation",
                self.claims.role
            )))
        }
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| GatewayError::authentication("session required"))
    }
}

fn request_id_of(request: &Request) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| "-".to_string(), ToString::to_string)
}

/// 会话校验中间件
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = read_cookie(request.headers(), ACCESS_COOKIE);
    let claims = state.auth.verify_session(token.as_deref()).map_err(|err| {
        lwarn!(
            request_id_of(&request),
            LogStage::Authentication,
            LogComponent::Auth,
            "require_session",
            format!(
                "会话校验失败 path={}: {err} ({})",
                request.uri().path(),
                std::error::Error::source(&err).map(ToString::to_string).unwrap_or_default()
            )
        );
        err
    })?;

    request.extensions_mut().insert(AuthContext::new(claims));
    Ok(next.run(request).await)
}

/// 管理员校验中间件，须位于 [`require_session`] 之内
pub async fn require_admin(request: Request, next: Next) -> Result<Response, GatewayError> {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| GatewayError::authentication("session required"))?;

    if let Err(err) = context.require_any(&[UserRole::Admin]) {
        lwarn!(
            request_id_of(&request),
            LogStage::Authorization,
            LogComponent::Auth,
            "require_admin",
            format!("权限不足 user_id={} path={}", context.user_id(), request.uri().path())
        );
        return Err(err);
    }
    Ok(next.run(request).await)
}
