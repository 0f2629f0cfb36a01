//! Authentication service
//!
//! Login, refresh and session verification on top of the user directory and
//! the token service.

use std::sync::{Arc, OnceLock};

use bcrypt::{DEFAULT_COST, hash, verify};

use crate::auth::jwt::{TokenError, TokenPair, TokenService};
use crate::auth::permissions::UserRole;
use crate::auth::types::{SessionClaims, SessionIdentity};
use crate::auth::users::{UserDirectory, UserRecord};
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: SessionIdentity,
    pub tokens: TokenPair,
}

/// New user for bootstrap
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    tokens: Arc<TokenService>,
    hash_cost: u32,
    /// 未知邮箱时用于比对的哈希，使两条失败路径耗时一致
    dummy_hash: OnceLock<String>,
}

fn invalid_credentials_error() -> GatewayError {
    crate::auth_error!("invalid email or password")
}

impl AuthService {
    /// Create new authentication service
    #[must_use]
    pub fn new(users: Arc<dyn UserDirectory>, tokens: Arc<TokenService>) -> Self {
        Self {
            users,
            tokens,
            hash_cost: DEFAULT_COST,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Override the bcrypt cost used by [`Self::register`]
    #[must_use]
    pub const fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Token service
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Burn one bcrypt verification for an unknown email
    fn verify_against_dummy(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| hash("unused-password", self.hash_cost).unwrap_or_default());
        let _ = verify(password, dummy);
    }

    /// Check email and password and issue both tokens
    pub async fn login(&self, email: &str, password: &str, request_id: &str) -> Result<LoginOutcome> {
        let Some(user) = self.users.find_by_email(email).await? else {
            self.verify_against_dummy(password);
            lwarn!(
                request_id,
                LogStage::Authentication,
                LogComponent::Auth,
                "login",
                "登录失败：用户不存在"
            );
            return Err(invalid_credentials_error());
        };

        // malformed stored hashes count as a mismatch
        if !verify(password, &user.password_hash).unwrap_or(false) {
            lwarn!(
                request_id,
                LogStage::Authentication,
                LogComponent::Auth,
                "login",
                format!("登录失败：密码错误 user_id={}", user.id)
            );
            return Err(invalid_credentials_error());
        }

        let identity = user.identity();
        let tokens = self.tokens.issue(&identity)?;
        linfo!(
            request_id,
            LogStage::Authentication,
            LogComponent::Auth,
            "login",
            format!("✅ 用户登录成功 user_id={} role={}", identity.id, identity.role)
        );
        Ok(LoginOutcome { identity, tokens })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Every failure, including a missing cookie, is a refresh rejection.
    pub fn refresh(&self, refresh_token: Option<&str>, request_id: &str) -> Result<String> {
        let token = refresh_token.ok_or(TokenError::Missing).and_then(|token| {
            self.tokens.refresh(token)
        });

        match token {
            Ok(access) => {
                ldebug!(
                    request_id,
                    LogStage::Authentication,
                    LogComponent::Token,
                    "refresh",
                    "访问令牌已刷新"
                );
                Ok(access)
            }
            Err(err) => {
                lwarn!(
                    request_id,
                    LogStage::Authentication,
                    LogComponent::Token,
                    "refresh",
                    format!("刷新令牌被拒绝: {err}")
                );
                Err(GatewayError::refresh_rejected(match err {
                    TokenError::Missing => "refresh token missing",
                    TokenError::Expired => "refresh token expired",
                    _ => "refresh token invalid",
                }))
            }
        }
    }

    /// Verify the access token of a request
    pub fn verify_session(&self, access_token: Option<&str>) -> Result<SessionClaims> {
        let token = access_token.ok_or(TokenError::Missing)?;
        Ok(self.tokens.verify_access(token)?)
    }

    /// Hash a password with the configured cost
    pub fn hash_password(&self, password: &str) -> Result<String> {
        Ok(hash(password, self.hash_cost)?)
    }

    /// Create a user with a hashed password
    pub async fn register(&self, user: NewUser) -> Result<UserRecord> {
        if user.email.trim().is_empty() || !user.email.contains('@') {
            return Err(GatewayError::validation_field("a valid email is required", "email"));
        }
        if user.password.is_empty() {
            return Err(GatewayError::validation_field("password must not be empty", "password"));
        }

        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: user.name,
            email: user.email,
            password_hash: self.hash_password(&user.password)?,
            role: user.role,
        };
        self.users.create(record).await
    }
}
