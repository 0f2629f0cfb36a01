//! # 路由配置
//!
//! 公开路由：登录、刷新、登出。其余路由须先通过会话校验，
//! 创建服务商另需管理员角色。

use axum::Router;
use axum::handler::Handler;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};

use super::handlers::{auth, chat, credentials, providers};
use super::middleware::{require_admin, require_session};
use super::gateway::AppState;

/// 创建所有 API 路由（不含前缀）
pub fn create_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/credentials",
            post(credentials::create_credential).put(credentials::update_credential),
        )
        .route(
            "/credentials/{provider}",
            get(credentials::get_credential).delete(credentials::delete_credential),
        )
        .route(
            "/providers",
            get(providers::list_providers)
                .post(providers::create_provider.layer(from_fn(require_admin))),
        )
        .route("/chat", post(chat::chat))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .merge(protected)
        .with_state(state)
}
