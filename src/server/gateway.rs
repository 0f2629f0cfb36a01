//! # HTTP 服务器
//!
//! Axum 路由组装、CORS、请求追踪与优雅停机。

use std::ops::Deref;
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::system::ping_handler;
use super::middleware::request_id_middleware;
use super::routes::create_routes;
use crate::app::AppContext;
use crate::config::ServerConfig;
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{linfo, lwarn};

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    #[must_use]
    pub const fn context_arc(&self) -> &Arc<AppContext> {
        &self.context
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 网关 HTTP 服务器
pub struct GatewayServer {
    config: ServerConfig,
    router: Router,
}

impl GatewayServer {
    /// 创建服务器
    #[must_use]
    pub fn new(context: Arc<AppContext>) -> Self {
        let config = context.config.server.clone();
        let router = create_router(AppState::new(context));
        Self { config, router }
    }

    /// 路由副本，测试中可直接 `oneshot`
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 启动服务器，收到 Ctrl-C 后停止接受新连接
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr).await?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            format!("🌐 Gateway listening on {addr}")
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::internal_with_source("server error", e))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "server_stop",
            "Gateway stopped"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        lwarn!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "shutdown_signal",
            format!("Failed to listen for shutdown signal: {e}")
        );
        std::future::pending::<()>().await;
    }
}

/// Cookie 认证需要 `allow_credentials`，因此来源必须显式列出；
/// 配置为 `*` 时回显请求来源。
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = if config.cors_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    lwarn!(
                        "system",
                        LogStage::Startup,
                        LogComponent::ServerSetup,
                        "cors_config",
                        format!("Ignoring invalid CORS origin '{origin}': {e}")
                    );
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
}

/// 组装完整路由：`{api_prefix}/...` 与 `/ping`
pub fn create_router(state: AppState) -> Router {
    let config = state.config.server.clone();
    let api = create_routes(state);

    let prefix = config.api_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    app.route("/ping", get(ping_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config)),
        )
        .layer(axum::middleware::from_fn(request_id_middleware))
}
