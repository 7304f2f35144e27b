pub mod handlers;
pub mod models;

use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::dns::blocking::BlockingControl;

use handlers::AppState;

/// 构建控制接口的路由
pub fn router(blocking: Arc<BlockingControl>) -> axum::Router {
    axum::Router::new()
        .route("/api/blocking/enable", get(handlers::blocking_enable))
        .route("/api/blocking/disable", get(handlers::blocking_disable))
        .route("/api/blocking/status", get(handlers::blocking_status))
        .layer(CorsLayer::permissive())
        .with_state(AppState { blocking })
}

/// 启动控制接口服务
pub fn start(config: &ApiConfig, blocking: Arc<BlockingControl>) -> Result<JoinHandle<()>> {
    let app = router(blocking);
    let bind_addr = format!("{}:{}", config.listen, config.port);
    info!(addr = bind_addr.as_str(), "API server starting");

    let handle = tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(addr = bind_addr.as_str(), error = %e, "API server bind failed");
                return;
            }
        };
        info!(addr = bind_addr.as_str(), "API server listening");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    Ok(handle)
}
