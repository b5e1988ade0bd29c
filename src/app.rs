/*
 * Responsibility
 * - tracing / panic hook 初期化
 * - Config読み込み → 依存生成 (trust anchor cache / 権限 registry) → Router 組み立て
 * - trust anchor の起動時 warm-up と定期 refresh
 * - axum::serve() で起動
 */
use std::{panic, process};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::services::auth::build_auth_service;
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG があればそれを優先
    // ex: RUST_LOG=info,api_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: プロセスごと落として気付けるようにする
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        env = ?config.app_env,
        addr = %config.addr,
        metadata = %config.auth_metadata_url,
        "starting api gate"
    );

    let state = build_state(&config).await?;

    // 起動後も max_age ごとに取り直す。失敗は次の tick で再試行
    let _refresh = state
        .auth
        .anchors()
        .spawn_background_refresh(config.trust_anchor_max_age);

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub async fn build_state(config: &Config) -> Result<AppState> {
    let auth = build_auth_service(config)?;

    // warm-up: 失敗しても起動は続ける (最初のリクエストで再取得)
    match auth.anchors().refresh_now().await {
        Ok(anchor) => tracing::info!(
            issuer = %anchor.issuer(),
            keys = anchor.key_count(),
            "trust anchor loaded"
        ),
        Err(err) => tracing::error!(error = %err, "initial trust anchor fetch failed"),
    }

    let permissions = api::v1::permissions::registry()?;

    Ok(AppState::new(auth, permissions))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(&state))
        .with_state(state);

    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}
