use actix_web::{web, App, HttpServer};
use im_relay_service::{
    config, db, error, logging,
    redis_client::RedisClient,
    routes,
    services::{ConversationCache, HistoryStore, PgHistoryStore, RedisConversationCache},
    state::AppState,
    websocket::ConnectionRegistry,
};
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    let cfg = Arc::new(config::Config::from_env()?);
    logging::init_tracing(cfg.log_format);

    let db = db::init_pool(&cfg.database_url, cfg.db_max_connections)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    let redis = RedisClient::from_url(&cfg.redis_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("redis: {e}")))?;

    let history: Arc<dyn HistoryStore> = Arc::new(PgHistoryStore::new(db));
    let cache: Arc<dyn ConversationCache> = Arc::new(RedisConversationCache::new(
        redis,
        cfg.last_chat_key_prefix.clone(),
    ));
    let state = AppState::new(cfg.clone(), history, cache, ConnectionRegistry::new());

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting im-relay-service");

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))
}
