use actix_web::web;

pub mod chats;
pub mod health;
pub mod history;
pub mod wsroute;

/// Register every HTTP and WebSocket route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(wsroute::ws_handler)
        .service(history::get_history)
        .service(chats::list_chats)
        .service(health::health)
        .service(health::prometheus_metrics);
}
