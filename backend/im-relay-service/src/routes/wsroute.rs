use crate::state::AppState;
use crate::websocket::{spawn_relay_worker, ConnectionRegistry, SubscriberId};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

// Frame pushed through the registry for this connection
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct OutboundFrame(String);

// The registry dropped this connection's outbound channel
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct Superseded;

// WebSocket Actor
struct WsSession {
    user_id: String,
    subscriber_id: SubscriberId,
    registry: ConnectionRegistry,
    outbound: Option<UnboundedReceiver<String>>,
    inbound: UnboundedSender<Vec<u8>>,
    hb: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let client_timeout = self.client_timeout;
        ctx.run_interval(self.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > client_timeout {
                tracing::warn!(user_id = %act.user_id, "WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn enqueue(&self, raw: Vec<u8>) {
        if self.inbound.send(raw).is_err() {
            tracing::error!(user_id = %self.user_id, "relay worker gone, dropping inbound frame");
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "WebSocket session started");

        self.hb(ctx);

        // Bridge registry pushes into the actor
        if let Some(mut rx) = self.outbound.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(frame) = rx.recv().await {
                    addr.do_send(OutboundFrame(frame));
                }
                // Replaced by a newer connection, or already stopped.
                addr.do_send(Superseded);
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "WebSocket session stopped");

        let registry = self.registry.clone();
        let user_id = self.user_id.clone();
        let subscriber_id = self.subscriber_id;

        actix::spawn(async move {
            registry.unregister(&user_id, subscriber_id).await;
        });
    }
}

impl Handler<OutboundFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<Superseded> for WsSession {
    type Result = ();

    fn handle(&mut self, _msg: Superseded, ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "WebSocket session replaced by a newer connection");
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some("replaced by a newer connection".into()),
        }));
        ctx.stop();
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.enqueue(text.as_bytes().to_vec());
            }
            Ok(ws::Message::Binary(bin)) => {
                self.hb = Instant::now();
                self.enqueue(bin.to_vec());
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(user_id = %self.user_id, "WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                tracing::warn!(user_id = %self.user_id, "fragmented WebSocket frames not supported");
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// Upgrade to a chat connection bound to `user_id`.
#[get("/ws/{user_id}")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if user_id.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().finish());
    }

    let (subscriber_id, outbound) = state.registry.register(&user_id).await;
    let (inbound, _worker) = spawn_relay_worker(
        state.relay.clone(),
        state.registry.clone(),
        user_id.clone(),
        subscriber_id,
    );

    let session = WsSession {
        user_id: user_id.clone(),
        subscriber_id,
        registry: state.registry.clone(),
        outbound: Some(outbound),
        inbound,
        hb: Instant::now(),
        heartbeat_interval: state.config.websocket.heartbeat_interval,
        client_timeout: state.config.websocket.client_timeout,
    };

    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            // Handshake failed; the session never started so clean up here.
            state.registry.unregister(&user_id, subscriber_id).await;
            Err(e)
        }
    }
}
