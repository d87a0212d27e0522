//! WebSocket transport: HTTP upgrade at `/ws`, one prost envelope per binary
//! message.

use super::connection::{
    Connection, ConnectionRx, TransportKind, KEEPALIVE_INTERVAL, WRITE_TIMEOUT, WS_IDLE_TIMEOUT,
};
use super::dispatcher::Dispatcher;
use super::registry::ConnectionRegistry;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_ws::{Message, MessageStream, Session};
use futures_util::StreamExt;
use im_core::ids;
use protocol::{wire, CommandId};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[get("/ws")]
pub async fn websocket_route(
    req: HttpRequest,
    stream: web::Payload,
    registry: web::Data<ConnectionRegistry>,
    dispatcher: web::Data<Dispatcher>,
) -> Result<HttpResponse, Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    let conn_id = ids::new_entity_id();
    info!(conn_id = %conn_id, "new WebSocket connection");

    let (conn, rx) = Connection::new(conn_id, TransportKind::WebSocket);
    registry.add(conn.clone());
    spawn_writer(conn.clone(), rx, session.clone());

    let registry = registry.into_inner();
    let dispatcher = dispatcher.into_inner();
    actix_web::rt::spawn(async move {
        read_loop(conn.clone(), session, msg_stream, dispatcher).await;
        registry.remove(conn.id());
        conn.close();
        debug!(conn_id = %conn.id(), "WebSocket connection closed");
    });

    Ok(response)
}

async fn read_loop(
    conn: Arc<Connection>,
    mut session: Session,
    mut msg_stream: MessageStream,
    dispatcher: Arc<Dispatcher>,
) {
    let mut closed = conn.closed_watch();

    loop {
        tokio::select! {
            _ = closed.changed() => {
                if conn.is_closed() {
                    break;
                }
            }
            next = timeout(WS_IDLE_TIMEOUT, msg_stream.next()) => {
                let msg = match next {
                    Err(_) => {
                        debug!(conn_id = %conn.id(), "WebSocket idle timeout");
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(err))) => {
                        debug!(conn_id = %conn.id(), error = %err, "WebSocket protocol error");
                        break;
                    }
                    Ok(Some(Ok(msg))) => msg,
                };

                match msg {
                    Message::Binary(data) => {
                        conn.touch();
                        // One envelope per transport frame; a bad envelope is
                        // not fatal here, unlike a byte-stream codec error.
                        let envelope: wire::Envelope = match wire::decode(&data) {
                            Ok(envelope) => envelope,
                            Err(err) => {
                                warn!(conn_id = %conn.id(), error = %err, "malformed envelope");
                                continue;
                            }
                        };

                        if envelope.command == u32::from(CommandId::HeartbeatReq) {
                            let body = wire::encode(&wire::HeartbeatResponse {
                                server_time: ids::now_millis(),
                            });
                            let _ = conn.send_frame(CommandId::HeartbeatRsp, envelope.sequence, &body);
                            continue;
                        }

                        dispatcher
                            .dispatch(&conn, envelope.command as u16, envelope.sequence, &envelope.body)
                            .await;
                    }
                    Message::Ping(payload) => {
                        conn.touch();
                        let _ = session.pong(&payload).await;
                    }
                    Message::Pong(_) => {
                        conn.touch();
                    }
                    Message::Close(reason) => {
                        debug!(conn_id = %conn.id(), ?reason, "WebSocket closed by peer");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Writer task: drains the queue into binary frames and keeps the peer warm
/// with periodic pings.
fn spawn_writer(conn: Arc<Connection>, mut rx: ConnectionRx, mut session: Session) {
    actix_web::rt::spawn(async move {
        let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        keepalive.tick().await;

        loop {
            tokio::select! {
                _ = rx.closed.changed() => {
                    if *rx.closed.borrow() {
                        break;
                    }
                }
                maybe = rx.outbound.recv() => {
                    let Some(data) = maybe else { break };
                    match timeout(WRITE_TIMEOUT, session.binary(data)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => {
                            debug!(conn_id = %conn.id(), "WebSocket session gone");
                            break;
                        }
                        Err(_) => {
                            warn!(conn_id = %conn.id(), "WebSocket write deadline exceeded");
                            break;
                        }
                    }
                }
                _ = keepalive.tick() => {
                    if session.ping(b"").await.is_err() {
                        break;
                    }
                }
            }
        }
        conn.close();
        let _ = session.close(None).await;
    });
}
