//! TCP acceptor and per-connection read loop.

use super::connection::{Connection, ConnectionRx, TransportKind, ALIVE_WINDOW, WRITE_TIMEOUT};
use super::dispatcher::Dispatcher;
use super::registry::ConnectionRegistry;
use im_core::ids;
use protocol::{wire, CommandId, FrameCodec};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub struct TcpServer {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl TcpServer {
    pub fn new(registry: Arc<ConnectionRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Accept peers until the listener dies. The caller binds the listener so
    /// a bad port fails startup instead of a background task.
    pub async fn run(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (socket, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    continue;
                }
            };
            let _ = socket.set_nodelay(true);

            let conn_id = ids::new_entity_id();
            info!(conn_id = %conn_id, peer = %peer_addr, "new TCP connection");

            let (read_half, write_half) = socket.into_split();
            let (conn, rx) = Connection::new(conn_id, TransportKind::Tcp);

            self.registry.add(conn.clone());
            spawn_writer(conn.clone(), rx, write_half);

            let server = self.clone();
            tokio::spawn(async move {
                server.read_loop(conn.clone(), read_half).await;
                server.registry.remove(conn.id());
                conn.close();
                debug!(conn_id = %conn.id(), "TCP connection closed");
            });
        }
    }

    async fn read_loop(&self, conn: Arc<Connection>, mut read_half: OwnedReadHalf) {
        let mut codec = FrameCodec::new();
        let mut buf = vec![0u8; 4096];
        let mut closed = conn.closed_watch();

        loop {
            tokio::select! {
                _ = closed.changed() => {
                    if conn.is_closed() {
                        break;
                    }
                }
                read = timeout(ALIVE_WINDOW, read_half.read(&mut buf)) => {
                    let n = match read {
                        Err(_) => {
                            debug!(conn_id = %conn.id(), "read deadline exceeded");
                            break;
                        }
                        Ok(Err(err)) => {
                            debug!(conn_id = %conn.id(), error = %err, "TCP read error");
                            break;
                        }
                        Ok(Ok(0)) => break,
                        Ok(Ok(n)) => n,
                    };

                    conn.touch();

                    // Codec errors are fatal: the stream may be mid-frame and
                    // cannot be resynchronized.
                    let frames = match codec.feed(&buf[..n]) {
                        Ok(frames) => frames,
                        Err(err) => {
                            warn!(conn_id = %conn.id(), error = %err, "dropping connection on codec error");
                            break;
                        }
                    };

                    for frame in frames {
                        if frame.command == u16::from(CommandId::HeartbeatReq) {
                            let body = wire::encode(&wire::HeartbeatResponse {
                                server_time: ids::now_millis(),
                            });
                            let _ = conn.send_frame(CommandId::HeartbeatRsp, frame.sequence, &body);
                            continue;
                        }
                        self.dispatcher
                            .dispatch(&conn, frame.command, frame.sequence, &frame.body)
                            .await;
                    }
                }
            }
        }
    }
}

/// One writer per connection: drains the queue, 10 s deadline per frame,
/// closes everything on error.
fn spawn_writer(conn: Arc<Connection>, mut rx: ConnectionRx, mut write_half: OwnedWriteHalf) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = rx.closed.changed() => {
                    if *rx.closed.borrow() {
                        break;
                    }
                }
                maybe = rx.outbound.recv() => {
                    let Some(data) = maybe else { break };
                    match timeout(WRITE_TIMEOUT, write_half.write_all(&data)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            debug!(conn_id = %conn.id(), error = %err, "TCP write error");
                            break;
                        }
                        Err(_) => {
                            warn!(conn_id = %conn.id(), "TCP write deadline exceeded");
                            break;
                        }
                    }
                }
            }
        }
        let _ = write_half.shutdown().await;
        conn.close();
    });
}
