//! Per-peer connection state shared by both transports.
//!
//! A connection owns nothing upward: it holds the outbound queue and
//! liveness clock, and the transport modules attach the socket-specific
//! writer task. Closing only flips the watch flag; the writer and reader
//! tasks observe it and release the socket themselves.

use bytes::Bytes;
use im_core::ids;
use protocol::{frame, wire, CommandId};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Outbound queue depth per peer; enqueue never blocks.
pub const SEND_QUEUE_CAPACITY: usize = 256;
/// A peer silent longer than this is considered dead.
pub const ALIVE_WINDOW: Duration = Duration::from_secs(90);
/// Per-frame write deadline.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// WebSocket keepalive ping interval.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// WebSocket peers idle past this are dropped.
pub const WS_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    WebSocket,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("send buffer full")]
    BufferFull,
    #[error("user not online")]
    Offline,
}

/// Receiver ends handed to the transport's writer task.
pub struct ConnectionRx {
    pub outbound: mpsc::Receiver<Bytes>,
    pub closed: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct Connection {
    id: String,
    kind: TransportKind,
    user_id: Mutex<Option<String>>,
    outbound: mpsc::Sender<Bytes>,
    closed: watch::Sender<bool>,
    last_active: Mutex<Instant>,
}

impl Connection {
    pub fn new(id: String, kind: TransportKind) -> (Arc<Self>, ConnectionRx) {
        let (outbound_tx, outbound_rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let (closed_tx, closed_rx) = watch::channel(false);
        let conn = Arc::new(Self {
            id,
            kind,
            user_id: Mutex::new(None),
            outbound: outbound_tx,
            closed: closed_tx,
            last_active: Mutex::new(Instant::now()),
        });
        (
            conn,
            ConnectionRx {
                outbound: outbound_rx,
                closed: closed_rx,
            },
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.lock().expect("user_id lock poisoned").clone()
    }

    pub fn set_user_id(&self, user_id: &str) {
        *self.user_id.lock().expect("user_id lock poisoned") = Some(user_id.to_string());
    }

    /// Enqueue raw bytes, never blocking: a full queue is the caller's
    /// problem, not the pipeline's.
    pub fn send(&self, data: Bytes) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        self.outbound.try_send(data).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendError::BufferFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Encode `cmd|seq|body` for this connection's transport and enqueue it.
    pub fn send_frame(&self, command: CommandId, sequence: u32, body: &[u8]) -> Result<(), SendError> {
        let data = match self.kind {
            TransportKind::Tcp => frame::encode_frame(command.into(), sequence, body),
            TransportKind::WebSocket => {
                let envelope = wire::Envelope {
                    command: command.into(),
                    sequence,
                    body: body.to_vec(),
                    timestamp: ids::now_millis(),
                };
                Bytes::from(wire::encode(&envelope))
            }
        };
        self.send(data)
    }

    /// Idempotent; wakes the writer and reader tasks.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub fn closed_watch(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    pub fn alive(&self) -> bool {
        !self.is_closed()
            && self
                .last_active
                .lock()
                .expect("last_active lock poisoned")
                .elapsed()
                < ALIVE_WINDOW
    }

    pub fn touch(&self) {
        *self.last_active.lock().expect("last_active lock poisoned") = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_conn() -> (Arc<Connection>, ConnectionRx) {
        Connection::new("conn-1".to_string(), TransportKind::Tcp)
    }

    #[tokio::test]
    async fn fresh_connection_is_alive_and_unbound() {
        let (conn, _rx) = tcp_conn();
        assert!(conn.alive());
        assert_eq!(conn.kind(), TransportKind::Tcp);
        assert_eq!(conn.user_id(), None);

        conn.set_user_id("alice");
        assert_eq!(conn.user_id(), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_kills_alive() {
        let (conn, _rx) = tcp_conn();
        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert!(!conn.alive());
        assert_eq!(conn.send(Bytes::from_static(b"x")), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let (conn, _rx) = tcp_conn();
        for _ in 0..SEND_QUEUE_CAPACITY {
            conn.send(Bytes::from_static(b"x")).unwrap();
        }
        assert_eq!(
            conn.send(Bytes::from_static(b"overflow")),
            Err(SendError::BufferFull)
        );
    }

    #[tokio::test]
    async fn send_frame_encodes_per_transport() {
        let (tcp, mut tcp_rx) = Connection::new("t".into(), TransportKind::Tcp);
        tcp.send_frame(CommandId::HeartbeatRsp, 5, b"").unwrap();
        let data = tcp_rx.outbound.recv().await.unwrap();
        assert_eq!(&data[..2], &protocol::frame::MAGIC.to_be_bytes());

        let (ws, mut ws_rx) = Connection::new("w".into(), TransportKind::WebSocket);
        ws.send_frame(CommandId::HeartbeatRsp, 5, b"").unwrap();
        let data = ws_rx.outbound.recv().await.unwrap();
        let envelope: wire::Envelope = wire::decode(&data).unwrap();
        assert_eq!(envelope.command, CommandId::HeartbeatRsp as u32);
        assert_eq!(envelope.sequence, 5);
    }

    #[tokio::test]
    async fn close_wakes_the_watch() {
        let (conn, rx) = tcp_conn();
        let mut closed = rx.closed;
        assert!(!*closed.borrow());
        conn.close();
        closed.changed().await.unwrap();
        assert!(*closed.borrow());
    }
}
