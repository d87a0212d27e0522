//! Command dispatch: one handler per command code, shared by both
//! transports. Handlers run on the reader task of the originating
//! connection; the response always goes out before any fan-out.

use super::connection::{Connection, SendError};
use super::rate_limit::SendRateLimiter;
use super::registry::ConnectionRegistry;
use crate::config::Config;
use application::auth::{demo_user_id, tokens};
use application::chat::acks::AckMessageUseCase;
use application::chat::dtos::SendMessageInput;
use application::chat::read_receipts::{self, MarkReadUseCase};
use application::chat::revoke_message::RevokeMessageUseCase;
use application::chat::send_message::SendMessageUseCase;
use application::chat::sequences::{self, SequenceAllocator};
use application::chat::sync_messages::BatchSyncUseCase;
use application::chat::sync_range::SyncRangeUseCase;
use application::groups;
use chrono::Utc;
use im_core::entities::messages;
use im_core::ids;
use infrastructure::session::{SessionInfo, SessionStore};
use protocol::{wire, CommandId, ErrorCode};
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Dispatcher {
    db: DatabaseConnection,
    registry: Arc<ConnectionRegistry>,
    sessions: SessionStore,
    sequences: Arc<SequenceAllocator>,
    send_limiter: SendRateLimiter,
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(
        db: DatabaseConnection,
        registry: Arc<ConnectionRegistry>,
        sessions: SessionStore,
        sequences: Arc<SequenceAllocator>,
        config: Arc<Config>,
    ) -> Self {
        let send_limiter = SendRateLimiter::new(
            config.rate_limit.enabled,
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        Self {
            db,
            registry,
            sessions,
            sequences,
            send_limiter,
            config,
        }
    }

    /// Evict idle rate-limit buckets; called from a periodic task.
    pub fn purge_stale_rate_buckets(&self, max_idle_secs: f64) {
        self.send_limiter.purge_stale(max_idle_secs);
    }

    /// Route one decoded frame. Auth and Heartbeat pass the gate; everything
    /// else requires a bound user.
    pub async fn dispatch(&self, conn: &Arc<Connection>, command: u16, sequence: u32, body: &[u8]) {
        let Some(command) = CommandId::from_u16(command) else {
            warn!(conn_id = %conn.id(), command, "unknown command");
            return;
        };

        if command == CommandId::AuthReq {
            self.handle_auth(conn, sequence, body).await;
            return;
        }
        if command == CommandId::HeartbeatReq {
            // normally answered inline by the acceptor
            let body = wire::encode(&wire::HeartbeatResponse {
                server_time: ids::now_millis(),
            });
            self.respond(conn, CommandId::HeartbeatRsp, sequence, &body);
            return;
        }

        let Some(user_id) = conn.user_id() else {
            self.reject_unauthenticated(conn, command, sequence);
            return;
        };

        match command {
            CommandId::SendMsgReq => self.handle_send(conn, sequence, body, &user_id).await,
            CommandId::MsgAck => self.handle_ack(conn, body).await,
            CommandId::BatchSyncReq => self.handle_batch_sync(conn, sequence, body, &user_id).await,
            CommandId::SyncRangeReq => self.handle_sync_range(conn, sequence, body, &user_id).await,
            CommandId::ReadReceiptReq => {
                self.handle_read_receipt(conn, sequence, body, &user_id).await
            }
            CommandId::RevokeMsgReq => self.handle_revoke(conn, sequence, body, &user_id).await,
            CommandId::TypingStatusReq => self.handle_typing(body, &user_id).await,
            other => {
                debug!(conn_id = %conn.id(), command = ?other, "unhandled command");
            }
        }
    }

    // ---- auth ----

    async fn handle_auth(&self, conn: &Arc<Connection>, sequence: u32, body: &[u8]) {
        let req: wire::AuthRequest = match wire::decode(body) {
            Ok(req) => req,
            Err(err) => {
                warn!(conn_id = %conn.id(), error = %err, "malformed auth request");
                self.auth_failure(conn, sequence, ErrorCode::InvalidParam, "Malformed request");
                return;
            }
        };

        let user_id = if let Some(uid) = demo_user_id(&req.token) {
            if !self.config.auth.allow_demo_tokens {
                self.auth_failure(conn, sequence, ErrorCode::AuthFailed, "Invalid token");
                return;
            }
            info!(user_id = %uid, "demo token accepted");
            uid.to_string()
        } else {
            match tokens::verify(&req.token, &self.config.auth.jwt_secret) {
                Ok(claims) => claims.user_id,
                Err(err) => {
                    info!(conn_id = %conn.id(), error = %err, "auth rejected");
                    self.auth_failure(conn, sequence, err.wire_code(), "Invalid token");
                    return;
                }
            }
        };

        // Courtesy kick: the displaced peer gets a frame before its socket
        // dies. Best effort; the close inside bind_user is what matters.
        if let Some(old) = self.registry.get_by_user(&user_id) {
            if old.id() != conn.id() {
                let kick = wire::encode(&wire::KickOut {
                    reason: "signed in from another device".to_string(),
                });
                let _ = old.send_frame(CommandId::KickOut, 0, &kick);
            }
        }

        if let Err(err) = self.registry.bind_user(conn.id(), &user_id) {
            warn!(conn_id = %conn.id(), error = %err, "bind failed");
            self.auth_failure(conn, sequence, ErrorCode::Unknown, "Failed to bind connection");
            return;
        }

        // Session hints are advisory; losing them never fails the auth.
        let info = SessionInfo {
            user_id: user_id.clone(),
            platform: req.platform.clone(),
            device_info: req.device_info.clone(),
            conn_id: conn.id().to_string(),
            created_at: Utc::now(),
        };
        let ttl_secs = (self.config.auth.token_expire_hours.max(1) as u64) * 3600;
        if let Err(err) = self.sessions.save_session(conn.id(), &info, ttl_secs).await {
            warn!(error = %err, "failed to save session hint");
        }
        if let Err(err) = self.sessions.save_user_connection(&user_id, conn.id()).await {
            warn!(error = %err, "failed to save user_conn hint");
        }

        let max_seq = match sequences::user_max_seq_hint(&self.db, &user_id).await {
            Ok(max_seq) => max_seq,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to compute max_seq hint");
                0
            }
        };

        info!(user_id = %user_id, conn_id = %conn.id(), "auth success");
        let rsp = wire::AuthResponse {
            error_code: ErrorCode::Success as i32,
            error_msg: "Success".to_string(),
            max_seq,
        };
        self.respond(conn, CommandId::AuthRsp, sequence, &wire::encode(&rsp));
    }

    fn auth_failure(&self, conn: &Arc<Connection>, sequence: u32, code: ErrorCode, msg: &str) {
        let rsp = wire::AuthResponse {
            error_code: code as i32,
            error_msg: msg.to_string(),
            max_seq: 0,
        };
        self.respond(conn, CommandId::AuthRsp, sequence, &wire::encode(&rsp));
    }

    // ---- send ----

    async fn handle_send(&self, conn: &Arc<Connection>, sequence: u32, body: &[u8], user_id: &str) {
        let req: wire::SendMessageRequest = match wire::decode(body) {
            Ok(req) => req,
            Err(_) => {
                self.send_failure(conn, sequence, ErrorCode::InvalidParam, "Malformed request");
                return;
            }
        };
        let Some(info) = req.message else {
            self.send_failure(conn, sequence, ErrorCode::InvalidParam, "Missing message");
            return;
        };

        if info.content.len() > self.config.message.max_length {
            let err = application::AppError::MessageTooLarge;
            self.send_failure(conn, sequence, err.wire_code(), &err.to_string());
            return;
        }
        if !self.send_limiter.check(user_id) {
            let err = application::AppError::RateLimited;
            self.send_failure(conn, sequence, err.wire_code(), &err.to_string());
            return;
        }

        let input = SendMessageInput {
            sender_id: user_id.to_string(),
            conversation_id: non_empty(info.conversation_id),
            client_msg_id: info.client_msg_id,
            receiver_id: non_empty(info.receiver_id),
            group_id: non_empty(info.group_id),
            message_type: info.message_type as i16,
            content: String::from_utf8_lossy(&info.content).into_owned(),
            send_time: info.send_time,
        };

        let outcome = match SendMessageUseCase::execute(&self.db, &self.sequences, input).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "send failed");
                self.send_failure(conn, sequence, err.wire_code(), &err.to_string());
                return;
            }
        };

        let message = &outcome.message;
        let rsp = wire::SendMessageResponse {
            error_code: ErrorCode::Success as i32,
            error_msg: "Success".to_string(),
            server_msg_id: message.server_msg_id.clone(),
            client_msg_id: message.client_msg_id.clone(),
            seq: message.seq,
            server_time: message.server_time,
        };
        self.respond(conn, CommandId::SendMsgRsp, sequence, &wire::encode(&rsp));

        // A collapsed resend already pushed the first time around.
        if outcome.duplicate {
            debug!(
                user_id = %user_id,
                client_msg_id = %message.client_msg_id,
                "duplicate resend collapsed"
            );
            return;
        }

        info!(
            server_msg_id = %message.server_msg_id,
            client_msg_id = %message.client_msg_id,
            seq = message.seq,
            conversation_id = %message.conversation_id,
            sender = %user_id,
            "message stored"
        );
        self.fan_out(message).await;
    }

    fn send_failure(&self, conn: &Arc<Connection>, sequence: u32, code: ErrorCode, msg: &str) {
        let rsp = wire::SendMessageResponse {
            error_code: code as i32,
            error_msg: msg.to_string(),
            ..Default::default()
        };
        self.respond(conn, CommandId::SendMsgRsp, sequence, &wire::encode(&rsp));
    }

    /// Push a stored message to its online recipients. Per-recipient
    /// failures are logged and never fail the send.
    async fn fan_out(&self, message: &messages::Model) {
        let push = wire::PushMessage {
            message: Some(message_info(message, false)),
        };
        let body = wire::encode(&push);

        if let Some(receiver_id) = &message.receiver_id {
            match self
                .registry
                .send_to_user(receiver_id, CommandId::PushMsg, 0, &body)
            {
                Ok(()) | Err(SendError::Offline) => {}
                Err(err) => warn!(receiver = %receiver_id, error = %err, "failed to push message"),
            }
            return;
        }

        let Some(group_id) = &message.group_id else {
            return;
        };
        let members = match groups::active_member_ids(&self.db, group_id).await {
            Ok(members) => members,
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "failed to load group members for fan-out");
                return;
            }
        };

        let mut pushed = 0;
        for member in members {
            if member == message.sender_id {
                continue;
            }
            match self
                .registry
                .send_to_user(&member, CommandId::PushMsg, 0, &body)
            {
                Ok(()) => pushed += 1,
                Err(SendError::Offline) => {}
                Err(err) => warn!(member = %member, error = %err, "failed to push to group member"),
            }
        }
        info!(group_id = %group_id, pushed, "group message pushed");
    }

    // ---- sync ----

    async fn handle_batch_sync(
        &self,
        conn: &Arc<Connection>,
        sequence: u32,
        body: &[u8],
        user_id: &str,
    ) {
        let req: wire::BatchSyncRequest = match wire::decode(body) {
            Ok(req) => req,
            Err(_) => {
                let rsp = wire::BatchSyncResponse {
                    error_code: ErrorCode::InvalidParam as i32,
                    error_msg: "Malformed request".to_string(),
                    ..Default::default()
                };
                self.respond(conn, CommandId::BatchSyncRsp, sequence, &wire::encode(&rsp));
                return;
            }
        };

        let cursors: HashMap<String, i64> = req
            .conversation_states
            .into_iter()
            .map(|state| (state.conversation_id, state.last_seq))
            .collect();

        info!(
            user_id = %user_id,
            cursor_count = cursors.len(),
            "batch sync request"
        );

        let blocks = match BatchSyncUseCase::execute(
            &self.db,
            user_id,
            &cursors,
            req.max_count_per_conversation,
        )
        .await
        {
            Ok(blocks) => blocks,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "batch sync failed");
                let rsp = wire::BatchSyncResponse {
                    error_code: err.wire_code() as i32,
                    error_msg: "Failed to sync messages".to_string(),
                    ..Default::default()
                };
                self.respond(conn, CommandId::BatchSyncRsp, sequence, &wire::encode(&rsp));
                return;
            }
        };

        let mut conversation_messages = Vec::with_capacity(blocks.len());
        let mut total = 0i32;
        for block in blocks {
            let decorated = self.decorate_read_status(&block.messages, user_id).await;
            total += decorated.len() as i32;
            conversation_messages.push(wire::ConversationMessages {
                conversation_id: block.conversation_id,
                messages: decorated,
                max_seq: block.max_seq,
                synced_seq: block.synced_seq,
                has_more: block.has_more,
            });
        }

        let rsp = wire::BatchSyncResponse {
            error_code: ErrorCode::Success as i32,
            error_msg: "Success".to_string(),
            conversation_messages,
            server_time: ids::now_millis(),
            total_message_count: total,
        };
        self.respond(conn, CommandId::BatchSyncRsp, sequence, &wire::encode(&rsp));
    }

    async fn handle_sync_range(
        &self,
        conn: &Arc<Connection>,
        sequence: u32,
        body: &[u8],
        user_id: &str,
    ) {
        let req: wire::SyncRangeRequest = match wire::decode(body) {
            Ok(req) => req,
            Err(_) => return,
        };

        info!(
            user_id = %user_id,
            conversation_id = %req.conversation_id,
            start_seq = req.start_seq,
            end_seq = req.end_seq,
            "range sync request"
        );

        let outcome = match SyncRangeUseCase::execute(
            &self.db,
            &req.conversation_id,
            req.start_seq,
            req.end_seq,
            req.count,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "range sync failed");
                let rsp = wire::SyncRangeResponse {
                    error_code: err.wire_code() as i32,
                    error_msg: "Failed to perform range sync".to_string(),
                    request_id: req.request_id,
                    conversation_id: req.conversation_id,
                    ..Default::default()
                };
                self.respond(conn, CommandId::SyncRangeRsp, sequence, &wire::encode(&rsp));
                return;
            }
        };

        let messages = self.decorate_read_status(&outcome.messages, user_id).await;
        let rsp = wire::SyncRangeResponse {
            error_code: ErrorCode::Success as i32,
            error_msg: "Success".to_string(),
            request_id: req.request_id,
            conversation_id: req.conversation_id,
            messages,
            start_seq: outcome.actual_start,
            end_seq: outcome.actual_end,
            has_more: outcome.has_more,
        };
        self.respond(conn, CommandId::SyncRangeRsp, sequence, &wire::encode(&rsp));
    }

    /// Annotate rows with the requester's read status; the requester's own
    /// messages are implicitly read.
    async fn decorate_read_status(
        &self,
        rows: &[messages::Model],
        user_id: &str,
    ) -> Vec<wire::MessageInfo> {
        let server_msg_ids: Vec<String> =
            rows.iter().map(|m| m.server_msg_id.clone()).collect();
        let status = match read_receipts::read_status(&self.db, &server_msg_ids, user_id).await {
            Ok(status) => status,
            Err(err) => {
                warn!(error = %err, "failed to check read status");
                HashMap::new()
            }
        };

        rows.iter()
            .map(|row| {
                let is_read = row.sender_id == user_id
                    || status.get(&row.server_msg_id).copied().unwrap_or(false);
                message_info(row, is_read)
            })
            .collect()
    }

    // ---- read receipts ----

    async fn handle_read_receipt(
        &self,
        conn: &Arc<Connection>,
        sequence: u32,
        body: &[u8],
        user_id: &str,
    ) {
        let req: wire::ReadReceiptRequest = match wire::decode(body) {
            Ok(req) => req,
            Err(_) => {
                let rsp = wire::ReadReceiptResponse {
                    error_code: ErrorCode::InvalidParam as i32,
                    error_msg: "Malformed request".to_string(),
                    marked_count: 0,
                };
                self.respond(conn, CommandId::ReadReceiptRsp, sequence, &wire::encode(&rsp));
                return;
            }
        };

        let read_time = ids::now_millis();
        let outcome = match MarkReadUseCase::execute(
            &self.db,
            &req.conversation_id,
            req.server_msg_ids,
            user_id,
            read_time,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "read receipt failed");
                let rsp = wire::ReadReceiptResponse {
                    error_code: err.wire_code() as i32,
                    error_msg: "Failed to mark messages as read".to_string(),
                    marked_count: 0,
                };
                self.respond(conn, CommandId::ReadReceiptRsp, sequence, &wire::encode(&rsp));
                return;
            }
        };

        let rsp = wire::ReadReceiptResponse {
            error_code: ErrorCode::Success as i32,
            error_msg: "Success".to_string(),
            marked_count: outcome.marked.len() as i32,
        };
        self.respond(conn, CommandId::ReadReceiptRsp, sequence, &wire::encode(&rsp));

        // Receipt push to the sender, after the reader's response. The
        // reader's own other sessions are not echoed: one session per user.
        if let Some(sender_id) = outcome.notify_sender {
            let push = wire::ReadReceiptPush {
                conversation_id: req.conversation_id,
                server_msg_ids: outcome.marked,
                user_id: user_id.to_string(),
                read_time,
            };
            if let Err(err) =
                self.registry
                    .send_to_user(&sender_id, CommandId::ReadReceiptPush, 0, &wire::encode(&push))
            {
                debug!(sender = %sender_id, error = %err, "receipt push skipped");
            }
        }
    }

    // ---- revoke ----

    async fn handle_revoke(
        &self,
        conn: &Arc<Connection>,
        sequence: u32,
        body: &[u8],
        user_id: &str,
    ) {
        let req: wire::RevokeMessageRequest = match wire::decode(body) {
            Ok(req) => req,
            Err(_) => {
                self.revoke_failure(conn, sequence, ErrorCode::InvalidParam, "Malformed request");
                return;
            }
        };

        let message = match RevokeMessageUseCase::execute(&self.db, &req.server_msg_id, user_id).await
        {
            Ok(message) => message,
            Err(err) => {
                self.revoke_failure(conn, sequence, err.wire_code(), &err.to_string());
                return;
            }
        };

        info!(server_msg_id = %message.server_msg_id, user_id = %user_id, "message revoked");
        let rsp = wire::RevokeMessageResponse {
            error_code: ErrorCode::Success as i32,
            error_msg: "Success".to_string(),
            server_msg_id: message.server_msg_id.clone(),
        };
        self.respond(conn, CommandId::RevokeMsgRsp, sequence, &wire::encode(&rsp));

        // Notify previously online recipients so their UIs can hide the row.
        let push = wire::RevokeMessagePush {
            server_msg_id: message.server_msg_id.clone(),
            conversation_id: message.conversation_id.clone(),
            operator_id: user_id.to_string(),
            revoke_time: ids::now_millis(),
        };
        let body = wire::encode(&push);
        if let Some(receiver_id) = &message.receiver_id {
            let _ = self
                .registry
                .send_to_user(receiver_id, CommandId::RevokeMsgPush, 0, &body);
        } else if let Some(group_id) = &message.group_id {
            if let Ok(members) = groups::active_member_ids(&self.db, group_id).await {
                for member in members {
                    if member != message.sender_id {
                        let _ = self
                            .registry
                            .send_to_user(&member, CommandId::RevokeMsgPush, 0, &body);
                    }
                }
            }
        }
    }

    fn revoke_failure(&self, conn: &Arc<Connection>, sequence: u32, code: ErrorCode, msg: &str) {
        let rsp = wire::RevokeMessageResponse {
            error_code: code as i32,
            error_msg: msg.to_string(),
            server_msg_id: String::new(),
        };
        self.respond(conn, CommandId::RevokeMsgRsp, sequence, &wire::encode(&rsp));
    }

    // ---- acks & typing ----

    async fn handle_ack(&self, conn: &Arc<Connection>, body: &[u8]) {
        let req: wire::MessageAck = match wire::decode(body) {
            Ok(req) => req,
            Err(_) => return,
        };
        debug!(conn_id = %conn.id(), server_msg_id = %req.server_msg_id, seq = req.seq, "message ack");
        if let Err(err) = AckMessageUseCase::execute(&self.db, &req.server_msg_id).await {
            warn!(server_msg_id = %req.server_msg_id, error = %err, "failed to record delivery");
        }
    }

    /// Typing is fire-and-forget: no response, no persistence.
    async fn handle_typing(&self, body: &[u8], user_id: &str) {
        let req: wire::TypingStatusRequest = match wire::decode(body) {
            Ok(req) => req,
            Err(_) => return,
        };

        let push = wire::TypingStatusPush {
            conversation_id: req.conversation_id,
            user_id: user_id.to_string(),
            status: req.status,
        };
        let body = wire::encode(&push);

        if !req.receiver_id.is_empty() {
            let _ = self
                .registry
                .send_to_user(&req.receiver_id, CommandId::TypingStatusPush, 0, &body);
        } else if !req.group_id.is_empty() {
            if let Ok(members) = groups::active_member_ids(&self.db, &req.group_id).await {
                for member in members {
                    if member != user_id {
                        let _ = self
                            .registry
                            .send_to_user(&member, CommandId::TypingStatusPush, 0, &body);
                    }
                }
            }
        }
    }

    // ---- plumbing ----

    /// Reply AUTH_FAILED on the command's response code; commands with no
    /// response are dropped silently.
    fn reject_unauthenticated(&self, conn: &Arc<Connection>, command: CommandId, sequence: u32) {
        debug!(conn_id = %conn.id(), command = ?command, "rejected: not authenticated");
        let body = match command {
            CommandId::SendMsgReq => wire::encode(&wire::SendMessageResponse {
                error_code: ErrorCode::AuthFailed as i32,
                error_msg: "Not authenticated".to_string(),
                ..Default::default()
            }),
            CommandId::BatchSyncReq => wire::encode(&wire::BatchSyncResponse {
                error_code: ErrorCode::AuthFailed as i32,
                error_msg: "Not authenticated".to_string(),
                ..Default::default()
            }),
            CommandId::SyncRangeReq => wire::encode(&wire::SyncRangeResponse {
                error_code: ErrorCode::AuthFailed as i32,
                error_msg: "Not authenticated".to_string(),
                ..Default::default()
            }),
            CommandId::ReadReceiptReq => wire::encode(&wire::ReadReceiptResponse {
                error_code: ErrorCode::AuthFailed as i32,
                error_msg: "Not authenticated".to_string(),
                marked_count: 0,
            }),
            CommandId::RevokeMsgReq => wire::encode(&wire::RevokeMessageResponse {
                error_code: ErrorCode::AuthFailed as i32,
                error_msg: "Not authenticated".to_string(),
                server_msg_id: String::new(),
            }),
            _ => return,
        };
        let Some(rsp_code) = command.response_code() else {
            return;
        };
        self.respond(conn, rsp_code, sequence, &body);
    }

    fn respond(&self, conn: &Arc<Connection>, command: CommandId, sequence: u32, body: &[u8]) {
        if let Err(err) = conn.send_frame(command, sequence, body) {
            warn!(conn_id = %conn.id(), command = ?command, error = %err, "failed to enqueue response");
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Wire view of a stored message.
pub fn message_info(message: &messages::Model, is_read: bool) -> wire::MessageInfo {
    wire::MessageInfo {
        server_msg_id: message.server_msg_id.clone(),
        client_msg_id: message.client_msg_id.clone(),
        conversation_id: message.conversation_id.clone(),
        conversation_type: ids::conversation_type(message.group_id.as_deref().unwrap_or("")),
        sender_id: message.sender_id.clone(),
        receiver_id: message.receiver_id.clone().unwrap_or_default(),
        group_id: message.group_id.clone().unwrap_or_default(),
        seq: message.seq,
        message_type: message.message_type as i32,
        content: message.content.clone().into_bytes(),
        send_time: message.send_time,
        server_time: message.server_time,
        status: message.status as i32,
        is_read,
    }
}
