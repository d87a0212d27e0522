//! Body payloads exchanged over both transports, prost-encoded.
//!
//! The WebSocket transport wraps every payload in an [`Envelope`]; the TCP
//! transport carries the same payload bytes inside a [`crate::frame::Frame`].

use prost::Message;

/// Canonical result codes surfaced on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    Unknown = 1,
    InvalidParam = 2,
    AuthFailed = 3,
    TokenExpired = 4,
    PermissionDenied = 5,
    UserNotExist = 6,
    MessageTooLarge = 7,
    SendTooFast = 8,
    ConversationNotExist = 9,
}

/// Application-message wrapper used on the WebSocket transport.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(uint32, tag = "1")]
    pub command: u32,
    #[prost(uint32, tag = "2")]
    pub sequence: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub body: Vec<u8>,
    #[prost(int64, tag = "4")]
    pub timestamp: i64,
}

// ---- connection & auth ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthRequest {
    #[prost(string, tag = "1")]
    pub user_id: String,
    #[prost(string, tag = "2")]
    pub token: String,
    #[prost(string, tag = "3")]
    pub platform: String,
    #[prost(string, tag = "4")]
    pub device_info: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthResponse {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub error_code: i32,
    #[prost(string, tag = "2")]
    pub error_msg: String,
    #[prost(int64, tag = "3")]
    pub max_seq: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatResponse {
    #[prost(int64, tag = "1")]
    pub server_time: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KickOut {
    #[prost(string, tag = "1")]
    pub reason: String,
}

// ---- messaging ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageInfo {
    #[prost(string, tag = "1")]
    pub server_msg_id: String,
    #[prost(string, tag = "2")]
    pub client_msg_id: String,
    #[prost(string, tag = "3")]
    pub conversation_id: String,
    /// 1 = single chat, 2 = group chat.
    #[prost(int32, tag = "4")]
    pub conversation_type: i32,
    #[prost(string, tag = "5")]
    pub sender_id: String,
    #[prost(string, tag = "6")]
    pub receiver_id: String,
    #[prost(string, tag = "7")]
    pub group_id: String,
    #[prost(int64, tag = "8")]
    pub seq: i64,
    #[prost(int32, tag = "9")]
    pub message_type: i32,
    #[prost(bytes = "vec", tag = "10")]
    pub content: Vec<u8>,
    /// Client clock, advisory only.
    #[prost(int64, tag = "11")]
    pub send_time: i64,
    /// Authoritative server clock, unix millis.
    #[prost(int64, tag = "12")]
    pub server_time: i64,
    #[prost(int32, tag = "13")]
    pub status: i32,
    #[prost(bool, tag = "14")]
    pub is_read: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SendMessageRequest {
    #[prost(message, optional, tag = "1")]
    pub message: Option<MessageInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SendMessageResponse {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub error_code: i32,
    #[prost(string, tag = "2")]
    pub error_msg: String,
    #[prost(string, tag = "3")]
    pub server_msg_id: String,
    #[prost(string, tag = "4")]
    pub client_msg_id: String,
    #[prost(int64, tag = "5")]
    pub seq: i64,
    #[prost(int64, tag = "6")]
    pub server_time: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushMessage {
    #[prost(message, optional, tag = "1")]
    pub message: Option<MessageInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageAck {
    #[prost(string, tag = "1")]
    pub server_msg_id: String,
    #[prost(string, tag = "2")]
    pub conversation_id: String,
    #[prost(int64, tag = "3")]
    pub seq: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RevokeMessageRequest {
    #[prost(string, tag = "1")]
    pub server_msg_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RevokeMessageResponse {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub error_code: i32,
    #[prost(string, tag = "2")]
    pub error_msg: String,
    #[prost(string, tag = "3")]
    pub server_msg_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RevokeMessagePush {
    #[prost(string, tag = "1")]
    pub server_msg_id: String,
    #[prost(string, tag = "2")]
    pub conversation_id: String,
    #[prost(string, tag = "3")]
    pub operator_id: String,
    #[prost(int64, tag = "4")]
    pub revoke_time: i64,
}

// ---- sync ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConversationState {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(int64, tag = "2")]
    pub last_seq: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchSyncRequest {
    #[prost(message, repeated, tag = "1")]
    pub conversation_states: Vec<ConversationState>,
    #[prost(int32, tag = "2")]
    pub max_count_per_conversation: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConversationMessages {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(message, repeated, tag = "2")]
    pub messages: Vec<MessageInfo>,
    #[prost(int64, tag = "3")]
    pub max_seq: i64,
    #[prost(int64, tag = "4")]
    pub synced_seq: i64,
    #[prost(bool, tag = "5")]
    pub has_more: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchSyncResponse {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub error_code: i32,
    #[prost(string, tag = "2")]
    pub error_msg: String,
    #[prost(message, repeated, tag = "3")]
    pub conversation_messages: Vec<ConversationMessages>,
    #[prost(int64, tag = "4")]
    pub server_time: i64,
    #[prost(int32, tag = "5")]
    pub total_message_count: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncRangeRequest {
    #[prost(string, tag = "1")]
    pub request_id: String,
    #[prost(string, tag = "2")]
    pub conversation_id: String,
    #[prost(int64, tag = "3")]
    pub start_seq: i64,
    #[prost(int64, tag = "4")]
    pub end_seq: i64,
    #[prost(int32, tag = "5")]
    pub count: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncRangeResponse {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub error_code: i32,
    #[prost(string, tag = "2")]
    pub error_msg: String,
    #[prost(string, tag = "3")]
    pub request_id: String,
    #[prost(string, tag = "4")]
    pub conversation_id: String,
    #[prost(message, repeated, tag = "5")]
    pub messages: Vec<MessageInfo>,
    /// First seq actually present in `messages`.
    #[prost(int64, tag = "6")]
    pub start_seq: i64,
    /// Last seq actually present in `messages`.
    #[prost(int64, tag = "7")]
    pub end_seq: i64,
    #[prost(bool, tag = "8")]
    pub has_more: bool,
}

// ---- read receipts & typing ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadReceiptRequest {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    /// Empty means "everything unread in this conversation".
    #[prost(string, repeated, tag = "2")]
    pub server_msg_ids: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadReceiptResponse {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub error_code: i32,
    #[prost(string, tag = "2")]
    pub error_msg: String,
    #[prost(int32, tag = "3")]
    pub marked_count: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadReceiptPush {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(string, repeated, tag = "2")]
    pub server_msg_ids: Vec<String>,
    #[prost(string, tag = "3")]
    pub user_id: String,
    #[prost(int64, tag = "4")]
    pub read_time: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypingStatusRequest {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(string, tag = "2")]
    pub receiver_id: String,
    #[prost(string, tag = "3")]
    pub group_id: String,
    #[prost(int32, tag = "4")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypingStatusPush {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
    #[prost(int32, tag = "3")]
    pub status: i32,
}

/// Encode any wire message to its byte form.
pub fn encode<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}

/// Decode a wire message from bytes.
pub fn decode<M: Message + Default>(bytes: &[u8]) -> Result<M, prost::DecodeError> {
    M::decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips() {
        let env = Envelope {
            command: 0x20,
            sequence: 9,
            body: vec![1, 2, 3],
            timestamp: 1_700_000_000_000,
        };
        let decoded: Envelope = decode(&encode(&env)).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn send_request_carries_nested_message() {
        let req = SendMessageRequest {
            message: Some(MessageInfo {
                client_msg_id: "cm1".into(),
                receiver_id: "bob".into(),
                content: b"hi".to_vec(),
                message_type: 1,
                ..Default::default()
            }),
        };
        let decoded: SendMessageRequest = decode(&encode(&req)).unwrap();
        let msg = decoded.message.unwrap();
        assert_eq!(msg.client_msg_id, "cm1");
        assert_eq!(msg.receiver_id, "bob");
        assert_eq!(msg.content, b"hi");
    }

    #[test]
    fn error_code_survives_enumeration_field() {
        let rsp = AuthResponse {
            error_code: ErrorCode::AuthFailed as i32,
            error_msg: "Invalid token".into(),
            max_seq: 0,
        };
        let decoded: AuthResponse = decode(&encode(&rsp)).unwrap();
        assert_eq!(decoded.error_code, ErrorCode::AuthFailed as i32);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        // A newer peer may add fields; decoding must not fail.
        let env = Envelope {
            command: 1,
            sequence: 1,
            body: encode(&HeartbeatResponse { server_time: 42 }),
            timestamp: 0,
        };
        let decoded: HeartbeatResponse = decode(&env.body).unwrap();
        assert_eq!(decoded.server_time, 42);
    }
}
