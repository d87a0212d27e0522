use im_core::entities::messages;

/// Input to the send pipeline, already decoded from the wire.
#[derive(Debug, Clone)]
pub struct SendMessageInput {
    pub sender_id: String,
    /// Used verbatim when the client supplies one; derived otherwise.
    pub conversation_id: Option<String>,
    pub client_msg_id: String,
    pub receiver_id: Option<String>,
    pub group_id: Option<String>,
    pub message_type: i16,
    pub content: String,
    /// Client clock, advisory.
    pub send_time: i64,
}

/// Result of a send. `duplicate` marks an idempotent resend collapsed onto
/// the original row; callers must not push or re-notify for those.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: messages::Model,
    pub duplicate: bool,
}

/// One conversation's slice of a batch sync response.
#[derive(Debug, Clone)]
pub struct ConversationSyncBlock {
    pub conversation_id: String,
    pub messages: Vec<messages::Model>,
    pub max_seq: i64,
    pub synced_seq: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct RangeSyncOutcome {
    pub messages: Vec<messages::Model>,
    pub actual_start: i64,
    pub actual_end: i64,
    pub has_more: bool,
}

/// Result of marking messages read.
#[derive(Debug, Clone)]
pub struct ReceiptOutcome {
    /// server_msg_ids actually covered by this receipt.
    pub marked: Vec<String>,
    /// Sender of the marked messages, when different from the reader.
    pub notify_sender: Option<String>,
    pub read_time: i64,
}
