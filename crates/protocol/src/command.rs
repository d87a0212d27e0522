/// Command codes carried in the frame header (TCP) or envelope (WebSocket).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandId {
    ConnectReq = 0x01,
    ConnectRsp = 0x02,
    HeartbeatReq = 0x05,
    HeartbeatRsp = 0x06,

    AuthReq = 0x10,
    AuthRsp = 0x11,
    KickOut = 0x12,

    SendMsgReq = 0x20,
    SendMsgRsp = 0x21,
    PushMsg = 0x22,
    MsgAck = 0x23,
    RevokeMsgReq = 0x26,
    RevokeMsgRsp = 0x27,
    RevokeMsgPush = 0x28,

    BatchSyncReq = 0x30,
    BatchSyncRsp = 0x31,
    SyncRangeReq = 0x33,
    SyncRangeRsp = 0x34,

    ReadReceiptReq = 0x40,
    ReadReceiptRsp = 0x41,
    ReadReceiptPush = 0x42,

    TypingStatusReq = 0x50,
    TypingStatusPush = 0x51,
}

impl CommandId {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0x01 => Self::ConnectReq,
            0x02 => Self::ConnectRsp,
            0x05 => Self::HeartbeatReq,
            0x06 => Self::HeartbeatRsp,
            0x10 => Self::AuthReq,
            0x11 => Self::AuthRsp,
            0x12 => Self::KickOut,
            0x20 => Self::SendMsgReq,
            0x21 => Self::SendMsgRsp,
            0x22 => Self::PushMsg,
            0x23 => Self::MsgAck,
            0x26 => Self::RevokeMsgReq,
            0x27 => Self::RevokeMsgRsp,
            0x28 => Self::RevokeMsgPush,
            0x30 => Self::BatchSyncReq,
            0x31 => Self::BatchSyncRsp,
            0x33 => Self::SyncRangeReq,
            0x34 => Self::SyncRangeRsp,
            0x40 => Self::ReadReceiptReq,
            0x41 => Self::ReadReceiptRsp,
            0x42 => Self::ReadReceiptPush,
            0x50 => Self::TypingStatusReq,
            0x51 => Self::TypingStatusPush,
            _ => return None,
        })
    }

    /// The response code paired with a request, used by the dispatcher to
    /// reject unauthenticated requests on the right channel.
    pub fn response_code(self) -> Option<Self> {
        Some(match self {
            Self::ConnectReq => Self::ConnectRsp,
            Self::HeartbeatReq => Self::HeartbeatRsp,
            Self::AuthReq => Self::AuthRsp,
            Self::SendMsgReq => Self::SendMsgRsp,
            Self::RevokeMsgReq => Self::RevokeMsgRsp,
            Self::BatchSyncReq => Self::BatchSyncRsp,
            Self::SyncRangeReq => Self::SyncRangeRsp,
            Self::ReadReceiptReq => Self::ReadReceiptRsp,
            _ => return None,
        })
    }
}

impl From<CommandId> for u16 {
    fn from(cmd: CommandId) -> u16 {
        cmd as u16
    }
}

impl From<CommandId> for u32 {
    fn from(cmd: CommandId) -> u32 {
        cmd as u16 as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_codes() {
        for cmd in [
            CommandId::AuthReq,
            CommandId::SendMsgReq,
            CommandId::PushMsg,
            CommandId::SyncRangeRsp,
            CommandId::TypingStatusPush,
        ] {
            assert_eq!(CommandId::from_u16(cmd as u16), Some(cmd));
        }
    }

    #[test]
    fn rejects_unknown_code() {
        assert_eq!(CommandId::from_u16(0xFFEE), None);
    }

    #[test]
    fn pairs_requests_with_responses() {
        assert_eq!(
            CommandId::SendMsgReq.response_code(),
            Some(CommandId::SendMsgRsp)
        );
        assert_eq!(CommandId::PushMsg.response_code(), None);
    }
}
