//! Wire protocol shared by the TCP and WebSocket transports.
//!
//! TCP peers speak length-prefixed binary frames (a 16-byte header followed
//! by the body, see [`frame`]); WebSocket peers send one [`wire::Envelope`]
//! per binary message. Both carry the same prost-encoded body payloads.

pub mod command;
pub mod frame;
pub mod wire;

pub use command::CommandId;
pub use frame::{Frame, FrameCodec, FrameError};
pub use wire::ErrorCode;
