pub mod prelude;

pub mod conversations;
pub mod group_members;
pub mod groups;
pub mod message_read_receipts;
pub mod message_sequences;
pub mod messages;
pub mod users;
