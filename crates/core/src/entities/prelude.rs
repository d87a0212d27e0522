pub use super::conversations::Entity as Conversations;
pub use super::group_members::Entity as GroupMembers;
pub use super::groups::Entity as Groups;
pub use super::message_read_receipts::Entity as MessageReadReceipts;
pub use super::message_sequences::Entity as MessageSequences;
pub use super::messages::Entity as Messages;
pub use super::users::Entity as Users;
