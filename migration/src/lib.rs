pub use sea_orm_migration::prelude::*;

mod m20260115_000001_create_users;
mod m20260115_000002_create_conversations;
mod m20260115_000003_create_messages;
mod m20260115_000004_create_message_sequences;
mod m20260115_000005_create_message_read_receipts;
mod m20260115_000006_create_groups;
mod m20260115_000007_create_group_members;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260115_000001_create_users::Migration),
            Box::new(m20260115_000002_create_conversations::Migration),
            Box::new(m20260115_000003_create_messages::Migration),
            Box::new(m20260115_000004_create_message_sequences::Migration),
            Box::new(m20260115_000005_create_message_read_receipts::Migration),
            Box::new(m20260115_000006_create_groups::Migration),
            Box::new(m20260115_000007_create_group_members::Migration),
        ]
    }
}
