pub mod auth;
pub mod error_handler;
pub mod groups;
pub mod health;
pub mod users;
