pub mod connection;
pub mod dispatcher;
pub mod rate_limit;
pub mod registry;
pub mod tcp;
pub mod ws;

pub use connection::{Connection, TransportKind};
pub use dispatcher::Dispatcher;
pub use registry::ConnectionRegistry;
