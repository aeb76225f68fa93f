//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the session engine and the outside world. Adapters implement these
//! ports.
//!
//! - `DatabaseConnector` / `DatabaseConnection` - per-session database access
//!   including the notification subscription
//! - `CommandHandler` - application interceptors for named commands
//! - `SessionHooks` - on-connect / on-disconnect callbacks

mod command_handler;
mod database;
mod hooks;

pub use command_handler::CommandHandler;
pub use database::{
    DatabaseConnection, DatabaseConnector, DatabaseError, Notification, NotificationHandler,
    QueryResult, ResultRow, RowStream,
};
pub use hooks::{NoopHooks, SessionHooks};
