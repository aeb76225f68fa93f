//! Database port - the connection capability a session needs.
//!
//! A session opens exactly one connection through a [`DatabaseConnector`]
//! and owns it until teardown, when [`DatabaseConnection::close`] consumes
//! the handle. The connection also carries the subscription side: any
//! number of [`NotificationHandler`]s can be registered and are invoked for
//! every notification the server delivers on this connection.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::protocol::SqlArg;

/// Errors reported by a database adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    #[error("could not connect to database: {0}")]
    Connect(String),

    /// The server rejected the statement; holds the server's primary message.
    #[error("{0}")]
    Query(String),

    /// Client-side driver failure (I/O, protocol, decoding).
    #[error("{0}")]
    Driver(String),

    #[error("unsupported result column type: {0}")]
    UnsupportedColumnType(String),
}

/// A result row, reduced to its first column as text.
///
/// `None` covers both a SQL `NULL` and a row without columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultRow {
    pub first_column: Option<String>,
}

impl ResultRow {
    pub fn new(first_column: Option<String>) -> Self {
        Self { first_column }
    }
}

/// Rows produced by a statement. Dropping the stream releases the
/// server-side portal.
pub type RowStream = BoxStream<'static, Result<ResultRow, DatabaseError>>;

/// Outcome of issuing a statement.
pub enum QueryResult {
    /// The statement has result columns; rows arrive lazily.
    Rows(RowStream),
    /// The statement has no readable result set (DDL, DML without
    /// `RETURNING`, `LISTEN`, ...).
    NoResultSet { rows_affected: u64 },
}

/// An asynchronous notification delivered by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: String,
    pub payload: String,
    pub process_id: i32,
}

/// Receiver of asynchronous notifications.
///
/// Called from the connection's driver, concurrently with queries on the
/// same connection. Implementations must return promptly: enqueue, never
/// await the client.
pub trait NotificationHandler: Send + Sync {
    fn on_notification(&self, notification: Notification);
}

/// One open database connection, exclusively owned by a session.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Issues a statement with positional `$n` parameters.
    async fn query(&self, statement: &str, args: &[SqlArg]) -> Result<QueryResult, DatabaseError>;

    /// Issues a statement and discards any rows, returning the affected count.
    async fn execute(&self, statement: &str, args: &[SqlArg]) -> Result<u64, DatabaseError>;

    /// Registers a handler for notifications received on this connection.
    fn subscribe(&self, handler: Arc<dyn NotificationHandler>);

    /// Resolves once the server side of the connection is gone. Pending
    /// forever while the connection is healthy.
    async fn closed(&self);

    /// Releases the connection. Consuming the handle makes a second
    /// release impossible.
    async fn close(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// Opens database connections for new sessions.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError>;
}
