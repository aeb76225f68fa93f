//! Scripted in-memory database for testing.
//!
//! Statements are answered from a table of [`ScriptedResponse`]s keyed by
//! the exact statement text. Anything unscripted completes with no result
//! set. `LISTEN`, `UNLISTEN` and `pg_notify` are emulated so notification
//! flows can be exercised without a server, and open connections can be
//! terminated to stand in for a server that goes away.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! Production code should use the PostgreSQL connector.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::protocol::SqlArg;
use crate::ports::{
    DatabaseConnection, DatabaseConnector, DatabaseError, Notification, NotificationHandler,
    QueryResult, ResultRow,
};

/// Canned outcome for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// Rows with the given first columns (`None` is a NULL).
    Rows(Vec<Option<String>>),
    /// No result set, with an affected-row count.
    NoResultSet(u64),
    /// The server rejects the statement.
    Error(String),
    /// Some rows arrive, then the statement fails.
    PartialRows {
        rows: Vec<Option<String>>,
        error: String,
    },
    /// Waits before answering with the inner response.
    Delayed(Duration, Box<ScriptedResponse>),
}

impl ScriptedResponse {
    pub fn rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        ScriptedResponse::Rows(rows.into_iter().map(|r| r.map(Into::into)).collect())
    }

    pub fn delayed(delay: Duration, response: ScriptedResponse) -> Self {
        ScriptedResponse::Delayed(delay, Box::new(response))
    }
}

/// A statement as it reached the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub connection: u64,
    pub statement: String,
    pub args: Vec<SqlArg>,
}

struct ConnectionState {
    listening: HashSet<String>,
    handlers: Vec<Arc<dyn NotificationHandler>>,
    terminated: bool,
    lost: watch::Sender<bool>,
}

#[derive(Default)]
struct Inner {
    responses: HashMap<String, ScriptedResponse>,
    connect_error: Option<String>,
    executed: Vec<ExecutedStatement>,
    connections: HashMap<u64, ConnectionState>,
    next_id: u64,
    opened: usize,
    closed: usize,
}

/// In-memory database shared by every connection it opens.
///
/// Cloning yields another handle to the same state, so a test keeps one
/// clone for assertions and hands another to the code under test.
///
/// # Example
///
/// ```ignore
/// let db = InMemoryDatabase::new();
/// db.respond("SELECT 1", ScriptedResponse::rows([Some("1")]));
///
/// let coordinator = SessionCoordinator::new(Arc::new(db.clone()), registry, hooks);
/// // ... run a session ...
///
/// assert_eq!(db.closed_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for an exact statement text. Scripted
    /// responses take precedence over the built-in emulation.
    pub fn respond(&self, statement: impl Into<String>, response: ScriptedResponse) {
        self.inner.lock().responses.insert(statement.into(), response);
    }

    /// Makes every subsequent connect attempt fail.
    pub fn fail_connections(&self, message: impl Into<String>) {
        self.inner.lock().connect_error = Some(message.into());
    }

    /// Delivers a notification to every open connection listening on
    /// `channel`. Returns the number of connections reached.
    pub fn notify(&self, channel: &str, payload: &str) -> usize {
        let targets: Vec<(u64, Vec<Arc<dyn NotificationHandler>>)> = {
            let inner = self.inner.lock();
            inner
                .connections
                .iter()
                .filter(|(_, state)| state.listening.contains(channel))
                .map(|(id, state)| (*id, state.handlers.clone()))
                .collect()
        };

        // Handlers run outside the lock; they may call back into the database.
        for (id, handlers) in &targets {
            for handler in handlers {
                handler.on_notification(Notification {
                    channel: channel.to_string(),
                    payload: payload.to_string(),
                    process_id: *id as i32,
                });
            }
        }
        targets.len()
    }

    /// Terminates every open connection, as the server does for
    /// `pg_terminate_backend`. Returns the number of connections dropped.
    ///
    /// Terminated connections answer every statement with an error until
    /// they are released.
    pub fn terminate_connections(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut count = 0;
        for state in inner.connections.values_mut().filter(|s| !s.terminated) {
            state.terminated = true;
            state.listening.clear();
            state.handlers.clear();
            state.lost.send_replace(true);
            count += 1;
        }
        count
    }

    // === Test Helpers ===

    /// Returns every statement issued, across all connections.
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.inner.lock().executed.clone()
    }

    /// Returns the text of every statement issued.
    pub fn statements(&self) -> Vec<String> {
        self.inner
            .lock()
            .executed
            .iter()
            .map(|e| e.statement.clone())
            .collect()
    }

    /// Checks whether any open connection listens on `channel`.
    pub fn is_listening(&self, channel: &str) -> bool {
        self.inner
            .lock()
            .connections
            .values()
            .any(|state| state.listening.contains(channel))
    }

    pub fn opened_count(&self) -> usize {
        self.inner.lock().opened
    }

    pub fn closed_count(&self) -> usize {
        self.inner.lock().closed
    }

    /// Connections opened and not yet released.
    pub fn open_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    fn record(&self, connection: u64, statement: &str, args: &[SqlArg]) -> ScriptedResponse {
        let mut inner = self.inner.lock();
        inner.executed.push(ExecutedStatement {
            connection,
            statement: statement.to_string(),
            args: args.to_vec(),
        });

        let terminated = inner
            .connections
            .get(&connection)
            .map_or(true, |state| state.terminated);
        if terminated {
            return ScriptedResponse::Error("connection closed".into());
        }

        if let Some(response) = inner.responses.get(statement) {
            return response.clone();
        }

        let Some(state) = inner.connections.get_mut(&connection) else {
            return ScriptedResponse::Error("connection closed".into());
        };
        match Builtin::parse(statement, args) {
            Some(Builtin::Listen(channel)) => {
                state.listening.insert(channel);
                ScriptedResponse::NoResultSet(0)
            }
            Some(Builtin::Unlisten(Some(channel))) => {
                state.listening.remove(&channel);
                ScriptedResponse::NoResultSet(0)
            }
            Some(Builtin::Unlisten(None)) => {
                state.listening.clear();
                ScriptedResponse::NoResultSet(0)
            }
            Some(Builtin::Notify { .. }) => ScriptedResponse::rows([Some("")]),
            None => ScriptedResponse::NoResultSet(0),
        }
    }
}

#[async_trait]
impl DatabaseConnector for InMemoryDatabase {
    async fn connect(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError> {
        let mut inner = self.inner.lock();
        if let Some(message) = &inner.connect_error {
            return Err(DatabaseError::Connect(message.clone()));
        }

        inner.next_id += 1;
        inner.opened += 1;
        let id = inner.next_id;
        let (lost, watcher) = watch::channel(false);
        inner.connections.insert(
            id,
            ConnectionState {
                listening: HashSet::new(),
                handlers: Vec::new(),
                terminated: false,
                lost,
            },
        );

        Ok(Box::new(InMemoryConnection {
            id,
            db: self.clone(),
            lost: watcher,
        }))
    }
}

/// Statements the adapter emulates when nothing is scripted.
#[derive(Debug, PartialEq)]
enum Builtin {
    Listen(String),
    /// `None` means `UNLISTEN *`.
    Unlisten(Option<String>),
    Notify { channel: String, payload: String },
}

impl Builtin {
    fn parse(statement: &str, args: &[SqlArg]) -> Option<Self> {
        let trimmed = statement.trim().trim_end_matches(';').trim();
        let upper = trimmed.to_ascii_uppercase();

        if let Some(rest) = upper.strip_prefix("UNLISTEN ") {
            if rest.trim() == "*" {
                return Some(Builtin::Unlisten(None));
            }
            let name = &trimmed["UNLISTEN ".len()..];
            return Some(Builtin::Unlisten(Some(channel_name(name))));
        }
        if upper.starts_with("LISTEN ") {
            let name = &trimmed["LISTEN ".len()..];
            return Some(Builtin::Listen(channel_name(name)));
        }
        if upper.contains("PG_NOTIFY(") {
            let channel = args.first()?.as_text()?.into_owned();
            let payload = args
                .get(1)
                .and_then(|a| a.as_text())
                .map(|p| p.into_owned())
                .unwrap_or_default();
            return Some(Builtin::Notify { channel, payload });
        }
        None
    }
}

/// Resolves an identifier the way the server does: quoted names keep
/// their case, bare names fold to lower case.
fn channel_name(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(quoted) => quoted.replace("\"\"", "\""),
        None => raw.to_lowercase(),
    }
}

/// Connection handed out by [`InMemoryDatabase`].
pub struct InMemoryConnection {
    id: u64,
    db: InMemoryDatabase,
    lost: watch::Receiver<bool>,
}

impl InMemoryConnection {
    async fn resolve(&self, statement: &str, args: &[SqlArg]) -> Result<QueryResult, DatabaseError> {
        let mut response = self.db.record(self.id, statement, args);
        let notify = Builtin::parse(statement, args);

        while let ScriptedResponse::Delayed(delay, inner) = response {
            tokio::time::sleep(delay).await;
            response = *inner;
        }

        if let Some(Builtin::Notify { channel, payload }) = notify {
            self.db.notify(&channel, &payload);
        }

        match response {
            ScriptedResponse::Rows(rows) => Ok(QueryResult::Rows(Box::pin(futures::stream::iter(
                rows.into_iter().map(|r| Ok(ResultRow::new(r))),
            )))),
            ScriptedResponse::NoResultSet(rows_affected) => {
                Ok(QueryResult::NoResultSet { rows_affected })
            }
            ScriptedResponse::Error(message) => Err(DatabaseError::Query(message)),
            ScriptedResponse::PartialRows { rows, error } => {
                let items = rows
                    .into_iter()
                    .map(|r| Ok(ResultRow::new(r)))
                    .chain(std::iter::once(Err(DatabaseError::Query(error))));
                Ok(QueryResult::Rows(Box::pin(futures::stream::iter(items))))
            }
            ScriptedResponse::Delayed(..) => Ok(QueryResult::NoResultSet { rows_affected: 0 }),
        }
    }
}

#[async_trait]
impl DatabaseConnection for InMemoryConnection {
    async fn query(&self, statement: &str, args: &[SqlArg]) -> Result<QueryResult, DatabaseError> {
        self.resolve(statement, args).await
    }

    async fn execute(&self, statement: &str, args: &[SqlArg]) -> Result<u64, DatabaseError> {
        use futures::StreamExt;

        match self.resolve(statement, args).await? {
            QueryResult::NoResultSet { rows_affected } => Ok(rows_affected),
            QueryResult::Rows(mut rows) => {
                let mut count = 0;
                while let Some(row) = rows.next().await {
                    row?;
                    count += 1;
                }
                Ok(count)
            }
        }
    }

    fn subscribe(&self, handler: Arc<dyn NotificationHandler>) {
        if let Some(state) = self.db.inner.lock().connections.get_mut(&self.id) {
            if !state.terminated {
                state.handlers.push(handler);
            }
        }
    }

    async fn closed(&self) {
        let mut lost = self.lost.clone();
        while !*lost.borrow_and_update() {
            if lost.changed().await.is_err() {
                break;
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        let mut inner = self.db.inner.lock();
        inner.connections.remove(&self.id);
        inner.closed += 1;
        Ok(())
    }
}
