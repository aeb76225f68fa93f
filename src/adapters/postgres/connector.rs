//! PostgreSQL connector backed by `tokio-postgres`.
//!
//! Each session gets its own connection. The connection future is driven
//! by a dedicated task that also receives asynchronous messages, so
//! notifications reach subscribers while a query is in flight. When that
//! task ends the connection is gone, and [`DatabaseConnection::closed`]
//! resolves.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_postgres::{AsyncMessage, Client, NoTls};

use super::columns::{check_first_column, first_column};
use super::params::as_params;
use crate::config::DatabaseConfig;
use crate::domain::protocol::SqlArg;
use crate::ports::{
    DatabaseConnection, DatabaseConnector, DatabaseError, Notification, NotificationHandler,
    QueryResult,
};

type Handlers = Arc<RwLock<Vec<Arc<dyn NotificationHandler>>>>;

impl From<tokio_postgres::Error> for DatabaseError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => DatabaseError::Query(db.message().to_string()),
            None => DatabaseError::Driver(err.to_string()),
        }
    }
}

/// Opens one `tokio-postgres` connection per session.
pub struct PostgresConnector {
    url: SecretString,
    connect_timeout: Duration,
    application_name: String,
}

impl PostgresConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            url: SecretString::new(config.url.clone()),
            connect_timeout: config.connect_timeout(),
            application_name: config.application_name.clone(),
        }
    }

    fn pg_config(&self) -> Result<tokio_postgres::Config, DatabaseError> {
        let mut config: tokio_postgres::Config = self
            .url
            .expose_secret()
            .parse()
            .map_err(|e: tokio_postgres::Error| DatabaseError::Connect(e.to_string()))?;
        config
            .connect_timeout(self.connect_timeout)
            .application_name(&self.application_name);
        Ok(config)
    }
}

#[async_trait]
impl DatabaseConnector for PostgresConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError> {
        let config = self.pg_config()?;
        let (client, mut connection) = config.connect(NoTls).await.map_err(|e| {
            let message = match e.as_db_error() {
                Some(db) => db.message().to_string(),
                None => e.to_string(),
            };
            DatabaseError::Connect(message)
        })?;

        let handlers: Handlers = Arc::new(RwLock::new(Vec::new()));
        let subscribers = handlers.clone();
        let (lost, watcher) = watch::channel(false);
        let driver = tokio::spawn(async move {
            let mut messages =
                futures::stream::poll_fn(move |cx| connection.poll_message(cx));
            while let Some(message) = messages.next().await {
                match message {
                    Ok(AsyncMessage::Notification(n)) => {
                        tracing::debug!(channel = %n.channel(), pid = n.process_id(), "notification received");
                        let notification = Notification {
                            channel: n.channel().to_string(),
                            payload: n.payload().to_string(),
                            process_id: n.process_id(),
                        };
                        let current: Vec<_> = subscribers.read().clone();
                        for handler in current {
                            handler.on_notification(notification.clone());
                        }
                    }
                    Ok(AsyncMessage::Notice(notice)) => {
                        tracing::debug!(severity = %notice.severity(), "server notice: {}", notice.message());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "database connection failed");
                        break;
                    }
                }
            }
            lost.send_replace(true);
        });

        tracing::debug!(application_name = %self.application_name, "database connection opened");
        Ok(Box::new(PostgresConnection {
            client,
            handlers,
            driver,
            lost: watcher,
        }))
    }
}

/// A live session connection.
pub struct PostgresConnection {
    client: Client,
    handlers: Handlers,
    driver: JoinHandle<()>,
    lost: watch::Receiver<bool>,
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    async fn query(&self, statement: &str, args: &[SqlArg]) -> Result<QueryResult, DatabaseError> {
        let prepared = self.client.prepare(statement).await?;

        if prepared.columns().is_empty() {
            let rows_affected = self.client.execute_raw(&prepared, as_params(args)).await?;
            return Ok(QueryResult::NoResultSet { rows_affected });
        }

        check_first_column(prepared.columns().first().map(|c| c.type_()))?;
        let rows = self.client.query_raw(&prepared, as_params(args)).await?;
        let rows = rows.map(|row| first_column(&row?));
        Ok(QueryResult::Rows(rows.boxed()))
    }

    async fn execute(&self, statement: &str, args: &[SqlArg]) -> Result<u64, DatabaseError> {
        let prepared = self.client.prepare(statement).await?;
        Ok(self.client.execute_raw(&prepared, as_params(args)).await?)
    }

    fn subscribe(&self, handler: Arc<dyn NotificationHandler>) {
        self.handlers.write().push(handler);
    }

    async fn closed(&self) {
        let mut lost = self.lost.clone();
        while !*lost.borrow_and_update() {
            // A dropped sender means the driver task is gone too.
            if lost.changed().await.is_err() {
                break;
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        let PostgresConnection {
            client,
            handlers,
            driver,
            ..
        } = *self;

        handlers.write().clear();
        // The driver finishes once the last client handle is gone.
        drop(client);
        driver
            .await
            .map_err(|e| DatabaseError::Driver(format!("connection task failed: {}", e)))?;
        tracing::debug!("database connection closed");
        Ok(())
    }
}
