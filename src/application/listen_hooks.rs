//! Session hooks that subscribe each session to a fixed set of channels.

use async_trait::async_trait;

use crate::domain::foundation::BridgeError;
use crate::ports::{DatabaseConnection, SessionHooks};

/// Issues `LISTEN` for every configured channel when a session connects
/// and `UNLISTEN *` when it disconnects.
#[derive(Debug, Clone, Default)]
pub struct ListenHooks {
    channels: Vec<String>,
}

impl ListenHooks {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }
}

#[async_trait]
impl SessionHooks for ListenHooks {
    async fn on_connect(&self, conn: &dyn DatabaseConnection) -> Result<(), BridgeError> {
        for channel in &self.channels {
            conn.execute(&format!("LISTEN {}", quote_identifier(channel)), &[])
                .await?;
            tracing::debug!(channel = %channel, "listening");
        }
        Ok(())
    }

    async fn on_disconnect(&self, conn: &dyn DatabaseConnection) -> Result<(), BridgeError> {
        if !self.channels.is_empty() {
            conn.execute("UNLISTEN *", &[]).await?;
        }
        Ok(())
    }
}

/// Quotes a channel name as a SQL identifier (case preserved).
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDatabase;
    use crate::ports::DatabaseConnector;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("clients"), "\"clients\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn listens_on_connect_and_unlistens_on_disconnect() {
        let db = InMemoryDatabase::new();
        let conn = db.connect().await.unwrap();
        let hooks = ListenHooks::new(["clients", "Orders"]);

        hooks.on_connect(conn.as_ref()).await.unwrap();
        assert!(db.is_listening("clients"));
        assert!(db.is_listening("Orders"));

        hooks.on_disconnect(conn.as_ref()).await.unwrap();
        assert!(!db.is_listening("clients"));
        assert_eq!(
            db.statements(),
            vec![
                "LISTEN \"clients\"".to_string(),
                "LISTEN \"Orders\"".to_string(),
                "UNLISTEN *".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn no_channels_issue_nothing() {
        let db = InMemoryDatabase::new();
        let conn = db.connect().await.unwrap();
        let hooks = ListenHooks::default();

        hooks.on_connect(conn.as_ref()).await.unwrap();
        hooks.on_disconnect(conn.as_ref()).await.unwrap();
        assert!(db.statements().is_empty());
    }
}
