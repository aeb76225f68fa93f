//! SessionHooks port - application callbacks around a session's lifetime.

use async_trait::async_trait;

use super::DatabaseConnection;
use crate::domain::foundation::BridgeError;

/// Callbacks run once per session against the session's connection.
///
/// `on_connect` runs before any inbound message is processed and is the
/// place to issue `LISTEN`. A failure there aborts the session.
/// `on_disconnect` runs during teardown; its failure is only logged.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    async fn on_connect(&self, _conn: &dyn DatabaseConnection) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn on_disconnect(&self, _conn: &dyn DatabaseConnection) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl SessionHooks for NoopHooks {}
