//! CommandHandler port - application interceptors for named commands.

use async_trait::async_trait;
use serde_json::Value;

use super::DatabaseConnection;
use crate::domain::foundation::BridgeError;

/// Handler invoked when an inbound message's command matches a registered
/// name.
///
/// Returning `Ok(true)` ends dispatch for the message. Returning
/// `Ok(false)` lets the command fall through and run as a SQL statement
/// with the same arguments. An `Err` becomes an error frame.
///
/// # Example
///
/// ```ignore
/// struct Swallow;
///
/// #[async_trait]
/// impl CommandHandler for Swallow {
///     async fn handle(&self, _conn: &dyn DatabaseConnection, _args: &[Value]) -> Result<bool, BridgeError> {
///         Ok(true)
///     }
/// }
/// ```
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, conn: &dyn DatabaseConnection, args: &[Value]) -> Result<bool, BridgeError>;
}
