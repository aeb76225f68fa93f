//! PostgreSQL adapter - the production `DatabaseConnector`.
//!
//! - `PostgresConnector` - opens one `tokio-postgres` connection per session
//! - `params` - text-format binding of `SqlArg`
//! - `columns` - first-column decoding into text

mod columns;
mod connector;
mod params;

pub use columns::TextColumn;
pub use connector::{PostgresConnection, PostgresConnector};
