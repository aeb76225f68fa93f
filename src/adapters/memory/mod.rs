//! In-memory adapters for tests and demos.

mod database;

pub use database::{ExecutedStatement, InMemoryConnection, InMemoryDatabase, ScriptedResponse};
