//! Registry mapping command names to application handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ports::CommandHandler;

/// Table of named interceptors consulted before SQL fall-through.
///
/// Built once at startup, then shared read-only across sessions behind an
/// `Arc`.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a command name. A later registration for the
    /// same name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, handler: impl CommandHandler + 'static) {
        self.register_shared(name, Arc::new(handler));
    }

    /// Register an already shared handler.
    pub fn register_shared(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(command = %name, "replaced existing command handler");
        }
    }

    /// Look up the handler for a command name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Check whether a command is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// List all registered command names (sorted).
    pub fn commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
