//! Decoding of inbound client messages.

use serde_json::Value;

use crate::domain::foundation::BridgeError;

/// A decoded client message: `[command, arg1, arg2, ...]`.
///
/// `command` is either the name of a registered command or a SQL
/// statement. Arguments stay as JSON values until they are bound.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    command: String,
    args: Vec<Value>,
}

impl InboundMessage {
    /// Creates a message from its parts.
    pub fn new(command: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Parses a text frame.
    ///
    /// Anything that is not a non-empty JSON array whose first element is
    /// a string is rejected.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| BridgeError::InvalidMessage(e.to_string()))?;

        let Value::Array(mut items) = value else {
            return Err(BridgeError::InvalidMessage(
                "expected a JSON array".to_string(),
            ));
        };
        if items.is_empty() {
            return Err(BridgeError::InvalidMessage(
                "message array is empty".to_string(),
            ));
        }
        let Value::String(command) = items.remove(0) else {
            return Err(BridgeError::InvalidMessage(
                "first element must be a string".to_string(),
            ));
        };

        Ok(Self {
            command,
            args: items,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_command_and_args() {
        let msg = InboundMessage::parse(r#"["SELECT pg_notify(%s, %s);", "clients", "hi"]"#).unwrap();
        assert_eq!(msg.command(), "SELECT pg_notify(%s, %s);");
        assert_eq!(msg.args(), &[json!("clients"), json!("hi")]);
    }

    #[test]
    fn parses_command_without_args() {
        let msg = InboundMessage::parse(r#"["SELECT 1;"]"#).unwrap();
        assert_eq!(msg.command(), "SELECT 1;");
        assert!(msg.args().is_empty());
    }

    #[test]
    fn keeps_primitive_args() {
        let msg = InboundMessage::parse(r#"["cmd", 1, 2.5, true, null]"#).unwrap();
        assert_eq!(msg.args(), &[json!(1), json!(2.5), json!(true), Value::Null]);
    }

    #[test]
    fn rejects_invalid_json() {
        let err = InboundMessage::parse("not json").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidMessage(_)));
    }

    #[test]
    fn rejects_objects() {
        let err = InboundMessage::parse(r#"{"command": "x"}"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid message: expected a JSON array");
    }

    #[test]
    fn rejects_empty_array() {
        let err = InboundMessage::parse("[]").unwrap_err();
        assert_eq!(err.to_string(), "invalid message: message array is empty");
    }

    #[test]
    fn rejects_non_string_command() {
        let err = InboundMessage::parse("[42, \"x\"]").unwrap_err();
        assert_eq!(err.to_string(), "invalid message: first element must be a string");
    }
}
