//! Bridge message types: method calls in, exactly one response out

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{ArError, Result};

/// A named call with a loosely typed argument bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Result of a method call as delivered to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandResponse {
    Success {
        result: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// The method name is not handled; distinct from an error
    NotImplemented,
}

impl CommandResponse {
    pub fn success(result: Value) -> Self {
        CommandResponse::Success { result }
    }

    pub fn error(error: &ArError) -> Self {
        CommandResponse::Error {
            code: error.code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandResponse::Success { .. })
    }

    /// Success payload, if any
    pub fn result(&self) -> Option<&Value> {
        match self {
            CommandResponse::Success { result } => Some(result),
            _ => None,
        }
    }

    /// Error code, if any
    pub fn error_code(&self) -> Option<&str> {
        match self {
            CommandResponse::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<Result<Value>> for CommandResponse {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => CommandResponse::success(value),
            Err(err) => CommandResponse::error(&err),
        }
    }
}

/// Single-use responder for one method call.
///
/// Sending consumes the reply, so a call can never be answered twice.
/// Dropping it unanswered closes the channel; the caller reads that as
/// [`ArError::SessionClosed`].
#[derive(Debug)]
pub struct Reply {
    tx: oneshot::Sender<CommandResponse>,
}

impl Reply {
    pub fn channel() -> (Self, oneshot::Receiver<CommandResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn send(self, response: CommandResponse) {
        if self.tx.send(response).is_err() {
            tracing::debug!("Caller went away before the response was delivered");
        }
    }

    pub fn success(self, result: Value) {
        self.send(CommandResponse::success(result));
    }

    pub fn error(self, error: ArError) {
        self.send(CommandResponse::error(&error));
    }

    pub fn not_implemented(self) {
        self.send(CommandResponse::NotImplemented);
    }

    pub fn result(self, result: Result<Value>) {
        self.send(result.into());
    }
}

/// Await a reply, mapping a dropped responder to `SessionClosed`
pub async fn await_response(rx: oneshot::Receiver<CommandResponse>) -> CommandResponse {
    rx.await
        .unwrap_or_else(|_| CommandResponse::error(&ArError::SessionClosed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_reply_delivers_once() {
        let (reply, rx) = Reply::channel();
        reply.success(json!("abc"));
        let response = await_response(rx).await;
        assert_eq!(response.result(), Some(&json!("abc")));
    }

    #[tokio::test]
    async fn test_dropped_reply_is_session_closed() {
        let (reply, rx) = Reply::channel();
        drop(reply);
        let response = await_response(rx).await;
        assert_eq!(response.error_code(), Some("SESSION_CLOSED"));
    }

    #[test]
    fn test_error_response_shape() {
        let response = CommandResponse::error(&ArError::NotFound("x1".into()));
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["status"], "error");
        assert_eq!(encoded["code"], "NOT_FOUND");
        assert_eq!(encoded["message"], "Shape not found: x1");
        assert!(encoded.get("details").is_none());
    }

    #[test]
    fn test_method_call_arguments_default_to_null() {
        let call: MethodCall = serde_json::from_str(r#"{"method":"shoot"}"#).unwrap();
        assert_eq!(call.method, "shoot");
        assert!(call.arguments.is_null());
    }

    #[test]
    fn test_not_implemented_is_not_an_error() {
        let response = CommandResponse::NotImplemented;
        assert!(!response.is_success());
        assert!(response.error_code().is_none());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "status": "not_implemented" })
        );
    }
}
