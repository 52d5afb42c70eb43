//! Command dispatch: name lookup, argument validation, handler invocation

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use serde_json::{Map, Value};

use crate::error::{ArError, Result};
use crate::protocol::{MethodCall, Reply};
use crate::session::ArSession;

/// A host-callable command.
///
/// Handlers run on the session loop. Synchronous handlers answer `reply`
/// before returning; asynchronous ones move it into a deferred continuation.
pub trait CommandHandler: Send + Sync {
    /// Method name the host invokes
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the argument object
    fn parameters(&self) -> Value;

    fn execute(&self, args: Value, session: &mut ArSession, reply: Reply);
}

/// Method name to handler table
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; names must be unique
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> AnyResult<()> {
        let name = handler.name().to_string();
        if self.handlers.contains_key(&name) {
            anyhow::bail!("Command '{}' already registered", name);
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
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

    /// Route a call to its handler. Unknown names answer "not implemented";
    /// argument errors are answered before the handler runs.
    pub fn dispatch(&self, call: MethodCall, session: &mut ArSession, reply: Reply) {
        let Some(handler) = self.get(&call.method) else {
            tracing::debug!("No handler for method '{}'", call.method);
            reply.not_implemented();
            return;
        };

        let args = match normalize_arguments(call.arguments)
            .and_then(|args| validate_arguments(&handler.parameters(), &args).map(|_| args))
        {
            Ok(args) => args,
            Err(err) => {
                tracing::warn!("Rejected '{}': {}", call.method, err);
                reply.error(err);
                return;
            }
        };

        tracing::debug!("Dispatching '{}'", call.method);
        handler.execute(args, session, reply);
    }
}

/// Treat a missing argument bag as an empty object
fn normalize_arguments(args: Value) -> Result<Value> {
    match args {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(args),
        other => Err(ArError::InvalidArguments(format!(
            "expected an argument object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Check required presence and declared types against a handler schema.
///
/// Optional arguments are type-checked only when present and non-null.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<()> {
    let Some(args) = args.as_object() else {
        return Err(ArError::InvalidArguments(
            "arguments must be an object".to_string(),
        ));
    };
    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            match args.get(name) {
                None | Some(Value::Null) => {
                    return Err(ArError::InvalidArguments(format!(
                        "missing required argument '{}'",
                        name
                    )));
                }
                Some(_) => {}
            }
        }
    }

    let Some(properties) = properties else {
        return Ok(());
    };
    for (name, value) in args {
        if value.is_null() {
            continue;
        }
        let Some(expected) = properties
            .get(name)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        if !matches_type(expected, value) {
            return Err(ArError::InvalidArguments(format!(
                "argument '{}' must be {}, got {}",
                name,
                expected,
                json_type_name(value)
            )));
        }
    }
    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::protocol::{await_response, CommandResponse};
    use crate::session::test_session;
    use serde_json::json;

    struct Ping;

    impl CommandHandler for Ping {
        fn name(&self) -> &str {
            "ping"
        }

        fn description(&self) -> &str {
            "Replies with the given count"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "count": { "type": "integer" },
                    "label": { "type": "string" }
                },
                "required": ["count"]
            })
        }

        fn execute(&self, args: Value, _session: &mut ArSession, reply: Reply) {
            reply.success(args["count"].clone());
        }
    }

    fn schema() -> Value {
        Ping.parameters()
    }

    #[test]
    fn test_validate_required_presence() {
        assert!(validate_arguments(&schema(), &json!({ "count": 1 })).is_ok());
        assert!(matches!(
            validate_arguments(&schema(), &json!({})),
            Err(ArError::InvalidArguments(_))
        ));
        assert!(matches!(
            validate_arguments(&schema(), &json!({ "count": null })),
            Err(ArError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_validate_types() {
        assert!(validate_arguments(&schema(), &json!({ "count": "1" })).is_err());
        assert!(validate_arguments(&schema(), &json!({ "count": 1.5 })).is_err());
        assert!(validate_arguments(&schema(), &json!({ "count": 1, "label": 3 })).is_err());
        assert!(validate_arguments(&schema(), &json!({ "count": 1, "label": null })).is_ok());
        assert!(validate_arguments(&schema(), &json!({ "count": 1, "extra": [1] })).is_ok());
    }

    #[test]
    fn test_number_accepts_integers() {
        let schema = json!({ "properties": { "x": { "type": "number" } }, "required": ["x"] });
        assert!(validate_arguments(&schema, &json!({ "x": 3 })).is_ok());
        assert!(validate_arguments(&schema, &json!({ "x": 3.25 })).is_ok());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Ping)).unwrap();
        assert!(registry.register(Arc::new(Ping)).is_err());
        assert!(registry.has("ping"));
        assert!(!registry.has("pong"));
        assert_eq!(registry.names(), vec!["ping".to_string()]);
    }

    #[tokio::test]
    async fn test_dispatch_routes_and_rejects() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Ping)).unwrap();
        let (mut session, _events, _loop_rx) = test_session(Arc::new(SimulatedBackend::new()));

        let (reply, rx) = Reply::channel();
        registry.dispatch(MethodCall::new("ping", json!({ "count": 7 })), &mut session, reply);
        assert_eq!(await_response(rx).await, CommandResponse::success(json!(7)));

        let (reply, rx) = Reply::channel();
        registry.dispatch(MethodCall::new("ping", Value::Null), &mut session, reply);
        assert_eq!(await_response(rx).await.error_code(), Some("INVALID_ARGUMENTS"));

        let (reply, rx) = Reply::channel();
        registry.dispatch(MethodCall::new("ping", json!([1, 2])), &mut session, reply);
        assert_eq!(await_response(rx).await.error_code(), Some("INVALID_ARGUMENTS"));

        let (reply, rx) = Reply::channel();
        registry.dispatch(MethodCall::new("teleport", Value::Null), &mut session, reply);
        assert_eq!(await_response(rx).await, CommandResponse::NotImplemented);
    }
}
