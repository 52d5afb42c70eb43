//! Built-in host commands

mod hit_test;
mod measurement;
mod screenshot;
mod shapes;

pub use hit_test::PerformHitTestCommand;
pub use measurement::{
    ClearAllPointsCommand, HideVisualElementsCommand, RestoreVisualElementsCommand, ShootCommand,
};
pub use screenshot::TakeScreenshotCommand;
pub use shapes::{MakeShapeCommand, MoveShapeCommand, RemoveShapeCommand};

use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ShapeDefaults;
use crate::dispatcher::CommandRegistry;
use crate::error::ArError;

/// Register every built-in command
pub fn register_builtin_commands(
    registry: &mut CommandRegistry,
    shape_defaults: ShapeDefaults,
) -> Result<()> {
    registry.register(Arc::new(MakeShapeCommand::new(shape_defaults)))?;
    registry.register(Arc::new(MoveShapeCommand))?;
    registry.register(Arc::new(RemoveShapeCommand))?;
    registry.register(Arc::new(PerformHitTestCommand))?;
    registry.register(Arc::new(ShootCommand))?;
    registry.register(Arc::new(ClearAllPointsCommand))?;
    registry.register(Arc::new(HideVisualElementsCommand))?;
    registry.register(Arc::new(RestoreVisualElementsCommand))?;
    registry.register(Arc::new(TakeScreenshotCommand))?;
    Ok(())
}

/// Decode a validated argument object into a handler's argument struct
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ArError> {
    serde_json::from_value(args).map_err(|e| ArError::InvalidArguments(e.to_string()))
}

/// Schema for commands that take no arguments
pub(crate) fn no_parameters() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_all_commands() {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry, ShapeDefaults::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "clearAllPoints",
                "hideVisualElements",
                "makeShape",
                "moveShape",
                "performHitTest",
                "removeShape",
                "restoreVisualElements",
                "shoot",
                "takeScreenshot",
            ]
        );
        for name in registry.names() {
            let handler = registry.get(&name).unwrap();
            assert!(!handler.description().is_empty());
            assert!(handler.parameters().is_object());
        }
    }

    #[test]
    fn test_registering_twice_fails() {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry, ShapeDefaults::default()).unwrap();
        assert!(register_builtin_commands(&mut registry, ShapeDefaults::default()).is_err());
    }
}
