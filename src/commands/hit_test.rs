use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_args;
use crate::dispatcher::CommandHandler;
use crate::protocol::Reply;
use crate::session::ArSession;

/// Reports the world position of the surface under a screen point
pub struct PerformHitTestCommand;

#[derive(Debug, Deserialize)]
struct HitTestArgs {
    x: f32,
    y: f32,
}

impl CommandHandler for PerformHitTestCommand {
    fn name(&self) -> &str {
        "performHitTest"
    }

    fn description(&self) -> &str {
        "Returns the {x, y, z} world position of the surface under a screen point"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": { "type": "number", "description": "Screen x in pixels" },
                "y": { "type": "number", "description": "Screen y in pixels" }
            },
            "required": ["x", "y"]
        })
    }

    fn execute(&self, args: Value, session: &mut ArSession, reply: Reply) {
        let result = parse_args::<HitTestArgs>(args)
            .and_then(|args| session.perform_hit_test(args.x, args.y))
            .map(|position| json!(position));
        reply.result(result);
    }
}
