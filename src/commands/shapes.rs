use serde::Deserialize;
use serde_json::{json, Value};

use ar_plus_spatial::Point3D;

use super::parse_args;
use crate::config::ShapeDefaults;
use crate::dispatcher::CommandHandler;
use crate::protocol::Reply;
use crate::render::Argb;
use crate::session::ArSession;
use crate::shapes::{ShapeDimensions, ShapeRequest};

/// Places a primitive on the surface under a screen point
pub struct MakeShapeCommand {
    defaults: ShapeDefaults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MakeShapeArgs {
    shape: String,
    radius: Option<f32>,
    height: Option<f32>,
    width: Option<f32>,
    depth: Option<f32>,
    position_x: Option<f32>,
    position_y: Option<f32>,
    color: Option<i64>,
}

impl MakeShapeCommand {
    pub fn new(defaults: ShapeDefaults) -> Self {
        Self { defaults }
    }

    fn request(&self, args: MakeShapeArgs) -> ShapeRequest {
        let defaults = &self.defaults;
        ShapeRequest {
            shape: args.shape,
            dimensions: ShapeDimensions {
                radius: args.radius.unwrap_or(defaults.radius),
                height: args.height.unwrap_or(defaults.height),
                width: args.width.unwrap_or(defaults.width),
                depth: args.depth.unwrap_or(defaults.depth),
            },
            screen_x: args.position_x.unwrap_or(0.0),
            screen_y: args.position_y.unwrap_or(0.0),
            color: args
                .color
                .map(Argb::from_host_int)
                .unwrap_or(defaults.color),
        }
    }
}

impl Default for MakeShapeCommand {
    fn default() -> Self {
        Self::new(ShapeDefaults::default())
    }
}

impl CommandHandler for MakeShapeCommand {
    fn name(&self) -> &str {
        "makeShape"
    }

    fn description(&self) -> &str {
        "Places a cylinder, sphere or cube on the surface under a screen point"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "shape": {
                    "type": "string",
                    "description": "cylinder, sphere or cube"
                },
                "radius": { "type": "number", "description": "Meters" },
                "height": { "type": "number", "description": "Meters" },
                "width": { "type": "number", "description": "Meters (cube)" },
                "depth": { "type": "number", "description": "Meters (cube)" },
                "positionX": { "type": "number", "description": "Screen x to hit test" },
                "positionY": { "type": "number", "description": "Screen y to hit test" },
                "color": { "type": "integer", "description": "ARGB color" }
            },
            "required": ["shape"]
        })
    }

    fn execute(&self, args: Value, session: &mut ArSession, reply: Reply) {
        match parse_args::<MakeShapeArgs>(args) {
            Ok(args) => session.make_shape(self.request(args), reply),
            Err(err) => reply.error(err),
        }
    }
}

/// Moves a placed shape relative to its anchor
pub struct MoveShapeCommand;

#[derive(Debug, Deserialize)]
struct MoveShapeArgs {
    id: String,
    x: f32,
    y: f32,
    z: f32,
}

impl CommandHandler for MoveShapeCommand {
    fn name(&self) -> &str {
        "moveShape"
    }

    fn description(&self) -> &str {
        "Sets a shape's offset from its anchor"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Shape id from makeShape" },
                "x": { "type": "number" },
                "y": { "type": "number" },
                "z": { "type": "number" }
            },
            "required": ["id", "x", "y", "z"]
        })
    }

    fn execute(&self, args: Value, session: &mut ArSession, reply: Reply) {
        let result = parse_args::<MoveShapeArgs>(args).and_then(|args| {
            session.move_shape(&args.id, Point3D::new(args.x, args.y, args.z))
        });
        reply.result(result.map(|_| json!(true)));
    }
}

/// Removes a placed shape
pub struct RemoveShapeCommand;

#[derive(Debug, Deserialize)]
struct RemoveShapeArgs {
    id: String,
}

impl CommandHandler for RemoveShapeCommand {
    fn name(&self) -> &str {
        "removeShape"
    }

    fn description(&self) -> &str {
        "Detaches a shape and forgets its id"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Shape id from makeShape" }
            },
            "required": ["id"]
        })
    }

    fn execute(&self, args: Value, session: &mut ArSession, reply: Reply) {
        let result =
            parse_args::<RemoveShapeArgs>(args).and_then(|args| session.remove_shape(&args.id));
        reply.result(result.map(|_| json!(true)));
    }
}
