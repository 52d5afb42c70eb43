use serde_json::Value;

use super::no_parameters;
use crate::dispatcher::CommandHandler;
use crate::protocol::Reply;
use crate::session::ArSession;

/// Records a measurement point at the screen center
pub struct ShootCommand;

impl CommandHandler for ShootCommand {
    fn name(&self) -> &str {
        "shoot"
    }

    fn description(&self) -> &str {
        "Adds a measurement point on the plane under the screen center"
    }

    fn parameters(&self) -> Value {
        no_parameters()
    }

    fn execute(&self, _args: Value, session: &mut ArSession, reply: Reply) {
        session.shoot();
        reply.success(Value::Null);
    }
}

pub struct ClearAllPointsCommand;

impl CommandHandler for ClearAllPointsCommand {
    fn name(&self) -> &str {
        "clearAllPoints"
    }

    fn description(&self) -> &str {
        "Removes every measurement point, segment and label"
    }

    fn parameters(&self) -> Value {
        no_parameters()
    }

    fn execute(&self, _args: Value, session: &mut ArSession, reply: Reply) {
        session.clear_all_points();
        reply.success(Value::Null);
    }
}

pub struct HideVisualElementsCommand;

impl CommandHandler for HideVisualElementsCommand {
    fn name(&self) -> &str {
        "hideVisualElements"
    }

    fn description(&self) -> &str {
        "Hides the focus reticle and plane visualisation"
    }

    fn parameters(&self) -> Value {
        no_parameters()
    }

    fn execute(&self, _args: Value, session: &mut ArSession, reply: Reply) {
        session.set_visual_elements_visible(false);
        reply.success(Value::Null);
    }
}

pub struct RestoreVisualElementsCommand;

impl CommandHandler for RestoreVisualElementsCommand {
    fn name(&self) -> &str {
        "restoreVisualElements"
    }

    fn description(&self) -> &str {
        "Shows the focus reticle and plane visualisation again"
    }

    fn parameters(&self) -> Value {
        no_parameters()
    }

    fn execute(&self, _args: Value, session: &mut ArSession, reply: Reply) {
        session.set_visual_elements_visible(true);
        reply.success(Value::Null);
    }
}
