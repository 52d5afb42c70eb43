use serde_json::Value;

use super::no_parameters;
use crate::dispatcher::CommandHandler;
use crate::protocol::Reply;
use crate::session::ArSession;

/// Saves the rendered view as a PNG and answers with its path
pub struct TakeScreenshotCommand;

impl CommandHandler for TakeScreenshotCommand {
    fn name(&self) -> &str {
        "takeScreenshot"
    }

    fn description(&self) -> &str {
        "Captures the current frame to a PNG file and returns its path"
    }

    fn parameters(&self) -> Value {
        no_parameters()
    }

    fn execute(&self, _args: Value, session: &mut ArSession, reply: Reply) {
        session.take_screenshot(reply);
    }
}
