//! Unsolicited notifications pushed to the host

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::protocol::MethodCall;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// The AR session has been configured
    Created,
    /// First tracked plane of the session
    DetectedPlanes,
    /// Touch-up over a trackable surface, in view pixels
    Tap { x: f32, y: f32 },
    /// Distance between the last two measurement points, in meters
    DistanceMeasured { distance: f32 },
}

impl HostEvent {
    /// Host-side method name
    pub fn method_name(&self) -> &'static str {
        match self {
            HostEvent::Created => "onCreated",
            HostEvent::DetectedPlanes => "onDetectedPlanes",
            HostEvent::Tap { .. } => "onTap",
            HostEvent::DistanceMeasured { .. } => "onDistanceMeasured",
        }
    }

    pub fn arguments(&self) -> Value {
        match self {
            HostEvent::Created | HostEvent::DetectedPlanes => Value::Null,
            HostEvent::Tap { x, y } => json!({ "x": x, "y": y }),
            HostEvent::DistanceMeasured { distance } => json!({ "distance": distance }),
        }
    }

    /// Encode as an outgoing method call
    pub fn to_method_call(&self) -> MethodCall {
        MethodCall::new(self.method_name(), self.arguments())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names() {
        assert_eq!(HostEvent::Created.method_name(), "onCreated");
        assert_eq!(HostEvent::DetectedPlanes.method_name(), "onDetectedPlanes");
        assert_eq!(HostEvent::Tap { x: 1.0, y: 2.0 }.method_name(), "onTap");
    }

    #[test]
    fn test_arguments() {
        assert_eq!(HostEvent::Created.arguments(), Value::Null);
        let tap = HostEvent::Tap { x: 10.0, y: 20.5 }.to_method_call();
        assert_eq!(tap.method, "onTap");
        assert_eq!(tap.arguments["x"], 10.0);
        assert_eq!(tap.arguments["y"], 20.5);

        let measured = HostEvent::DistanceMeasured { distance: 0.5 };
        assert_eq!(measured.arguments(), json!({ "distance": 0.5 }));
    }
}
