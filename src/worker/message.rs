//! Messages exchanged between the pool and its workers.
//!
//! Every request carries an id that the reply must echo. Payloads are plain
//! JSON values; the pool only looks at them to tell success from failure.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use vbstudio_core::CompileOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    /// Request: compile the unit in the payload.
    CompileUnit,
    /// Reply: the payload is a `CompilationResult`.
    CompilationComplete,
    /// Reply: the payload is an [`ErrorPayload`].
    CompilationError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub payload: serde_json::Value,
}

impl WorkerMessage {
    pub fn new(id: impl Into<String>, kind: MessageType, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind,
            payload,
        }
    }
}

/// Payload of a `compile-unit` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileUnitPayload {
    pub unit_id: String,
    pub source: String,
    pub options: CompileOptions,
}

/// Payload of a `compilation-error` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Build a message id: `<unit id>-<unix millis>-<random base36>`.
pub fn message_id(unit_id: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis());
    let suffix: u64 = rand::random();
    format!("{}-{}-{}", unit_id, millis, to_base36(suffix))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_have_three_parts_and_differ() {
        let a = message_id("Form1");
        let b = message_id("Form1");
        assert_ne!(a, b);

        let parts: Vec<&str> = a.splitn(3, '-').collect();
        assert_eq!(parts[0], "Form1");
        assert!(parts[1].parse::<u128>().is_ok());
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u64::MAX), "3w5e11264sgsf");
    }

    #[test]
    fn wire_format() {
        let payload = json!({ "message": "boom" });
        let message = WorkerMessage::new("m-1-a", MessageType::CompilationError, payload);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "compilation-error");
        assert_eq!(value["id"], "m-1-a");

        let back: WorkerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn compile_payload_uses_camel_case() {
        let payload = CompileUnitPayload {
            unit_id: "Module1".into(),
            source: "Dim x".into(),
            options: CompileOptions::default(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["unitId"], "Module1");
        assert!(value["options"]["sourceMap"].is_boolean());
    }
}
