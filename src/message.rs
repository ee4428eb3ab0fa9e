//! Height-update messages exchanged across the surface boundary.
//!
//! The embedded surface posts `{ "type": "resize-iframe", "height": N }` to
//! its parent with a `*` target origin. The host window also receives
//! unrelated messages on the same channel, so decoding is permissive: anything
//! that is not a well-formed height update decodes to `None`.

use serde::Serialize;
use serde_json::Value;

/// Discriminator tag carried by every height update.
pub const MESSAGE_TYPE: &str = "resize-iframe";

/// A content-height notification from an embedded surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "resize-iframe")]
pub struct HeightUpdate {
    /// Content height in CSS pixels.
    pub height: u32,
}

impl HeightUpdate {
    pub fn new(height: u32) -> Self {
        Self { height }
    }

    /// Decode a message payload. Returns `None` for anything that is not a
    /// height update with a usable height.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.get("type").and_then(Value::as_str) != Some(MESSAGE_TYPE) {
            return None;
        }
        let height = obj.get("height").and_then(Value::as_f64)?;
        if !height.is_finite() || height < 0.0 || height > f64::from(u32::MAX) {
            return None;
        }
        Some(Self::new(height.round() as u32))
    }

    /// JSON payload as posted by the embedded surface.
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "type": MESSAGE_TYPE, "height": self.height })
    }
}

/// Decode a raw JSON string under the same rules as [`HeightUpdate::from_value`].
pub fn parse_message(raw: &str) -> Option<HeightUpdate> {
    let value: Value = serde_json::from_str(raw).ok()?;
    HeightUpdate::from_value(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_wire_shape() {
        let raw = serde_json::to_string(&HeightUpdate::new(420)).unwrap();
        assert_eq!(raw, r#"{"type":"resize-iframe","height":420}"#);
        assert_eq!(
            HeightUpdate::new(420).to_value(),
            json!({"type": "resize-iframe", "height": 420})
        );
    }

    #[test]
    fn test_decodes_valid_message() {
        let msg = json!({"type": "resize-iframe", "height": 512});
        assert_eq!(HeightUpdate::from_value(&msg), Some(HeightUpdate::new(512)));
    }

    #[test]
    fn test_rounds_fractional_height() {
        let msg = json!({"type": "resize-iframe", "height": 99.6});
        assert_eq!(HeightUpdate::from_value(&msg), Some(HeightUpdate::new(100)));
    }

    #[test]
    fn test_ignores_foreign_and_malformed_messages() {
        let cases = [
            json!(null),
            json!("resize-iframe"),
            json!({"height": 100}),
            json!({"type": "something-else", "height": 100}),
            json!({"type": "resize-iframe"}),
            json!({"type": "resize-iframe", "height": "100"}),
            json!({"type": "resize-iframe", "height": -4}),
            json!({"type": "resize-iframe", "height": null}),
        ];
        for case in &cases {
            assert_eq!(HeightUpdate::from_value(case), None, "should ignore {}", case);
        }
    }

    #[test]
    fn test_parse_message_rejects_invalid_json() {
        assert_eq!(parse_message("{not json"), None);
        assert_eq!(
            parse_message(r#"{"type":"resize-iframe","height":7}"#),
            Some(HeightUpdate::new(7))
        );
    }
}
