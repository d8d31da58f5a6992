//! Gateway RPC protocol definitions.
//!
//! All communication uses JSON frames. Frame types:
//! - `RequestFrame`  — client → gateway RPC call
//! - `ResponseFrame` — gateway → client RPC result

use serde::{Deserialize, Serialize};

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    /// Schema validation failure, missing `id`, infeasible schedule.
    pub const INVALID_REQUEST: &str = "invalid_request";
    /// Crontab I/O failure or unexpected exception.
    pub const INTERNAL_ERROR: &str = "internal_error";
}

// ── Error shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }
}

impl std::fmt::Display for ErrorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorShape {}

impl From<serde_json::Error> for ErrorShape {
    fn from(e: serde_json::Error) -> Self {
        Self::internal_error(e.to_string())
    }
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Client → gateway RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub r#type: String, // always "req"
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// Gateway → client RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub r#type: String, // always "res"
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            r#type: "res".into(),
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: ErrorShape) -> Self {
        Self {
            r#type: "res".into(),
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_shape_serializes_code_and_message() {
        let err = ErrorShape::invalid_request("bad schedule");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["code"], "invalid_request");
        assert_eq!(v["message"], "bad schedule");
        assert!(v.get("details").is_none());
    }

    #[test]
    fn response_frame_ok() {
        let frame = ResponseFrame::ok("r1", serde_json::json!({"jobs": []}));
        assert!(frame.ok);
        assert!(frame.error.is_none());
        let v = serde_json::to_value(&frame).unwrap();
        assert_eq!(v["type"], "res");
        assert_eq!(v["id"], "r1");
    }

    #[test]
    fn response_frame_err() {
        let frame = ResponseFrame::err("r2", ErrorShape::internal_error("crontab write failed"));
        assert!(!frame.ok);
        assert_eq!(frame.error.unwrap().code, "internal_error");
    }

    #[test]
    fn request_frame_roundtrip() {
        let json = r#"{"type":"req","id":"1","method":"cron.list","params":{"limit":10}}"#;
        let frame: RequestFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.method, "cron.list");
        let back = serde_json::to_string(&frame).unwrap();
        let again: RequestFrame = serde_json::from_str(&back).unwrap();
        assert_eq!(again.id, "1");
    }
}
