//! JSON-RPC 2.0 message model.
//!
//! Every frame read from or written to the client is one [`Message`]. The
//! three shapes are told apart by the presence of `method` and `id`:
//!
//! | `method` | `id`          | Shape          |
//! |----------|---------------|----------------|
//! | yes      | number/string | [`Request`]      |
//! | yes      | absent/null   | [`Notification`] |
//! | no       | any           | [`Response`]     |

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC request id.
///
/// The protocol allows numbers, strings and `null`; only requests carrying a
/// non-null id expect an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s:?}"),
            RequestId::Null => f.write_str("null"),
        }
    }
}

/// Error codes used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerNotInitialized,
    Other(i64),
}

impl ErrorCode {
    pub const fn code(self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ServerNotInitialized => -32002,
            ErrorCode::Other(code) => code,
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            -32002 => ErrorCode::ServerNotInitialized,
            other => ErrorCode::Other(other),
        }
    }
}

impl From<ErrorCode> for i64 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    #[serde(with = "error_code")]
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

mod error_code {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ErrorCode;

    pub fn serialize<S: Serializer>(code: &ErrorCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(code.code())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ErrorCode, D::Error> {
        i64::deserialize(deserializer).map(ErrorCode::from)
    }
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ResponseError {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("method not found: {method}"),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn server_not_initialized() -> Self {
        Self::new(ErrorCode::ServerNotInitialized, "server not initialized")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: RequestId,
    pub result: Option<Value>,
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: RequestId, error: ResponseError) -> Self {
        Response {
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
}

impl Message {
    pub fn request(id: impl Into<RequestId>, method: &str, params: Value) -> Self {
        Message::Request(Request {
            id: id.into(),
            method: method.to_string(),
            params,
        })
    }

    pub fn notification(method: &str, params: Value) -> Self {
        Message::Notification(Notification {
            method: method.to_string(),
            params,
        })
    }

    /// Method name for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(request) => Some(&request.method),
            Message::Notification(notification) => Some(&notification.method),
            Message::Response(_) => None,
        }
    }

    /// Interprets an already parsed JSON value as a message.
    pub fn from_value(value: Value) -> Result<Message, serde_json::Error> {
        let wire: WireMessage = serde_json::from_value(value)?;

        let message = match (wire.method, wire.id) {
            (Some(method), Some(id)) if id != RequestId::Null => Message::Request(Request {
                id,
                method,
                params: wire.params.unwrap_or(Value::Null),
            }),
            (Some(method), _) => Message::Notification(Notification {
                method,
                params: wire.params.unwrap_or(Value::Null),
            }),
            (None, id) => Message::Response(Response {
                id: id.unwrap_or(RequestId::Null),
                result: match wire.error {
                    Some(_) => None,
                    None => Some(wire.result.unwrap_or(Value::Null)),
                },
                error: wire.error,
            }),
        };

        Ok(message)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let wire = match self {
            Message::Request(request) => WireMessage {
                id: Some(request.id.clone()),
                method: Some(request.method.clone()),
                params: non_null(&request.params),
                ..WireMessage::default()
            },
            Message::Notification(notification) => WireMessage {
                method: Some(notification.method.clone()),
                params: non_null(&notification.params),
                ..WireMessage::default()
            },
            Message::Response(response) => WireMessage {
                id: Some(response.id.clone()),
                result: match &response.error {
                    Some(_) => None,
                    None => Some(response.result.clone().unwrap_or(Value::Null)),
                },
                error: response.error.clone(),
                ..WireMessage::default()
            },
        };

        serde_json::to_vec(&wire)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

fn non_null(params: &Value) -> Option<Value> {
    match params {
        Value::Null => None,
        other => Some(other.clone()),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    #[serde(default)]
    jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ResponseError>,
}

impl Default for WireMessage {
    fn default() -> Self {
        WireMessage {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }
}
