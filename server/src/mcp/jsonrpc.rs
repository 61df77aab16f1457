//! JSON-RPC 2.0 message model.
//!
//! Every inbound payload goes through [`JsonRpcMessage::from_value`], which
//! checks the envelope shape before anything is handed to the dispatcher.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Reasons a payload is not a JSON-RPC message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Body is not valid JSON: {0}")]
    Parse(String),

    #[error("Message must be a JSON object")]
    NotAnObject,

    #[error("Unsupported or missing jsonrpc version (expected \"2.0\")")]
    Version,

    #[error("Field 'method' must be a string")]
    Method,

    #[error("Field 'id' must be a string or an integer")]
    Id,

    #[error("Field 'params' must be an object or an array")]
    Params,

    #[error("Field 'error' must contain an integer 'code' and a string 'message'")]
    ErrorObject,

    #[error("Message is neither a request, a notification nor a response")]
    Shape,
}

impl ProtocolError {
    /// JSON-RPC error code describing this rejection.
    pub fn code(&self) -> i64 {
        match self {
            ProtocolError::Parse(_) => codes::PARSE_ERROR,
            _ => codes::INVALID_REQUEST,
        }
    }
}

/// Request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcNotification {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub id: RequestId,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcErrorResponse {
    /// `None` only when the failing request's id could not be determined.
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

/// Any JSON-RPC 2.0 message.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcErrorResponse),
}

impl JsonRpcMessage {
    /// Parse and validate a raw body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ProtocolError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(ProtocolError::Version);
        }

        let id = match object.remove("id") {
            None => None,
            // Error responses may carry a null id when the request could not be read.
            Some(Value::Null) if object.contains_key("error") => None,
            Some(value) => Some(parse_id(value)?),
        };

        if let Some(method) = object.remove("method") {
            let Value::String(method) = method else {
                return Err(ProtocolError::Method);
            };
            let params = parse_params(&mut object)?;
            return Ok(match id {
                Some(id) => JsonRpcMessage::Request(JsonRpcRequest { id, method, params }),
                None => JsonRpcMessage::Notification(JsonRpcNotification { method, params }),
            });
        }

        if let Some(result) = object.remove("result") {
            let id = id.ok_or(ProtocolError::Shape)?;
            return Ok(JsonRpcMessage::Response(JsonRpcResponse { id, result }));
        }

        if let Some(error) = object.remove("error") {
            let error: JsonRpcError =
                serde_json::from_value(error).map_err(|_| ProtocolError::ErrorObject)?;
            return Ok(JsonRpcMessage::Error(JsonRpcErrorResponse { id, error }));
        }

        Err(ProtocolError::Shape)
    }

    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        JsonRpcMessage::Request(JsonRpcRequest {
            id,
            method: method.into(),
            params,
        })
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        JsonRpcMessage::Notification(JsonRpcNotification {
            method: method.into(),
            params,
        })
    }

    pub fn success(id: RequestId, result: Value) -> Self {
        JsonRpcMessage::Response(JsonRpcResponse { id, result })
    }

    pub fn error(id: Option<RequestId>, code: i64, message: impl Into<String>) -> Self {
        JsonRpcMessage::Error(JsonRpcErrorResponse {
            id,
            error: JsonRpcError {
                code,
                message: message.into(),
                data: None,
            },
        })
    }

    /// Method name for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.id),
            JsonRpcMessage::Response(r) => Some(&r.id),
            JsonRpcMessage::Error(e) => e.id.as_ref(),
            JsonRpcMessage::Notification(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut object = match self {
            JsonRpcMessage::Request(r) => to_object(r),
            JsonRpcMessage::Notification(n) => to_object(n),
            JsonRpcMessage::Response(r) => to_object(r),
            JsonRpcMessage::Error(e) => to_object(e),
        };
        object.insert(
            "jsonrpc".to_string(),
            Value::String(JSONRPC_VERSION.to_string()),
        );
        Value::Object(object)
    }
}

impl Serialize for JsonRpcMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        JsonRpcMessage::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn parse_id(value: Value) -> Result<RequestId, ProtocolError> {
    match value {
        Value::String(s) => Ok(RequestId::String(s)),
        Value::Number(n) => n.as_i64().map(RequestId::Number).ok_or(ProtocolError::Id),
        _ => Err(ProtocolError::Id),
    }
}

fn parse_params(object: &mut Map<String, Value>) -> Result<Option<Value>, ProtocolError> {
    match object.remove("params") {
        None => Ok(None),
        Some(params @ (Value::Object(_) | Value::Array(_))) => Ok(Some(params)),
        Some(_) => Err(ProtocolError::Params),
    }
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(object)) => object,
        _ => Map::new(),
    }
}
