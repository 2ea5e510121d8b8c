//! Serialization codec for the native boundary.
//!
//! Native methods receive and return bare JSON payloads; the operation is
//! implied by which method is called. The codec strips the operation tag
//! from outgoing requests and re-attaches it to incoming responses before
//! decoding them into the domain's typed response enum.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CodecError;
use crate::operation::{Capability, OperationKind};

/// Tag field of request and response enums.
pub const TAG_FIELD: &str = "operation";
/// Content field of request and response enums.
pub const CONTENT_FIELD: &str = "payload";

/// JSON codec used on the native boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Encode any serializable value.
    pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::Serialize)
    }

    /// Decode a payload into `T`, failing on malformed or mis-shaped input.
    pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError> {
        let value: Value = serde_json::from_str(payload).map_err(CodecError::Malformed)?;
        serde_json::from_value(value).map_err(|source| CodecError::Shape {
            operation: std::any::type_name::<T>().to_string(),
            source,
        })
    }

    /// Encode the bare payload of a request for its native method.
    pub fn encode_request<C: Capability>(request: &C::Request) -> Result<String, CodecError> {
        let body = Self::payload_of(request)?;
        serde_json::to_string(&body).map_err(CodecError::Serialize)
    }

    /// Decode a native method's bare response payload for `operation`.
    pub fn decode_response<C: Capability>(
        operation: C::Operation,
        payload: &str,
    ) -> Result<C::Response, CodecError> {
        let body: Value = serde_json::from_str(payload).map_err(CodecError::Malformed)?;
        Self::from_parts::<C::Response>(operation.name(), body)
    }

    /// Build a typed request from an operation and its JSON payload.
    pub fn request_from_parts<C: Capability>(
        operation: C::Operation,
        payload: Value,
    ) -> Result<C::Request, CodecError> {
        Self::from_parts::<C::Request>(operation.name(), payload)
    }

    /// Bare payload of a tagged request or response value.
    pub fn payload_of<T: Serialize>(value: &T) -> Result<Value, CodecError> {
        match serde_json::to_value(value).map_err(CodecError::Serialize)? {
            Value::Object(mut map) => Ok(map.remove(CONTENT_FIELD).unwrap_or(Value::Null)),
            _ => Err(CodecError::NotTagged),
        }
    }

    fn from_parts<T: DeserializeOwned>(operation: &str, payload: Value) -> Result<T, CodecError> {
        let mut map = Map::with_capacity(2);
        map.insert(TAG_FIELD.to_string(), Value::String(operation.to_string()));
        map.insert(CONTENT_FIELD.to_string(), payload);
        serde_json::from_value(Value::Object(map)).map_err(|source| CodecError::Shape {
            operation: operation.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(tag = "operation", content = "payload")]
    enum Heartbeat {
        #[serde(rename = "ping")]
        Ping(PingBody),
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct PingBody {
        host_name: String,
    }

    #[test]
    fn test_payload_strips_tag() {
        let heartbeat = Heartbeat::Ping(PingBody {
            host_name: "edge-01".into(),
        });
        let body = JsonCodec::payload_of(&heartbeat).unwrap();
        assert_eq!(body, serde_json::json!({"hostName": "edge-01"}));
    }

    #[test]
    fn test_from_parts_restores_tag() {
        let heartbeat: Heartbeat =
            JsonCodec::from_parts("ping", serde_json::json!({"hostName": "edge-01"})).unwrap();
        assert_eq!(
            heartbeat,
            Heartbeat::Ping(PingBody {
                host_name: "edge-01".into()
            })
        );
    }

    #[test]
    fn test_decode_malformed() {
        let err = JsonCodec::decode::<PingBody>("{not json").unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn test_decode_wrong_shape() {
        let err = JsonCodec::decode::<PingBody>(r#"{"host": 3}"#).unwrap_err();
        assert!(matches!(err, CodecError::Shape { .. }));

        let err =
            JsonCodec::from_parts::<Heartbeat>("ping", serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, CodecError::Shape { .. }));
    }

    #[test]
    fn test_untagged_value_rejected() {
        let err = JsonCodec::payload_of(&42).unwrap_err();
        assert!(matches!(err, CodecError::NotTagged));
    }
}
