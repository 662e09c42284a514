use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodecError, CodecResult};

/// On-disk representation of a stored value.
///
/// Built on every write, consumed on every read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredEnvelope<T> {
    /// The original value.
    pub value: T,
}

impl<T> StoredEnvelope<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Unwrap the value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

// Borrowing twin of `StoredEnvelope` so encoding never clones the value.
#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    value: &'a T,
}

/// Wrap `value` in an envelope and produce its transport string.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CodecResult<String> {
    serde_json::to_string(&EnvelopeRef { value }).map_err(CodecError::Serialization)
}

/// Parse envelope text and return the value it carries.
pub fn decode<T: DeserializeOwned>(raw: &str) -> CodecResult<T> {
    serde_json::from_str::<StoredEnvelope<T>>(raw)
        .map(StoredEnvelope::into_inner)
        .map_err(CodecError::Deserialization)
}

/// Parse envelope text into an untyped JSON value.
pub fn decode_value(raw: &str) -> CodecResult<Value> {
    decode::<Value>(raw)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Token {
        id: u32,
        scopes: Vec<String>,
    }

    #[test]
    fn wire_format_is_value_object() {
        assert_eq!(encode(&42).unwrap(), r#"{"value":42}"#);
        assert_eq!(encode(&Value::Null).unwrap(), r#"{"value":null}"#);
        assert_eq!(encode("").unwrap(), r#"{"value":""}"#);
    }

    #[test]
    fn null_survives_round_trip() {
        let raw = encode(&Value::Null).unwrap();
        assert_eq!(decode_value(&raw).unwrap(), Value::Null);

        let none: Option<u32> = None;
        let raw = encode(&none).unwrap();
        assert_eq!(decode::<Option<u32>>(&raw).unwrap(), None);
    }

    #[test]
    fn falsy_scalars_round_trip() {
        assert_eq!(decode::<i64>(&encode(&0).unwrap()).unwrap(), 0);
        assert_eq!(decode::<String>(&encode("").unwrap()).unwrap(), "");
        assert!(!decode::<bool>(&encode(&false).unwrap()).unwrap());
    }

    #[test]
    fn typed_struct_round_trip() {
        let token = Token {
            id: 7,
            scopes: vec!["read".into(), "write".into()],
        };
        let raw = encode(&token).unwrap();
        assert_eq!(decode::<Token>(&raw).unwrap(), token);
    }

    #[test]
    fn non_string_map_keys_fail_to_encode() {
        let mut map = HashMap::new();
        map.insert(vec![1u8, 2], "bytes as key");
        let err = encode(&map).unwrap_err();
        assert!(matches!(err, CodecError::Serialization(_)));
    }

    #[test]
    fn malformed_text_fails_to_decode() {
        for raw in ["", "{", "not json", "[1,2,3]", r#"{"val":1}"#] {
            let err = decode_value(raw).unwrap_err();
            assert!(
                matches!(err, CodecError::Deserialization(_)),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn unknown_envelope_fields_are_corruption() {
        let err = decode_value(r#"{"value":1,"extra":true}"#).unwrap_err();
        assert!(matches!(err, CodecError::Deserialization(_)));
    }

    #[test]
    fn raw_scalar_is_not_an_envelope() {
        // A bare serialized scalar written by some other tool.
        assert!(decode::<i64>("42").is_err());
    }

    #[test]
    fn envelope_wraps_and_unwraps() {
        let env = StoredEnvelope::new(json!({"id": 7}));
        assert_eq!(env.into_inner(), json!({"id": 7}));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{0,6}", inner, 0..8)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(v in arb_json()) {
            let raw = encode(&v).unwrap();
            prop_assert_eq!(decode_value(&raw).unwrap(), v);
        }
    }
}
