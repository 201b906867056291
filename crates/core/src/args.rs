//! Argument codec: ordered opaque values as JSON array text.
//!
//! Job arguments are an ordered list of values the store never interprets.
//! They are persisted as a single nullable text column: absent arguments map
//! to SQL `NULL`, a present-but-empty list maps to `"[]"`, so the two remain
//! distinguishable after a store-then-reload cycle.

use serde_json::Value;

use crate::error::StoreError;

/// Encode job arguments for the `args` column.
pub fn encode(args: Option<&[Value]>) -> Result<Option<String>, StoreError> {
    match args {
        Some(values) => Ok(Some(serde_json::to_string(values)?)),
        None => Ok(None),
    }
}

/// Decode the `args` column back into argument values.
///
/// Empty text is treated like `NULL`: it holds no JSON document, and some
/// backends store absent text that way.
pub fn decode(text: Option<&str>) -> Result<Option<Vec<Value>>, StoreError> {
    match text {
        Some(s) if !s.is_empty() => Ok(Some(serde_json::from_str(s)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn absent_encodes_as_null() {
        assert_eq!(encode(None).unwrap(), None);
        assert_eq!(decode(None).unwrap(), None);
    }

    #[test]
    fn empty_list_stays_distinct_from_absent() {
        let encoded = encode(Some(&[])).unwrap();
        assert_eq!(encoded.as_deref(), Some("[]"));

        let decoded = decode(encoded.as_deref()).unwrap();
        assert_eq!(decoded, Some(vec![]));
    }

    #[test]
    fn mixed_values_keep_their_order() {
        let values = vec![json!("resize"), json!(1024), json!(true), json!(null)];

        let encoded = encode(Some(&values)).unwrap().unwrap();
        let decoded = decode(Some(&encoded)).unwrap().unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn malformed_text_is_an_encoding_error() {
        let err = decode(Some("{not json")).unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 _.-]{0,16}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn scalar_lists_survive_the_codec(values in proptest::collection::vec(scalar(), 0..16)) {
            let encoded = encode(Some(&values)).unwrap().unwrap();
            let decoded = decode(Some(&encoded)).unwrap().unwrap();
            prop_assert_eq!(decoded, values);
        }
    }
}
