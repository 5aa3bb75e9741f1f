//! typed attribute values
//!
//! Clients never send bare JSON for attribute values. Every value travels as a `{type, value}` pair where `type` is
//! one of
//! - `string`
//! - `bool`
//! - `number` (64-bit integer when exact, otherwise a double)
//! - `list` (every element is itself a `{type, value}` pair)
//! - `object` (a map of names to `{type, value}` pairs)
//!
//! Any tag that is not listed above is treated as `object`.
//!
//! Decoding checks that the payload has the shape the tag promises. A mismatch is reported as [TypeMismatch] and
//! never touches a file.
use hcl::{Expression, Identifier, ObjectKey};
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serialize, Serializer,
};
use serde_json::Value as Json;

/// A decoded attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Bool(bool),
    Number(hcl::Number),
    List(Vec<TypedValue>),
    Object(IndexMap<String, TypedValue>),
}

/// A `{type, value}` pair as it appears in request bodies
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize, derive_new::new)]
pub struct Tagged {
    #[serde(rename = "type")]
    pub tag: String,
    pub value: Json,
}

impl Tagged {
    pub fn decode(&self) -> Result<TypedValue, TypeMismatch> {
        decode(&self.tag, &self.value)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("type mismatch at {path}: `{tag}` expects {expected}, found {found}")]
pub struct TypeMismatch {
    /// Location inside the submitted value, `$` being the value itself
    pub path: String,
    pub tag: String,
    pub expected: &'static str,
    pub found: &'static str,
}

/// Decode a raw JSON value according to its type tag
pub fn decode(tag: &str, raw: &Json) -> Result<TypedValue, TypeMismatch> {
    decode_at(tag, raw, "$")
}

fn decode_at(tag: &str, raw: &Json, path: &str) -> Result<TypedValue, TypeMismatch> {
    let mismatch = |expected: &'static str| TypeMismatch {
        path: path.to_owned(),
        tag: tag.to_owned(),
        expected,
        found: json_kind(raw),
    };

    match (tag, raw) {
        ("string", Json::String(string)) => Ok(TypedValue::String(string.clone())),
        ("string", _) => Err(mismatch("a string")),
        ("bool", Json::Bool(bool)) => Ok(TypedValue::Bool(*bool)),
        ("bool", _) => Err(mismatch("a boolean")),
        ("number", Json::Number(number)) => to_hcl_number(number)
            .map(TypedValue::Number)
            .ok_or_else(|| mismatch("a number within the 64-bit range")),
        ("number", _) => Err(mismatch("a number")),
        ("list", Json::Array(elements)) => elements
            .iter()
            .enumerate()
            .map(|(index, element)| decode_tagged(element, &format!("{path}[{index}]")))
            .collect::<Result<_, _>>()
            .map(TypedValue::List),
        ("list", _) => Err(mismatch("an array")),
        (_, Json::Object(entries)) => entries
            .iter()
            .map(|(key, element)| {
                decode_tagged(element, &format!("{path}.{key}")).map(|value| (key.clone(), value))
            })
            .collect::<Result<_, _>>()
            .map(TypedValue::Object),
        _ => Err(mismatch("an object")),
    }
}

/// Decode a nested `{type, value}` pair
fn decode_tagged(raw: &Json, path: &str) -> Result<TypedValue, TypeMismatch> {
    let tag = raw.get("type").and_then(Json::as_str);
    match (tag, raw.get("value")) {
        (Some(tag), Some(value)) => decode_at(tag, value, path),
        _ => Err(TypeMismatch {
            path: path.to_owned(),
            tag: "element".to_owned(),
            expected: "a `{type, value}` pair",
            found: json_kind(raw),
        }),
    }
}

/// `None` for non-finite numbers and for whole numbers beyond both `i64` and `u64`
fn to_hcl_number(number: &serde_json::Number) -> Option<hcl::Number> {
    if let Some(int) = number.as_i64() {
        return Some(int.into());
    }
    if let Some(uint) = number.as_u64() {
        return Some(uint.into());
    }

    let float = number.as_f64().filter(|float| float.is_finite())?;
    if float.fract() != 0.0 {
        return hcl::Number::from_f64(float);
    }

    // whole numbers written as floats (`1e3`) become integers, outside of i64/u64 they would be clamped
    if (I64_MIN..I64_MAX_EXCLUSIVE).contains(&float) {
        Some((float as i64).into())
    } else if (0.0..U64_MAX_EXCLUSIVE).contains(&float) {
        Some((float as u64).into())
    } else {
        None
    }
}

const I64_MIN: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_EXCLUSIVE: f64 = 9_223_372_036_854_775_808.0;
const U64_MAX_EXCLUSIVE: f64 = 18_446_744_073_709_551_616.0;

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

impl From<TypedValue> for Expression {
    fn from(value: TypedValue) -> Self {
        match value {
            TypedValue::String(string) => Expression::String(string),
            TypedValue::Bool(bool) => Expression::Bool(bool),
            TypedValue::Number(number) => Expression::Number(number),
            TypedValue::List(elements) => {
                Expression::Array(elements.into_iter().map(Into::into).collect())
            }
            TypedValue::Object(entries) => Expression::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (object_key(key), value.into()))
                    .collect(),
            ),
        }
    }
}

/// Keys that are valid identifiers are written bare, all others quoted
fn object_key(key: String) -> ObjectKey {
    match Identifier::new(key.as_str()) {
        Ok(ident) => ObjectKey::Identifier(ident),
        Err(_) => ObjectKey::Expression(Expression::String(key)),
    }
}

impl From<TypedValue> for hcl_edit::expr::Expression {
    fn from(value: TypedValue) -> Self {
        Expression::from(value).into()
    }
}

/// Plain JSON, the shape an evaluated attribute has in a graph snapshot
impl Serialize for TypedValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TypedValue::Bool(value) => serializer.serialize_bool(*value),
            TypedValue::Number(value) => value.serialize(serializer),
            TypedValue::String(value) => serializer.serialize_str(value),
            TypedValue::List(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            TypedValue::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn scalars() {
        assert_eq!(
            decode("string", &json!("eu-west-1")),
            Ok(TypedValue::String("eu-west-1".into()))
        );
        assert_eq!(decode("bool", &json!(true)), Ok(TypedValue::Bool(true)));
        assert_eq!(
            decode("number", &json!(2)),
            Ok(TypedValue::Number(2i64.into()))
        );
        assert_eq!(
            decode("number", &json!(0.25)),
            Ok(TypedValue::Number(hcl::Number::from_f64(0.25).unwrap()))
        );
        assert_eq!(
            decode("number", &json!(u64::MAX)),
            Ok(TypedValue::Number(u64::MAX.into()))
        );

        let whole_floats: [(&str, hcl::Number); 3] = [
            ("1e3", 1000i64.into()),
            ("-9.223372036854775808e18", i64::MIN.into()),
            ("1e19", 10_000_000_000_000_000_000u64.into()),
        ];
        for (literal, expected) in whole_floats {
            let raw: Json = serde_json::from_str(literal).unwrap();
            assert_eq!(decode("number", &raw), Ok(TypedValue::Number(expected)), "{literal}");
        }
    }

    #[test]
    fn mismatch_is_an_error() {
        let err = decode("number", &json!("2")).unwrap_err();
        assert_eq!(err.path, "$");
        assert_eq!(err.tag, "number");
        assert_eq!(err.found, "a string");

        assert!(decode("bool", &json!("true")).is_err());
        assert!(decode("string", &json!(null)).is_err());
        assert!(decode("list", &json!({})).is_err());
        assert!(decode("object", &json!([])).is_err());

        for literal in ["1e20", "18446744073709551616", "1.5e300", "-1e19", "123456789012345678901234567890"] {
            let raw: Json = serde_json::from_str(literal).unwrap();
            let err = decode("number", &raw).unwrap_err();
            assert_eq!(
                (err.expected, err.found),
                ("a number within the 64-bit range", "a number"),
                "{literal}"
            );
        }
    }

    #[test]
    fn nested_values() {
        let raw = json!({
            "name": {"type": "string", "value": "web"},
            "ports": {"type": "list", "value": [
                {"type": "number", "value": 80},
                {"type": "number", "value": 443}
            ]}
        });

        let value = decode("object", &raw).unwrap();

        let expected = TypedValue::Object(IndexMap::from([
            ("name".to_string(), TypedValue::String("web".into())),
            (
                "ports".to_string(),
                TypedValue::List(vec![
                    TypedValue::Number(80i64.into()),
                    TypedValue::Number(443i64.into()),
                ]),
            ),
        ]));
        assert_eq!(value, expected);
    }

    #[test]
    fn object_keeps_submitted_order() {
        let raw = json!({
            "zeta": {"type": "bool", "value": true},
            "alpha": {"type": "bool", "value": false}
        });

        let TypedValue::Object(entries) = decode("object", &raw).unwrap() else {
            panic!("expected an object");
        };
        assert_eq!(entries.keys().collect::<Vec<_>>(), ["zeta", "alpha"]);
    }

    #[test]
    fn unknown_tag_is_an_object() {
        let raw = json!({"enabled": {"type": "bool", "value": true}});
        assert!(matches!(
            decode("map", &raw),
            Ok(TypedValue::Object(entries)) if entries.len() == 1
        ));
    }

    #[test]
    fn nested_mismatch_reports_path() {
        let raw = json!([
            {"type": "string", "value": "a"},
            {"type": "string", "value": 1}
        ]);
        let err = decode("list", &raw).unwrap_err();
        assert_eq!(err.path, "$[1]");

        let err = decode("list", &json!(["untagged"])).unwrap_err();
        assert_eq!(err.path, "$[0]");
        assert_eq!(err.found, "a string");
    }

    #[test]
    fn to_expression() {
        let value = decode(
            "object",
            &json!({
                "Name": {"type": "string", "value": "web"},
                "not an identifier": {"type": "bool", "value": true}
            }),
        )
        .unwrap();

        let Expression::Object(object) = Expression::from(value) else {
            panic!("expected an object expression");
        };
        let keys: Vec<_> = object.keys().cloned().collect();
        assert_eq!(
            keys,
            [
                ObjectKey::Identifier(Identifier::new("Name").unwrap()),
                ObjectKey::Expression(Expression::String("not an identifier".into())),
            ]
        );
    }

    /// decode, write into a document, serialize, parse again and compare with the plain JSON value
    #[test]
    fn round_trip_through_document() {
        let cases = [
            ("string", json!("with \"quotes\"\nand a newline")),
            ("bool", json!(false)),
            ("number", json!(42)),
            ("number", json!(-7.5)),
            (
                "list",
                json!([{"type": "string", "value": "a"}, {"type": "bool", "value": true}]),
            ),
            (
                "object",
                json!({"size": {"type": "number", "value": 3}, "tags": {"type": "list", "value": []}}),
            ),
        ];

        for (tag, raw) in cases {
            let value = decode(tag, &raw).unwrap();
            let expected = serde_json::to_value(&value).unwrap();

            let body = hcl::Body::builder()
                .add_attribute(hcl::Attribute::new(
                    Identifier::new("attr").unwrap(),
                    Expression::from(value),
                ))
                .build();
            let rendered = hcl::format::to_string(&body).unwrap();

            let parsed: serde_json::Value = hcl::from_str(&rendered).unwrap();
            assert_eq!(parsed["attr"], expected, "{tag} via {rendered}");
        }
    }
}
