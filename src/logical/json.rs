//! Embedded JSON documents carried as bytes or text.

use serde_json::Value;

use crate::error::{ConversionError, SchemaError};
use crate::schema::SchemaType;
use crate::value::AvroValue;

use super::LogicalTarget;

/// Which documents an embedded JSON type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonKind {
    /// Top-level array only.
    Array,
    /// Top-level object only.
    Record,
    /// Any JSON value.
    Any,
}

impl JsonKind {
    pub fn name(self) -> &'static str {
        match self {
            JsonKind::Array => "json_array",
            JsonKind::Record => "json_record",
            JsonKind::Any => "json_any",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            JsonKind::Array => value.is_array(),
            JsonKind::Record => value.is_object(),
            JsonKind::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonType {
    kind: JsonKind,
    as_bytes: bool,
}

impl JsonType {
    pub fn new(kind: JsonKind) -> Self {
        Self {
            kind,
            as_bytes: false,
        }
    }

    pub fn kind(&self) -> JsonKind {
        self.kind
    }

    pub(crate) fn bind(mut self, target: &LogicalTarget) -> Result<Self, SchemaError> {
        self.as_bytes = match target.schema_type {
            SchemaType::Bytes => true,
            SchemaType::String => false,
            _ => return Err(target.reject(self.kind.name(), "bytes or string")),
        };
        Ok(self)
    }

    fn check(&self, value: &Value) -> Result<(), ConversionError> {
        if self.kind.accepts(value) {
            Ok(())
        } else {
            Err(ConversionError::invalid(
                self.kind.name(),
                format!("unexpected document {}", value),
            ))
        }
    }

    pub(crate) fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        let doc = match value {
            AvroValue::Json(doc) => doc,
            other => return Ok(other.clone()),
        };
        self.check(doc)?;
        let text = doc.to_string();
        Ok(if self.as_bytes {
            AvroValue::Bytes(text.into_bytes())
        } else {
            AvroValue::String(text)
        })
    }

    pub(crate) fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        let name = self.kind.name();
        let doc: Value = match value {
            AvroValue::Json(doc) => doc,
            AvroValue::Bytes(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ConversionError::invalid(name, e.to_string()))?,
            AvroValue::String(text) => serde_json::from_str(&text)
                .map_err(|e| ConversionError::invalid(name, e.to_string()))?,
            other => {
                return Err(ConversionError::Unsupported {
                    logical_type: name.to_string(),
                    variant: other.type_name().to_string(),
                })
            }
        };
        self.check(&doc)?;
        Ok(AvroValue::Json(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Properties;
    use serde_json::json;

    fn bound(kind: JsonKind, ty: SchemaType) -> JsonType {
        JsonType::new(kind)
            .bind(&LogicalTarget {
                schema_type: ty,
                props: Properties::new(),
                fields: vec![],
                fixed_size: None,
            })
            .unwrap()
    }

    #[test]
    fn test_round_trip_bytes_and_string() {
        let doc = AvroValue::Json(json!({"a": [1, 2, {"b": null}]}));
        for ty in [SchemaType::Bytes, SchemaType::String] {
            let t = bound(JsonKind::Record, ty);
            let wire = t.to_wire(&doc).unwrap();
            assert_eq!(t.from_wire(wire).unwrap(), doc);
        }
    }

    #[test]
    fn test_kind_checked() {
        let t = bound(JsonKind::Array, SchemaType::String);
        assert!(t.to_wire(&AvroValue::Json(json!({"a": 1}))).is_err());
        assert!(t.from_wire(AvroValue::String("[1]".into())).is_ok());
        assert!(t.from_wire(AvroValue::String("{".into())).is_err());
    }
}
