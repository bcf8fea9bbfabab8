//! Self-describing payloads.
//!
//! The `any` logical type sits on a record of two fields: `avsc`, the JSON
//! text of a schema, and `content`, a value binary-encoded under that schema.
//! Values written without an explicit schema get one from a
//! [`SchemaInference`] collaborator.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::datum;
use crate::error::{ConversionError, SchemaError};
use crate::schema::{Schema, SchemaType};
use crate::value::{AnyValue, AvroValue};

use super::LogicalTarget;

const NAME: &str = "any";
const SCHEMA_FIELD: &str = "avsc";
const CONTENT_FIELD: &str = "content";

/// Derives a schema for a value that carries none.
pub trait SchemaInference: fmt::Debug + Send + Sync {
    fn infer(&self, value: &AvroValue) -> Result<Schema, ConversionError>;
}

/// Infers schemas for primitives, the string-backed and numeric built-in
/// logical values, and arrays and maps of those (typed by their first
/// element). Records, enums, fixed and unions need an explicit schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicSchemaInference;

impl BasicSchemaInference {
    fn describe(&self, value: &AvroValue) -> Result<Value, ConversionError> {
        Ok(match value {
            AvroValue::Null => json!("null"),
            AvroValue::Boolean(_) => json!("boolean"),
            AvroValue::Int(_) => json!("int"),
            AvroValue::Long(_) => json!("long"),
            AvroValue::Float(_) => json!("float"),
            AvroValue::Double(_) => json!("double"),
            AvroValue::Bytes(_) => json!("bytes"),
            AvroValue::String(_) => json!("string"),
            AvroValue::Decimal(_) => json!({"type": "string", "logicalType": "decimal"}),
            AvroValue::BigInteger(_) => json!({"type": "string", "logicalType": "bigint"}),
            AvroValue::Date(_) => json!({"type": "int", "logicalType": "date"}),
            AvroValue::YearMonth(_) => json!({"type": "string", "logicalType": "year-month"}),
            AvroValue::Instant(_) => json!({"type": "long", "logicalType": "instant"}),
            AvroValue::Uuid(_) => json!({"type": "string", "logicalType": "uuid"}),
            AvroValue::Url(_) => json!({"type": "string", "logicalType": "url"}),
            AvroValue::Uri(_) => json!({"type": "string", "logicalType": "uri"}),
            AvroValue::Json(_) => json!({"type": "string", "logicalType": "json_any"}),
            AvroValue::Array(items) => {
                let items = match items.first() {
                    Some(first) => self.describe(first)?,
                    None => json!("null"),
                };
                json!({"type": "array", "items": items})
            }
            AvroValue::Map(entries) => {
                let values = match entries.first() {
                    Some((_, first)) => self.describe(first)?,
                    None => json!("null"),
                };
                json!({"type": "map", "values": values})
            }
            other => {
                return Err(ConversionError::Unsupported {
                    logical_type: NAME.to_string(),
                    variant: other.type_name().to_string(),
                })
            }
        })
    }
}

impl SchemaInference for BasicSchemaInference {
    fn infer(&self, value: &AvroValue) -> Result<Schema, ConversionError> {
        let described = self.describe(value)?;
        Schema::parse(&described.to_string())
            .map_err(|e| ConversionError::invalid(NAME, e.to_string()))
    }
}

/// The `any` logical type.
///
/// The record carries exactly two fields on the wire: `avsc` (string) and
/// `content` (bytes).
#[derive(Debug, Clone)]
pub struct AnyType {
    inference: Arc<dyn SchemaInference>,
    // (schema text position, content position, field names in order)
    layout: Option<(usize, usize, Vec<String>)>,
}

impl AnyType {
    pub fn new(inference: Arc<dyn SchemaInference>) -> Self {
        Self {
            inference,
            layout: None,
        }
    }

    pub(crate) fn bind(mut self, target: &LogicalTarget) -> Result<Self, SchemaError> {
        if target.schema_type != SchemaType::Record {
            return Err(target.reject(NAME, "record"));
        }
        let schema = target.field_position(SCHEMA_FIELD, SchemaType::String);
        let content = target.field_position(CONTENT_FIELD, SchemaType::Bytes);
        match (schema, content) {
            (Some(schema), Some(content)) if target.fields.len() == 2 => {
                let names = target.fields.iter().map(|(n, _)| n.clone()).collect();
                self.layout = Some((schema, content, names));
                Ok(self)
            }
            _ => Err(SchemaError::InvalidLogicalType {
                logical_type: NAME.to_string(),
                reason: format!(
                    "requires a record with fields '{}' (string) and '{}' (bytes)",
                    SCHEMA_FIELD, CONTENT_FIELD
                ),
            }),
        }
    }

    fn layout(&self) -> Result<&(usize, usize, Vec<String>), ConversionError> {
        self.layout
            .as_ref()
            .ok_or_else(|| ConversionError::invalid(NAME, "logical type is not attached to a schema"))
    }

    pub(crate) fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        let any = match value {
            AvroValue::Any(any) => any,
            other => return Ok(other.clone()),
        };
        let (schema_pos, _, names) = self.layout()?;
        let schema = match &any.schema {
            Some(schema) => schema.clone(),
            None => self.inference.infer(&any.value)?,
        };
        let content = datum::to_binary(&any.value, &schema)
            .map_err(|e| ConversionError::invalid(NAME, e.to_string()))?;
        let fields = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = if i == *schema_pos {
                    AvroValue::String(schema.to_json())
                } else {
                    AvroValue::Bytes(content.clone())
                };
                (name.clone(), value)
            })
            .collect();
        Ok(AvroValue::Record(fields))
    }

    pub(crate) fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        let (schema_pos, content_pos, _) = self.layout()?;
        let fields = match value {
            AvroValue::Any(any) => return Ok(AvroValue::Any(any)),
            AvroValue::Record(fields) => fields,
            other => {
                return Err(ConversionError::Unsupported {
                    logical_type: NAME.to_string(),
                    variant: other.type_name().to_string(),
                })
            }
        };
        let text = match fields.get(*schema_pos) {
            Some((_, AvroValue::String(text))) => text,
            _ => return Err(ConversionError::invalid(NAME, "schema text is missing")),
        };
        let content = match fields.get(*content_pos) {
            Some((_, AvroValue::Bytes(bytes))) => bytes,
            _ => return Err(ConversionError::invalid(NAME, "content is missing")),
        };
        let schema =
            Schema::parse(text).map_err(|e| ConversionError::invalid(NAME, e.to_string()))?;
        let value = datum::from_binary(content, &schema)
            .map_err(|e| ConversionError::invalid(NAME, e.to_string()))?;
        Ok(AvroValue::Any(Box::new(AnyValue {
            schema: Some(schema),
            value,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Properties;
    use chrono::NaiveDate;

    fn bound() -> AnyType {
        AnyType::new(Arc::new(BasicSchemaInference))
            .bind(&LogicalTarget {
                schema_type: SchemaType::Record,
                props: Properties::new(),
                fields: vec![
                    ("avsc".into(), SchemaType::String),
                    ("content".into(), SchemaType::Bytes),
                ],
                fixed_size: None,
            })
            .unwrap()
    }

    #[test]
    fn test_inferred_round_trip() {
        let t = bound();
        let value = AvroValue::Array(vec![AvroValue::Long(1), AvroValue::Long(-7)]);
        let wire = t
            .to_wire(&AvroValue::Any(Box::new(AnyValue {
                schema: None,
                value: value.clone(),
            })))
            .unwrap();
        assert_eq!(
            wire.field("avsc"),
            Some(&AvroValue::String(r#"{"type":"array","items":"long"}"#.into()))
        );
        match t.from_wire(wire).unwrap() {
            AvroValue::Any(any) => assert_eq!(any.value, value),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_logical_value_inferred() {
        let t = bound();
        let date = AvroValue::Date(NaiveDate::from_ymd_opt(2020, 5, 17).unwrap());
        let wire = t
            .to_wire(&AvroValue::Any(Box::new(AnyValue {
                schema: None,
                value: date.clone(),
            })))
            .unwrap();
        match t.from_wire(wire).unwrap() {
            AvroValue::Any(any) => assert_eq!(any.value, date),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_records_need_schema() {
        let err = BasicSchemaInference
            .infer(&AvroValue::Record(vec![]))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Unsupported { .. }));
    }

    #[test]
    fn test_layout_checked() {
        let target = LogicalTarget {
            schema_type: SchemaType::Record,
            props: Properties::new(),
            fields: vec![("avsc".into(), SchemaType::String)],
            fixed_size: None,
        };
        assert!(AnyType::new(Arc::new(BasicSchemaInference))
            .bind(&target)
            .is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let target = LogicalTarget {
            schema_type: SchemaType::Record,
            props: Properties::new(),
            fields: vec![
                ("schema-text".into(), SchemaType::String),
                ("content-bytes".into(), SchemaType::Bytes),
            ],
            fixed_size: None,
        };
        let err = AnyType::new(Arc::new(BasicSchemaInference))
            .bind(&target)
            .unwrap_err();
        assert!(
            matches!(err, SchemaError::InvalidLogicalType { ref reason, .. }
                if reason.contains("'avsc'") && reason.contains("'content'"))
        );
    }
}
