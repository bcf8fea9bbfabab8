//! Arbitrary-precision integers carried as bytes or decimal text.

use std::str::FromStr;

use num_bigint::BigInt;
use serde_json::Value;

use crate::error::{ConversionError, SchemaError};
use crate::schema::{Properties, SchemaType};
use crate::value::AvroValue;

use super::LogicalTarget;

const NAME: &str = "bigint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Unbound,
    Bytes,
    String,
}

/// The `bigint` logical type.
///
/// The optional `precision` caps the encoded length: bytes for the bytes
/// encoding, characters for the string encoding. It is checked on write only.
#[derive(Debug, Clone)]
pub struct BigIntegerType {
    precision: Option<usize>,
    declared: Properties,
    encoding: Encoding,
}

impl BigIntegerType {
    pub fn from_props(props: &Properties) -> Result<Self, SchemaError> {
        let precision = match props.get("precision") {
            None => None,
            Some(v) => Some(
                v.as_u64()
                    .filter(|p| *p > 0)
                    .map(|p| p as usize)
                    .ok_or_else(|| SchemaError::InvalidLogicalType {
                        logical_type: NAME.to_string(),
                        reason: format!("precision must be a positive integer, found {}", v),
                    })?,
            ),
        };
        let mut declared = Properties::new();
        if let Some(p) = props.get("precision") {
            declared.insert("precision".into(), p.clone());
        }
        Ok(Self {
            precision,
            declared,
            encoding: Encoding::Unbound,
        })
    }

    pub fn new(precision: Option<usize>) -> Self {
        let mut declared = Properties::new();
        if let Some(p) = precision {
            declared.insert("precision".into(), Value::from(p));
        }
        Self {
            precision,
            declared,
            encoding: Encoding::Unbound,
        }
    }

    pub(crate) fn declared(&self) -> &Properties {
        &self.declared
    }

    pub(crate) fn bind(mut self, target: &LogicalTarget) -> Result<Self, SchemaError> {
        self.encoding = match target.schema_type {
            SchemaType::Bytes => Encoding::Bytes,
            SchemaType::String => Encoding::String,
            _ => return Err(target.reject(NAME, "bytes or string")),
        };
        Ok(self)
    }

    fn check_length(&self, len: usize) -> Result<(), ConversionError> {
        match self.precision {
            Some(max) if len > max => Err(ConversionError::PrecisionExceeded {
                received: len as u64,
                max: max as u64,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        let int = match value {
            AvroValue::BigInteger(i) => i,
            other => return Ok(other.clone()),
        };
        match self.encoding {
            Encoding::Bytes => {
                let bytes = int.to_signed_bytes_be();
                self.check_length(bytes.len())?;
                Ok(AvroValue::Bytes(bytes))
            }
            Encoding::String => {
                let text = int.to_string();
                self.check_length(text.len())?;
                Ok(AvroValue::String(text))
            }
            Encoding::Unbound => Err(ConversionError::invalid(
                NAME,
                "logical type is not attached to a schema",
            )),
        }
    }

    pub(crate) fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        match (self.encoding, value) {
            (_, AvroValue::BigInteger(i)) => Ok(AvroValue::BigInteger(i)),
            (Encoding::Bytes, AvroValue::Bytes(bytes)) => {
                Ok(AvroValue::BigInteger(BigInt::from_signed_bytes_be(&bytes)))
            }
            (Encoding::String, AvroValue::String(text)) => BigInt::from_str(text.trim())
                .map(AvroValue::BigInteger)
                .map_err(|e| ConversionError::invalid(NAME, format!("'{}': {}", text, e))),
            (_, other) => Err(ConversionError::Unsupported {
                logical_type: NAME.to_string(),
                variant: other.type_name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(precision: Option<usize>, ty: SchemaType) -> BigIntegerType {
        let target = LogicalTarget {
            schema_type: ty,
            props: Properties::new(),
            fields: vec![],
            fixed_size: None,
        };
        BigIntegerType::new(precision).bind(&target).unwrap()
    }

    #[test]
    fn test_bytes_round_trip() {
        let t = bound(None, SchemaType::Bytes);
        for text in ["0", "-1", "255", "-98765432109876543210987654321"] {
            let value = AvroValue::BigInteger(BigInt::from_str(text).unwrap());
            let wire = t.to_wire(&value).unwrap();
            assert!(matches!(wire, AvroValue::Bytes(_)));
            assert_eq!(t.from_wire(wire).unwrap(), value);
        }
    }

    #[test]
    fn test_string_round_trip() {
        let t = bound(None, SchemaType::String);
        let value = AvroValue::BigInteger(BigInt::from(-42));
        let wire = t.to_wire(&value).unwrap();
        assert_eq!(wire, AvroValue::String("-42".into()));
        assert_eq!(t.from_wire(wire).unwrap(), value);
    }

    #[test]
    fn test_precision_checked_on_write_only() {
        let t = bound(Some(2), SchemaType::String);
        let err = t
            .to_wire(&AvroValue::BigInteger(BigInt::from(123)))
            .unwrap_err();
        assert_eq!(err, ConversionError::PrecisionExceeded { received: 3, max: 2 });
        assert!(t.from_wire(AvroValue::String("12345".into())).is_ok());
    }

    #[test]
    fn test_rejects_other_variants() {
        let target = LogicalTarget {
            schema_type: SchemaType::Long,
            props: Properties::new(),
            fields: vec![],
            fixed_size: None,
        };
        assert!(BigIntegerType::new(None).bind(&target).is_err());
    }
}
