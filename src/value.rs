//! Generic in-memory representation of Avro data.
//!
//! [`AvroValue`] covers the physical wire shapes plus the domain values
//! produced by the built-in logical types. Encoders only ever see physical
//! shapes; logical conversion happens in the datum layer.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use num_bigint::BigInt;
use serde_json::Value;
use uuid::Uuid;

use crate::schema::Schema;

/// A calendar month without a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    /// 1 to 12.
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Months elapsed since 1970-01.
    pub fn epoch_months(&self) -> i64 {
        (self.year as i64 - 1970) * 12 + (self.month as i64 - 1)
    }

    pub fn from_epoch_months(months: i64) -> Option<Self> {
        let year = 1970 + months.div_euclid(12);
        let month = months.rem_euclid(12) as u32 + 1;
        i32::try_from(year).ok().map(|year| Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A self-describing payload: a value together with the schema it is
/// written under.
#[derive(Debug, Clone, PartialEq)]
pub struct AnyValue {
    /// Schema of `value`; inferred when absent.
    pub schema: Option<Schema>,
    pub value: AvroValue,
}

/// A decoded Avro value.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// Byte array
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Record fields in schema order
    Record(Vec<(String, AvroValue)>),
    /// Enum symbol index and name
    Enum(usize, String),
    /// Array of values
    Array(Vec<AvroValue>),
    /// Map with string keys
    Map(Vec<(String, AvroValue)>),
    /// Union branch index and value
    Union(usize, Box<AvroValue>),
    /// Fixed-size byte array
    Fixed(Vec<u8>),

    // Logical type values
    /// Arbitrary-precision decimal
    Decimal(BigDecimal),
    /// Arbitrary-precision integer
    BigInteger(BigInt),
    /// Calendar date
    Date(NaiveDate),
    /// Calendar month
    YearMonth(YearMonth),
    /// Point on the UTC time line
    Instant(DateTime<Utc>),
    /// UUID
    Uuid(Uuid),
    /// Absolute URL
    Url(url::Url),
    /// URI reference kept as text
    Uri(String),
    /// Embedded JSON document
    Json(Value),
    /// Embedded schema and value
    Any(Box<AnyValue>),
}

impl AvroValue {
    /// A short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AvroValue::Null => "null",
            AvroValue::Boolean(_) => "boolean",
            AvroValue::Int(_) => "int",
            AvroValue::Long(_) => "long",
            AvroValue::Float(_) => "float",
            AvroValue::Double(_) => "double",
            AvroValue::Bytes(_) => "bytes",
            AvroValue::String(_) => "string",
            AvroValue::Record(_) => "record",
            AvroValue::Enum(..) => "enum",
            AvroValue::Array(_) => "array",
            AvroValue::Map(_) => "map",
            AvroValue::Union(..) => "union",
            AvroValue::Fixed(_) => "fixed",
            AvroValue::Decimal(_) => "decimal",
            AvroValue::BigInteger(_) => "big-integer",
            AvroValue::Date(_) => "date",
            AvroValue::YearMonth(_) => "year-month",
            AvroValue::Instant(_) => "instant",
            AvroValue::Uuid(_) => "uuid",
            AvroValue::Url(_) => "url",
            AvroValue::Uri(_) => "uri",
            AvroValue::Json(_) => "json",
            AvroValue::Any(_) => "any",
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        match self {
            AvroValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// The value inside a union, or the value itself.
    pub fn unwrap_union(&self) -> &AvroValue {
        match self {
            AvroValue::Union(_, inner) => inner,
            other => other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AvroValue::String(s) | AvroValue::Uri(s) => Some(s),
            AvroValue::Enum(_, s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AvroValue::Int(v) => Some(*v as i64),
            AvroValue::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for AvroValue {
    fn from(v: bool) -> Self {
        AvroValue::Boolean(v)
    }
}

impl From<i32> for AvroValue {
    fn from(v: i32) -> Self {
        AvroValue::Int(v)
    }
}

impl From<i64> for AvroValue {
    fn from(v: i64) -> Self {
        AvroValue::Long(v)
    }
}

impl From<f32> for AvroValue {
    fn from(v: f32) -> Self {
        AvroValue::Float(v)
    }
}

impl From<f64> for AvroValue {
    fn from(v: f64) -> Self {
        AvroValue::Double(v)
    }
}

impl From<&str> for AvroValue {
    fn from(v: &str) -> Self {
        AvroValue::String(v.to_string())
    }
}

impl From<String> for AvroValue {
    fn from(v: String) -> Self {
        AvroValue::String(v)
    }
}

impl From<Vec<u8>> for AvroValue {
    fn from(v: Vec<u8>) -> Self {
        AvroValue::Bytes(v)
    }
}

impl From<BigDecimal> for AvroValue {
    fn from(v: BigDecimal) -> Self {
        AvroValue::Decimal(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_month_epoch() {
        let ym = YearMonth::new(1969, 12).unwrap();
        assert_eq!(ym.epoch_months(), -1);
        assert_eq!(YearMonth::from_epoch_months(-1), Some(ym));
        assert_eq!(YearMonth::from_epoch_months(0).unwrap().to_string(), "1970-01");
        assert!(YearMonth::new(2020, 13).is_none());
    }

    #[test]
    fn test_field_lookup() {
        let record = AvroValue::Record(vec![
            ("id".into(), AvroValue::Long(1)),
            ("name".into(), AvroValue::Union(1, Box::new("x".into()))),
        ]);
        assert_eq!(record.field("id"), Some(&AvroValue::Long(1)));
        assert_eq!(
            record.field("name").map(AvroValue::unwrap_union),
            Some(&AvroValue::String("x".into()))
        );
        assert!(record.field("missing").is_none());
    }
}
