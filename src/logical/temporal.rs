//! Calendar and time-line logical types: `date`, `year-month`, `instant`
//! and `timestamp-millis`.
//!
//! Each supports up to three physical encodings: an epoch count, ISO text,
//! and a record whose field names select the decomposed form.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};

use crate::error::{ConversionError, SchemaError};
use crate::schema::SchemaType;
use crate::value::{AvroValue, YearMonth};

use super::cache::DateStringCache;
use super::LogicalTarget;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Encoding {
    Unbound,
    Int,
    Long,
    String,
    /// Decomposed record: field names in schema order plus the position of
    /// each component.
    Record {
        names: Vec<String>,
        positions: Vec<usize>,
    },
}

fn unbound(name: &str) -> ConversionError {
    ConversionError::invalid(name, "logical type is not attached to a schema")
}

fn unsupported(name: &str, value: &AvroValue) -> ConversionError {
    ConversionError::Unsupported {
        logical_type: name.to_string(),
        variant: value.type_name().to_string(),
    }
}

/// Build a record value from component values placed at their positions.
fn assemble(names: &[String], positions: &[usize], parts: Vec<AvroValue>) -> AvroValue {
    let mut fields: Vec<(String, AvroValue)> = names
        .iter()
        .map(|n| (n.clone(), AvroValue::Null))
        .collect();
    for (&pos, part) in positions.iter().zip(parts) {
        fields[pos].1 = part;
    }
    AvroValue::Record(fields)
}

/// Pick the component at `pos` out of a decoded record as an i64.
fn component(name: &str, fields: &[(String, AvroValue)], pos: usize) -> Result<i64, ConversionError> {
    match fields.get(pos).map(|(_, v)| v) {
        Some(AvroValue::Int(v)) => Ok(*v as i64),
        Some(AvroValue::Long(v)) => Ok(*v),
        _ => Err(ConversionError::invalid(
            name,
            format!("record component {} is missing", pos),
        )),
    }
}

fn int_component(name: &str, value: i64) -> Result<AvroValue, ConversionError> {
    i32::try_from(value)
        .map(AvroValue::Int)
        .map_err(|_| ConversionError::invalid(name, format!("{} out of int range", value)))
}

/// Resolve a decomposed record form: every `(field, type)` must be present,
/// and the record must have no other fields.
fn record_form(target: &LogicalTarget, layout: &[(&str, SchemaType)]) -> Option<Encoding> {
    if target.fields.len() != layout.len() {
        return None;
    }
    let positions = layout
        .iter()
        .map(|(name, ty)| target.field_position(name, *ty))
        .collect::<Option<Vec<_>>>()?;
    Some(Encoding::Record {
        names: target.fields.iter().map(|(n, _)| n.clone()).collect(),
        positions,
    })
}

// ============================================================================
// date
// ============================================================================

/// The `date` logical type.
#[derive(Debug, Clone)]
pub struct DateType {
    cache: Arc<DateStringCache>,
    encoding: Encoding,
}

const DATE: &str = "date";
const DATE_RECORD: &[(&str, SchemaType)] = &[
    ("year", SchemaType::Int),
    ("month", SchemaType::Int),
    ("day", SchemaType::Int),
];

impl DateType {
    pub fn new(cache: Arc<DateStringCache>) -> Self {
        Self {
            cache,
            encoding: Encoding::Unbound,
        }
    }

    pub(crate) fn bind(mut self, target: &LogicalTarget) -> Result<Self, SchemaError> {
        self.encoding = match target.schema_type {
            SchemaType::Int => Encoding::Int,
            SchemaType::Long => Encoding::Long,
            SchemaType::String => Encoding::String,
            SchemaType::Record => record_form(target, DATE_RECORD).ok_or_else(|| {
                SchemaError::InvalidLogicalType {
                    logical_type: DATE.to_string(),
                    reason: "record form requires int fields 'year', 'month' and 'day'".into(),
                }
            })?,
            _ => return Err(target.reject(DATE, "int, long, string or record")),
        };
        Ok(self)
    }

    pub(crate) fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        let date = match value {
            AvroValue::Date(d) => *d,
            other => return Ok(other.clone()),
        };
        let days = date.num_days_from_ce() as i64 - EPOCH_DAYS_FROM_CE;
        match &self.encoding {
            Encoding::Int => int_component(DATE, days),
            Encoding::Long => Ok(AvroValue::Long(days)),
            Encoding::String => Ok(AvroValue::String(self.cache.format(date).to_string())),
            Encoding::Record { names, positions } => Ok(assemble(
                names,
                positions,
                vec![
                    AvroValue::Int(date.year()),
                    AvroValue::Int(date.month() as i32),
                    AvroValue::Int(date.day() as i32),
                ],
            )),
            Encoding::Unbound => Err(unbound(DATE)),
        }
    }

    pub(crate) fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        let date = match (&self.encoding, value) {
            (_, AvroValue::Date(d)) => d,
            (Encoding::Int, AvroValue::Int(days)) => from_epoch_days(days as i64)?,
            (Encoding::Long, AvroValue::Long(days)) => from_epoch_days(days)?,
            (Encoding::String, AvroValue::String(text)) => self.cache.parse(&text)?,
            (Encoding::Record { positions, .. }, AvroValue::Record(fields)) => {
                let year = component(DATE, &fields, positions[0])?;
                let month = component(DATE, &fields, positions[1])?;
                let day = component(DATE, &fields, positions[2])?;
                i32::try_from(year)
                    .ok()
                    .and_then(|y| NaiveDate::from_ymd_opt(y, month as u32, day as u32))
                    .ok_or_else(|| {
                        ConversionError::invalid(
                            DATE,
                            format!("{}-{}-{} is not a calendar date", year, month, day),
                        )
                    })?
            }
            (Encoding::Unbound, _) => return Err(unbound(DATE)),
            (_, other) => return Err(unsupported(DATE, &other)),
        };
        Ok(AvroValue::Date(date))
    }
}

fn from_epoch_days(days: i64) -> Result<NaiveDate, ConversionError> {
    i32::try_from(days + EPOCH_DAYS_FROM_CE)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| ConversionError::invalid(DATE, format!("{} days out of range", days)))
}

// ============================================================================
// year-month
// ============================================================================

/// The `year-month` logical type.
#[derive(Debug, Clone)]
pub struct YearMonthType {
    encoding: Encoding,
}

const YEAR_MONTH: &str = "year-month";
const YEAR_MONTH_RECORD: &[(&str, SchemaType)] =
    &[("year", SchemaType::Int), ("month", SchemaType::Int)];

impl Default for YearMonthType {
    fn default() -> Self {
        Self::new()
    }
}

impl YearMonthType {
    pub fn new() -> Self {
        Self {
            encoding: Encoding::Unbound,
        }
    }

    pub(crate) fn bind(mut self, target: &LogicalTarget) -> Result<Self, SchemaError> {
        self.encoding = match target.schema_type {
            SchemaType::Int => Encoding::Int,
            SchemaType::Long => Encoding::Long,
            SchemaType::String => Encoding::String,
            SchemaType::Record => record_form(target, YEAR_MONTH_RECORD).ok_or_else(|| {
                SchemaError::InvalidLogicalType {
                    logical_type: YEAR_MONTH.to_string(),
                    reason: "record form requires int fields 'year' and 'month'".into(),
                }
            })?,
            _ => return Err(target.reject(YEAR_MONTH, "int, long, string or record")),
        };
        Ok(self)
    }

    pub(crate) fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        let ym = match value {
            AvroValue::YearMonth(ym) => *ym,
            other => return Ok(other.clone()),
        };
        match &self.encoding {
            Encoding::Int => int_component(YEAR_MONTH, ym.epoch_months()),
            Encoding::Long => Ok(AvroValue::Long(ym.epoch_months())),
            Encoding::String => Ok(AvroValue::String(ym.to_string())),
            Encoding::Record { names, positions } => Ok(assemble(
                names,
                positions,
                vec![AvroValue::Int(ym.year), AvroValue::Int(ym.month as i32)],
            )),
            Encoding::Unbound => Err(unbound(YEAR_MONTH)),
        }
    }

    pub(crate) fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        let out_of_range =
            |what: String| ConversionError::invalid(YEAR_MONTH, format!("{} out of range", what));
        let ym = match (&self.encoding, value) {
            (_, AvroValue::YearMonth(ym)) => ym,
            (Encoding::Int, AvroValue::Int(months)) => YearMonth::from_epoch_months(months as i64)
                .ok_or_else(|| out_of_range(months.to_string()))?,
            (Encoding::Long, AvroValue::Long(months)) => YearMonth::from_epoch_months(months)
                .ok_or_else(|| out_of_range(months.to_string()))?,
            (Encoding::String, AvroValue::String(text)) => parse_year_month(&text)?,
            (Encoding::Record { positions, .. }, AvroValue::Record(fields)) => {
                let year = component(YEAR_MONTH, &fields, positions[0])?;
                let month = component(YEAR_MONTH, &fields, positions[1])?;
                i32::try_from(year)
                    .ok()
                    .and_then(|y| u32::try_from(month).ok().and_then(|m| YearMonth::new(y, m)))
                    .ok_or_else(|| out_of_range(format!("{}-{}", year, month)))?
            }
            (Encoding::Unbound, _) => return Err(unbound(YEAR_MONTH)),
            (_, other) => return Err(unsupported(YEAR_MONTH, &other)),
        };
        Ok(AvroValue::YearMonth(ym))
    }
}

fn parse_year_month(text: &str) -> Result<YearMonth, ConversionError> {
    let invalid = || ConversionError::invalid(YEAR_MONTH, format!("'{}' is not YYYY-MM", text));
    let (year, month) = text.rsplit_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    YearMonth::new(year, month).ok_or_else(invalid)
}

// ============================================================================
// instant / timestamp-millis
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstantRecord {
    /// `{epochSecond: long, nano: int}`
    SecondsNanos,
    /// `{millis: long}`
    Millis,
}

/// A point on the UTC time line.
///
/// `instant` accepts a long of epoch milliseconds, RFC 3339 text, or a record
/// of `{epochSecond, nano}` or `{millis}`; `timestamp-millis` is the long
/// form only.
#[derive(Debug, Clone)]
pub struct InstantType {
    name: &'static str,
    encoding: Encoding,
    record: Option<InstantRecord>,
}

const SECONDS_NANOS_RECORD: &[(&str, SchemaType)] =
    &[("epochSecond", SchemaType::Long), ("nano", SchemaType::Int)];
const MILLIS_RECORD: &[(&str, SchemaType)] = &[("millis", SchemaType::Long)];

impl InstantType {
    pub fn instant() -> Self {
        Self {
            name: "instant",
            encoding: Encoding::Unbound,
            record: None,
        }
    }

    pub fn timestamp_millis() -> Self {
        Self {
            name: "timestamp-millis",
            encoding: Encoding::Unbound,
            record: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn long_only(&self) -> bool {
        self.name == "timestamp-millis"
    }

    pub(crate) fn bind(mut self, target: &LogicalTarget) -> Result<Self, SchemaError> {
        if self.long_only() {
            if target.schema_type != SchemaType::Long {
                return Err(target.reject(self.name, "long"));
            }
            self.encoding = Encoding::Long;
            return Ok(self);
        }
        self.encoding = match target.schema_type {
            SchemaType::Long => Encoding::Long,
            SchemaType::String => Encoding::String,
            SchemaType::Record => {
                if let Some(enc) = record_form(target, SECONDS_NANOS_RECORD) {
                    self.record = Some(InstantRecord::SecondsNanos);
                    enc
                } else if let Some(enc) = record_form(target, MILLIS_RECORD) {
                    self.record = Some(InstantRecord::Millis);
                    enc
                } else {
                    return Err(SchemaError::InvalidLogicalType {
                        logical_type: self.name.to_string(),
                        reason: "record form requires fields {epochSecond: long, nano: int} or {millis: long}"
                            .into(),
                    });
                }
            }
            _ => return Err(target.reject(self.name, "long, string or record")),
        };
        Ok(self)
    }

    pub(crate) fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        let instant = match value {
            AvroValue::Instant(t) => *t,
            other => return Ok(other.clone()),
        };
        match &self.encoding {
            Encoding::Long => Ok(AvroValue::Long(instant.timestamp_millis())),
            Encoding::String => Ok(AvroValue::String(
                instant.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            Encoding::Record { names, positions } => {
                let parts = match self.record {
                    Some(InstantRecord::SecondsNanos) => vec![
                        AvroValue::Long(instant.timestamp()),
                        AvroValue::Int(instant.timestamp_subsec_nanos() as i32),
                    ],
                    _ => vec![AvroValue::Long(instant.timestamp_millis())],
                };
                Ok(assemble(names, positions, parts))
            }
            Encoding::Int | Encoding::Unbound => Err(unbound(self.name)),
        }
    }

    pub(crate) fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        let name = self.name;
        let out_of_range = || ConversionError::invalid(name, "timestamp out of range");
        let instant = match (&self.encoding, value) {
            (_, AvroValue::Instant(t)) => t,
            (Encoding::Long, AvroValue::Long(millis)) => {
                DateTime::from_timestamp_millis(millis).ok_or_else(out_of_range)?
            }
            (Encoding::String, AvroValue::String(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ConversionError::invalid(name, format!("'{}': {}", text, e)))?,
            (Encoding::Record { positions, .. }, AvroValue::Record(fields)) => match self.record {
                Some(InstantRecord::SecondsNanos) => {
                    let seconds = component(name, &fields, positions[0])?;
                    let nanos = component(name, &fields, positions[1])?;
                    u32::try_from(nanos)
                        .ok()
                        .and_then(|n| DateTime::from_timestamp(seconds, n))
                        .ok_or_else(out_of_range)?
                }
                _ => {
                    let millis = component(name, &fields, positions[0])?;
                    DateTime::from_timestamp_millis(millis).ok_or_else(out_of_range)?
                }
            },
            (Encoding::Unbound, _) => return Err(unbound(name)),
            (_, other) => return Err(unsupported(name, &other)),
        };
        Ok(AvroValue::Instant(instant))
    }
}
