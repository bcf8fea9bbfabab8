//! Arbitrary-precision decimals.
//!
//! A decimal declares a precision ceiling (default [`DEFAULT_PRECISION`]), an
//! optional fixed scale and independent rounding modes for serialization and
//! deserialization. Four physical encodings are supported:
//!
//! | Physical | Wire form |
//! |---|---|
//! | `bytes` | zigzag varint scale, then the unscaled value as minimal big-endian two's complement |
//! | `fixed` | unscaled value sign-extended to the fixed size; scale implied by the schema |
//! | `string` | decimal text, plain or scientific |
//! | `record` | `{scale: int, unscaled: bytes}` |

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};
use serde_json::Value;

use crate::binary::varint::{decode_zigzag, encode_zigzag};
use crate::error::{ConversionError, SchemaError};
use crate::schema::{Properties, SchemaType};
use crate::value::AvroValue;

use super::LogicalTarget;

/// Precision used when a decimal declares none.
pub const DEFAULT_PRECISION: u32 = 36;

const NAME: &str = "decimal";

/// How digits are dropped when a value must lose precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundingMode {
    /// Away from zero.
    Up,
    /// Towards zero.
    Down,
    /// Towards positive infinity.
    Ceiling,
    /// Towards negative infinity.
    Floor,
    /// To nearest, ties away from zero.
    HalfUp,
    /// To nearest, ties towards zero.
    HalfDown,
    /// To nearest, ties to the even neighbour.
    HalfEven,
}

impl RoundingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundingMode::Up => "UP",
            RoundingMode::Down => "DOWN",
            RoundingMode::Ceiling => "CEILING",
            RoundingMode::Floor => "FLOOR",
            RoundingMode::HalfUp => "HALF_UP",
            RoundingMode::HalfDown => "HALF_DOWN",
            RoundingMode::HalfEven => "HALF_EVEN",
        }
    }

    /// Divide by `divisor` (positive), rounding the quotient with this mode.
    pub fn divide(self, value: &BigInt, divisor: &BigInt) -> BigInt {
        let quotient = value / divisor;
        let remainder = value % divisor;
        if remainder.is_zero() {
            return quotient;
        }
        let negative = value.is_negative();
        let away = if negative {
            &quotient - 1
        } else {
            &quotient + 1
        };
        let round_away = match self {
            RoundingMode::Up => true,
            RoundingMode::Down => false,
            RoundingMode::Ceiling => !negative,
            RoundingMode::Floor => negative,
            RoundingMode::HalfUp | RoundingMode::HalfDown | RoundingMode::HalfEven => {
                let twice: BigInt = remainder.abs() * 2;
                match twice.cmp(divisor) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => match self {
                        RoundingMode::HalfUp => true,
                        RoundingMode::HalfDown => false,
                        _ => (&quotient % 2u32) != BigInt::zero(),
                    },
                }
            }
        };
        if round_away {
            away
        } else {
            quotient
        }
    }
}

impl FromStr for RoundingMode {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "UP" => RoundingMode::Up,
            "DOWN" => RoundingMode::Down,
            "CEILING" => RoundingMode::Ceiling,
            "FLOOR" => RoundingMode::Floor,
            "HALF_UP" => RoundingMode::HalfUp,
            "HALF_DOWN" => RoundingMode::HalfDown,
            "HALF_EVEN" => RoundingMode::HalfEven,
            "UNNECESSARY" | "NONE" => {
                return Err(SchemaError::InvalidLogicalType {
                    logical_type: NAME.to_string(),
                    reason: format!("'{}' is expressed by omitting the rounding mode", s),
                })
            }
            other => {
                return Err(SchemaError::InvalidLogicalType {
                    logical_type: NAME.to_string(),
                    reason: format!("unknown rounding mode '{}'", other),
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Encoding {
    Unbound,
    Bytes,
    String,
    Fixed(usize),
    Record {
        names: Vec<String>,
        scale: usize,
        unscaled: usize,
    },
}

/// The `decimal` logical type.
#[derive(Debug, Clone)]
pub struct DecimalType {
    precision: Option<u32>,
    scale: Option<i64>,
    ser_rounding: Option<RoundingMode>,
    deser_rounding: Option<RoundingMode>,
    plain_string: bool,
    declared: Properties,
    encoding: Encoding,
}

fn invalid(reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidLogicalType {
        logical_type: NAME.to_string(),
        reason: reason.into(),
    }
}

impl DecimalType {
    /// Build from schema properties. `default_rounding` applies to whichever
    /// direction declares no rounding mode.
    pub fn from_props(
        props: &Properties,
        default_rounding: Option<RoundingMode>,
    ) -> Result<Self, SchemaError> {
        let precision = match props.get("precision") {
            None => None,
            Some(v) => match v.as_u64() {
                Some(p) if p > 0 && p <= u32::MAX as u64 => Some(p as u32),
                _ => return Err(invalid(format!("precision must be a positive integer, found {}", v))),
            },
        };
        let scale = match props.get("scale") {
            None => None,
            Some(v) => Some(
                v.as_i64()
                    .filter(|s| i32::try_from(*s).is_ok())
                    .ok_or_else(|| invalid(format!("scale must be an integer, found {}", v)))?,
            ),
        };
        if let (Some(p), Some(s)) = (precision, scale) {
            if s > p as i64 {
                return Err(invalid(format!("scale {} exceeds precision {}", s, p)));
            }
        }
        let rounding = |key: &str| -> Result<Option<RoundingMode>, SchemaError> {
            match props.get(key) {
                None => Ok(default_rounding),
                Some(Value::String(s)) => s.parse().map(Some),
                Some(other) => Err(invalid(format!("{} must be a string, found {}", key, other))),
            }
        };
        let plain_string = match props.get("usePlainString") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => return Err(invalid(format!("usePlainString must be a boolean, found {}", other))),
        };

        let declared = ["precision", "scale", "serRounding", "deserRounding", "usePlainString"]
            .iter()
            .filter_map(|k| props.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect();

        Ok(Self {
            precision,
            scale,
            ser_rounding: rounding("serRounding")?,
            deser_rounding: rounding("deserRounding")?,
            plain_string,
            declared,
            encoding: Encoding::Unbound,
        })
    }

    /// A decimal with the given ceiling and scale, not yet bound to a schema.
    pub fn new(precision: u32, scale: Option<i64>) -> Self {
        let mut declared = Properties::new();
        declared.insert("precision".into(), Value::from(precision));
        if let Some(scale) = scale {
            declared.insert("scale".into(), Value::from(scale));
        }
        Self {
            precision: Some(precision),
            scale,
            ser_rounding: None,
            deser_rounding: None,
            plain_string: false,
            declared,
            encoding: Encoding::Unbound,
        }
    }

    pub fn with_rounding(mut self, ser: Option<RoundingMode>, deser: Option<RoundingMode>) -> Self {
        self.ser_rounding = ser;
        self.deser_rounding = deser;
        self
    }

    pub(crate) fn declared(&self) -> &Properties {
        &self.declared
    }

    /// The precision ceiling in effect.
    pub fn precision(&self) -> u32 {
        self.precision.unwrap_or(DEFAULT_PRECISION)
    }

    pub fn scale(&self) -> Option<i64> {
        self.scale
    }

    pub(crate) fn bind(mut self, target: &LogicalTarget) -> Result<Self, SchemaError> {
        self.encoding = match target.schema_type {
            SchemaType::Bytes => Encoding::Bytes,
            SchemaType::String => Encoding::String,
            SchemaType::Fixed => {
                let size = target.fixed_size.unwrap_or(0);
                let capacity = max_fixed_digits(size);
                if self.precision() as u64 > capacity {
                    return Err(invalid(format!(
                        "fixed({}) cannot hold {} digits",
                        size,
                        self.precision()
                    )));
                }
                Encoding::Fixed(size)
            }
            SchemaType::Record => {
                let scale = target.field_position("scale", SchemaType::Int);
                let unscaled = target.field_position("unscaled", SchemaType::Bytes);
                match (scale, unscaled) {
                    (Some(scale), Some(unscaled)) if target.fields.len() == 2 => Encoding::Record {
                        names: target.fields.iter().map(|(n, _)| n.clone()).collect(),
                        scale,
                        unscaled,
                    },
                    _ => {
                        return Err(invalid(
                            "record form requires fields 'scale' (int) and 'unscaled' (bytes)",
                        ))
                    }
                }
            }
            _ => return Err(target.reject(NAME, "bytes, string, fixed or record")),
        };
        Ok(self)
    }

    /// Whether values may be written as bare JSON numbers.
    pub(crate) fn supports_direct(&self) -> bool {
        matches!(
            self.encoding,
            Encoding::Bytes | Encoding::String | Encoding::Fixed(_)
        )
    }

    /// Apply the serialization contract: rescale to the declared scale,
    /// strip trailing zeros, then enforce the precision ceiling. Fixed
    /// encodings are returned at the declared scale.
    pub fn prepare(&self, value: &BigDecimal) -> Result<BigDecimal, ConversionError> {
        let (mut unscaled, mut scale) = value.as_bigint_and_exponent();
        if let Some(target) = self.scale {
            unscaled = rescale(&unscaled, scale, target, self.ser_rounding)?;
            scale = target;
        }
        let (unscaled, scale) = strip_trailing_zeros(unscaled, scale);
        let received = digit_count(&unscaled);
        let max = self.precision() as u64;
        if received > max {
            return Err(ConversionError::PrecisionExceeded { received, max });
        }
        let target = target_scale(self.scale);
        if matches!(self.encoding, Encoding::Fixed(_)) && target != scale {
            let unscaled = rescale(&unscaled, scale, target, self.ser_rounding)?;
            return Ok(BigDecimal::new(unscaled, target));
        }
        Ok(BigDecimal::new(unscaled, scale))
    }

    /// Apply the deserialization contract: strip trailing zeros, then
    /// enforce the precision ceiling, rounding if a mode is configured.
    pub fn finish(&self, value: BigDecimal) -> Result<BigDecimal, ConversionError> {
        let (unscaled, scale) = value.as_bigint_and_exponent();
        let (unscaled, scale) = strip_trailing_zeros(unscaled, scale);
        let received = digit_count(&unscaled);
        let max = self.precision() as u64;
        if received <= max {
            return Ok(BigDecimal::new(unscaled, scale));
        }
        let mode = self
            .deser_rounding
            .ok_or(ConversionError::PrecisionExceeded { received, max })?;
        let drop = (received - max) as i64;
        let rounded = mode.divide(&unscaled, &pow10(drop as u32));
        let (unscaled, scale) = strip_trailing_zeros(rounded, scale - drop);
        // rounding up may carry into one more digit, e.g. 999 -> 1000
        if digit_count(&unscaled) > max {
            let rounded = mode.divide(&unscaled, &pow10(1));
            let (unscaled, scale) = strip_trailing_zeros(rounded, scale - 1);
            return Ok(BigDecimal::new(unscaled, scale));
        }
        Ok(BigDecimal::new(unscaled, scale))
    }

    pub(crate) fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        let decimal = match value {
            AvroValue::Decimal(d) => self.prepare(d)?,
            other => return Ok(other.clone()),
        };
        let (unscaled, scale) = decimal.as_bigint_and_exponent();
        match &self.encoding {
            Encoding::Bytes => {
                let mut bytes = encode_zigzag(scale);
                bytes.extend_from_slice(&unscaled.to_signed_bytes_be());
                Ok(AvroValue::Bytes(bytes))
            }
            Encoding::Fixed(size) => {
                Ok(AvroValue::Fixed(sign_extend(&unscaled, *size).ok_or_else(|| {
                    ConversionError::invalid(NAME, format!("{} does not fit in fixed({})", decimal, size))
                })?))
            }
            Encoding::String => Ok(AvroValue::String(if self.plain_string {
                to_plain_string(&unscaled, scale)
            } else {
                decimal.to_string()
            })),
            Encoding::Record {
                names,
                scale: scale_pos,
                ..
            } => {
                let scale = i32::try_from(scale)
                    .map_err(|_| ConversionError::invalid(NAME, "scale out of int range"))?;
                let fields = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let value = if i == *scale_pos {
                            AvroValue::Int(scale)
                        } else {
                            AvroValue::Bytes(unscaled.to_signed_bytes_be())
                        };
                        (name.clone(), value)
                    })
                    .collect();
                Ok(AvroValue::Record(fields))
            }
            Encoding::Unbound => Err(unbound()),
        }
    }

    pub(crate) fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        let decimal = match (&self.encoding, value) {
            (_, AvroValue::Decimal(d)) => d,
            (Encoding::Bytes, AvroValue::Bytes(bytes)) => {
                let mut data = bytes.as_slice();
                let scale = decode_zigzag(&mut data)
                    .map_err(|e| ConversionError::invalid(NAME, e.to_string()))?;
                BigDecimal::new(BigInt::from_signed_bytes_be(data), scale)
            }
            (Encoding::Fixed(_), AvroValue::Fixed(bytes)) => {
                BigDecimal::new(BigInt::from_signed_bytes_be(&bytes), target_scale(self.scale))
            }
            (Encoding::String, AvroValue::String(text)) => BigDecimal::from_str(text.trim())
                .map_err(|e| ConversionError::invalid(NAME, format!("'{}': {}", text, e)))?,
            (Encoding::Record { scale, unscaled, .. }, AvroValue::Record(fields)) => {
                let scale = match fields.get(*scale) {
                    Some((_, AvroValue::Int(s))) => *s as i64,
                    _ => return Err(ConversionError::invalid(NAME, "record is missing 'scale'")),
                };
                let unscaled = match fields.get(*unscaled) {
                    Some((_, AvroValue::Bytes(b))) => BigInt::from_signed_bytes_be(b),
                    _ => return Err(ConversionError::invalid(NAME, "record is missing 'unscaled'")),
                };
                BigDecimal::new(unscaled, scale)
            }
            (Encoding::Unbound, _) => return Err(unbound()),
            (_, other) => {
                return Err(ConversionError::Unsupported {
                    logical_type: NAME.to_string(),
                    variant: other.type_name().to_string(),
                })
            }
        };
        self.finish(decimal).map(AvroValue::Decimal)
    }
}

fn unbound() -> ConversionError {
    ConversionError::invalid(NAME, "logical type is not attached to a schema")
}

fn target_scale(scale: Option<i64>) -> i64 {
    scale.unwrap_or(0)
}

pub(crate) fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

/// Number of decimal digits of the unscaled value; zero has one digit.
pub(crate) fn digit_count(unscaled: &BigInt) -> u64 {
    unscaled.magnitude().to_str_radix(10).len() as u64
}

pub(crate) fn strip_trailing_zeros(mut unscaled: BigInt, mut scale: i64) -> (BigInt, i64) {
    if unscaled.is_zero() {
        return (unscaled, 0);
    }
    let ten = BigInt::from(10u32);
    loop {
        let remainder = &unscaled % &ten;
        if !remainder.is_zero() {
            break;
        }
        unscaled /= &ten;
        scale -= 1;
    }
    (unscaled, scale)
}

/// Change the scale of an unscaled value. Lowering the scale drops digits,
/// which needs a rounding mode unless the dropped digits are all zero.
fn rescale(
    unscaled: &BigInt,
    from: i64,
    to: i64,
    mode: Option<RoundingMode>,
) -> Result<BigInt, ConversionError> {
    if to >= from {
        let exp = u32::try_from(to - from)
            .map_err(|_| ConversionError::invalid(NAME, "scale difference too large"))?;
        return Ok(unscaled * pow10(exp));
    }
    let exp = u32::try_from(from - to)
        .map_err(|_| ConversionError::invalid(NAME, "scale difference too large"))?;
    let divisor = pow10(exp);
    match mode {
        Some(mode) => Ok(mode.divide(unscaled, &divisor)),
        None => {
            if (unscaled % &divisor).is_zero() {
                Ok(unscaled / &divisor)
            } else {
                Err(ConversionError::InexactRescale {
                    value: to_plain_string(unscaled, from),
                    scale: to,
                })
            }
        }
    }
}

/// Two's complement big-endian bytes padded on the left to `size`.
fn sign_extend(unscaled: &BigInt, size: usize) -> Option<Vec<u8>> {
    let bytes = unscaled.to_signed_bytes_be();
    if bytes.len() > size {
        return None;
    }
    let pad = if unscaled.sign() == Sign::Minus { 0xff } else { 0x00 };
    let mut out = vec![pad; size - bytes.len()];
    out.extend_from_slice(&bytes);
    Some(out)
}

/// Largest digit count a two's complement fixed of `size` bytes holds.
fn max_fixed_digits(size: usize) -> u64 {
    if size == 0 {
        return 0;
    }
    let max = (BigInt::from(1u32) << (8 * size - 1)) - 1u32;
    digit_count(&max) - 1
}

/// Render without exponent notation.
pub(crate) fn to_plain_string(unscaled: &BigInt, scale: i64) -> String {
    let negative = unscaled.is_negative();
    let digits = unscaled.magnitude().to_str_radix(10);
    let body = if scale <= 0 {
        let mut s = digits;
        if s != "0" {
            s.extend(std::iter::repeat('0').take((-scale) as usize));
        }
        s
    } else {
        let scale = scale as usize;
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            format!("{}.{}", int, frac)
        } else {
            format!("0.{}{}", "0".repeat(scale - digits.len()), digits)
        }
    };
    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().unwrap().clone()
    }

    fn bound(value: serde_json::Value, ty: SchemaType, fixed: Option<usize>) -> DecimalType {
        let props = props(value);
        let target = LogicalTarget {
            schema_type: ty,
            props: props.clone(),
            fields: vec![],
            fixed_size: fixed,
        };
        DecimalType::from_props(&props, None).unwrap().bind(&target).unwrap()
    }

    #[test]
    fn test_rounding_modes() {
        let ten = BigInt::from(10);
        let cases = [
            (RoundingMode::Up, 15, 2),
            (RoundingMode::Down, 15, 1),
            (RoundingMode::Ceiling, -15, -1),
            (RoundingMode::Floor, -15, -2),
            (RoundingMode::HalfUp, 25, 3),
            (RoundingMode::HalfDown, 25, 2),
            (RoundingMode::HalfEven, 25, 2),
            (RoundingMode::HalfEven, 35, 4),
            (RoundingMode::HalfUp, -25, -3),
            (RoundingMode::HalfDown, 26, 3),
        ];
        for (mode, value, expected) in cases {
            assert_eq!(
                mode.divide(&BigInt::from(value), &ten),
                BigInt::from(expected),
                "{:?} {}",
                mode,
                value
            );
        }
        assert_eq!("HALF_EVEN".parse::<RoundingMode>().unwrap(), RoundingMode::HalfEven);
        assert!("SIDEWAYS".parse::<RoundingMode>().is_err());
    }

    #[test]
    fn test_precision_enforced_after_rescale() {
        let t = bound(json!({"precision": 5, "scale": 2}), SchemaType::Bytes, None);
        assert_eq!(
            t.prepare(&dec("123456.78")).unwrap_err(),
            ConversionError::PrecisionExceeded { received: 8, max: 5 }
        );
        assert_eq!(t.prepare(&dec("123.45")).unwrap(), dec("123.45"));
        // trailing zeros stripped before the check
        assert_eq!(t.prepare(&dec("100.00")).unwrap(), dec("100"));
        assert!(matches!(
            t.prepare(&dec("1.234")),
            Err(ConversionError::InexactRescale { .. })
        ));
    }

    #[test]
    fn test_ser_rounding_bounds_error() {
        let t = bound(
            json!({"precision": 5, "scale": 2, "serRounding": "HALF_UP"}),
            SchemaType::Bytes,
            None,
        );
        let original = dec("12.3456");
        let result = t.prepare(&original).unwrap();
        assert_eq!(result, dec("12.35"));
        assert!((original - result).abs() <= dec("0.01"));
    }

    #[test]
    fn test_deser_rounding() {
        let strict = bound(json!({"precision": 3}), SchemaType::String, None);
        assert_eq!(
            strict.finish(dec("1.2345")).unwrap_err(),
            ConversionError::PrecisionExceeded { received: 5, max: 3 }
        );
        let rounding = bound(
            json!({"precision": 3, "deserRounding": "HALF_EVEN"}),
            SchemaType::String,
            None,
        );
        assert_eq!(rounding.finish(dec("1.2345")).unwrap(), dec("1.23"));
        assert_eq!(rounding.finish(dec("9.996")).unwrap(), dec("10"));
        assert_eq!(rounding.finish(dec("1.20000")).unwrap(), dec("1.2"));
    }

    #[test]
    fn test_bytes_encoding() {
        let t = bound(json!({}), SchemaType::Bytes, None);
        let wire = t.to_wire(&AvroValue::Decimal(dec("-1.50"))).unwrap();
        // scale 1 zigzag = 2, then -15 = 0xf1
        assert_eq!(wire, AvroValue::Bytes(vec![0x02, 0xf1]));
        assert_eq!(
            t.from_wire(wire).unwrap(),
            AvroValue::Decimal(dec("-1.5"))
        );
    }

    #[test]
    fn test_fixed_encoding_uses_declared_scale() {
        let t = bound(json!({"precision": 6, "scale": 2}), SchemaType::Fixed, Some(4));
        let wire = t.to_wire(&AvroValue::Decimal(dec("1.5"))).unwrap();
        assert_eq!(wire, AvroValue::Fixed(vec![0, 0, 0, 150]));
        let negative = t.to_wire(&AvroValue::Decimal(dec("-0.01"))).unwrap();
        assert_eq!(negative, AvroValue::Fixed(vec![0xff, 0xff, 0xff, 0xff]));
        assert_eq!(
            t.from_wire(negative).unwrap(),
            AvroValue::Decimal(dec("-0.01"))
        );
    }

    #[test]
    fn test_fixed_too_small_rejected() {
        let props = props(json!({"precision": 10}));
        let target = LogicalTarget {
            schema_type: SchemaType::Fixed,
            props: props.clone(),
            fields: vec![],
            fixed_size: Some(2),
        };
        assert!(DecimalType::from_props(&props, None)
            .unwrap()
            .bind(&target)
            .is_err());
        assert_eq!(max_fixed_digits(2), 4);
        assert_eq!(max_fixed_digits(16), 38);
    }

    #[test]
    fn test_string_encodings() {
        let plain = bound(json!({"usePlainString": true}), SchemaType::String, None);
        assert_eq!(
            plain.to_wire(&AvroValue::Decimal(dec("1200"))).unwrap(),
            AvroValue::String("1200".into())
        );
        assert_eq!(
            plain.to_wire(&AvroValue::Decimal(dec("-0.0010"))).unwrap(),
            AvroValue::String("-0.001".into())
        );
        let default = bound(json!({}), SchemaType::String, None);
        let wire = default.to_wire(&AvroValue::Decimal(dec("1200"))).unwrap();
        assert_eq!(default.from_wire(wire).unwrap(), AvroValue::Decimal(dec("1200")));
    }

    #[test]
    fn test_record_encoding() {
        let props = props(json!({}));
        let target = LogicalTarget {
            schema_type: SchemaType::Record,
            props: props.clone(),
            fields: vec![
                ("unscaled".into(), SchemaType::Bytes),
                ("scale".into(), SchemaType::Int),
            ],
            fixed_size: None,
        };
        let t = DecimalType::from_props(&props, None).unwrap().bind(&target).unwrap();
        let wire = t.to_wire(&AvroValue::Decimal(dec("3.14"))).unwrap();
        assert_eq!(
            wire,
            AvroValue::Record(vec![
                ("unscaled".into(), AvroValue::Bytes(vec![0x01, 0x3a])),
                ("scale".into(), AvroValue::Int(2)),
            ])
        );
        assert_eq!(t.from_wire(wire).unwrap(), AvroValue::Decimal(dec("3.14")));
    }

    #[test]
    fn test_physical_values_pass_through() {
        let t = bound(json!({}), SchemaType::Bytes, None);
        let raw = AvroValue::Bytes(vec![0, 1]);
        assert_eq!(t.to_wire(&raw).unwrap(), raw);
    }

    #[test]
    fn test_invalid_declarations() {
        assert!(DecimalType::from_props(&props(json!({"precision": 0})), None).is_err());
        assert!(DecimalType::from_props(&props(json!({"precision": 2, "scale": 3})), None).is_err());
        assert!(DecimalType::from_props(&props(json!({"serRounding": 1})), None).is_err());
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(to_plain_string(&BigInt::from(5), 3), "0.005");
        assert_eq!(to_plain_string(&BigInt::from(-12345), 2), "-123.45");
        assert_eq!(to_plain_string(&BigInt::from(12), -2), "1200");
        assert_eq!(to_plain_string(&BigInt::from(0), -2), "0");
    }
}
