//! Logical types: semantic refinements of physical schema types.
//!
//! A logical type is attached to a schema node once, when the schema is
//! built. Attaching validates the node's physical shape (a decimal cannot sit
//! on a boolean) and contributes the logical type's declared properties to
//! the node. At encode and decode time the datum layer calls
//! [`LogicalType::to_wire`] and [`LogicalType::from_wire`] to move between
//! domain values and the physical value the codecs see.
//!
//! Built-in types are variants of [`LogicalType`]; applications add their
//! own through [`CustomLogicalType`] and a [`LogicalTypeFactory`] registered
//! in a [`LogicalTypeRegistry`].

mod any;
mod bigint;
mod cache;
mod decimal;
mod json;
mod temporal;
mod text;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{ConversionError, SchemaError};
use crate::schema::{Properties, SchemaType};
use crate::value::AvroValue;

pub use any::{AnyType, BasicSchemaInference, SchemaInference};
pub use bigint::BigIntegerType;
pub use cache::{DateStringCache, DEFAULT_CAPACITY};
pub use decimal::{DecimalType, RoundingMode, DEFAULT_PRECISION};
pub(crate) use decimal::to_plain_string;
pub use json::{JsonKind, JsonType};
pub use temporal::{DateType, InstantType, YearMonthType};
pub use text::{TextKind, TextType};

/// The physical shape a logical type is being attached to.
#[derive(Debug, Clone)]
pub struct LogicalTarget {
    pub schema_type: SchemaType,
    /// Properties already on the node.
    pub props: Properties,
    /// Field names and types, for records.
    pub fields: Vec<(String, SchemaType)>,
    /// Size, for fixed types.
    pub fixed_size: Option<usize>,
}

impl LogicalTarget {
    /// Position of a record field of the given type.
    pub fn field_position(&self, name: &str, ty: SchemaType) -> Option<usize> {
        self.fields
            .iter()
            .position(|(n, t)| n == name && *t == ty)
    }

    pub(crate) fn reject(&self, logical_type: &str, allowed: &str) -> SchemaError {
        SchemaError::InvalidLogicalType {
            logical_type: logical_type.to_string(),
            reason: format!("requires {}, found {}", allowed, self.schema_type),
        }
    }
}

/// Application-defined logical type.
pub trait CustomLogicalType: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Properties contributed to the schema, besides `logicalType`.
    fn properties(&self) -> Properties {
        Properties::new()
    }

    /// Check the physical shape the type is attached to.
    fn validate(&self, target: &LogicalTarget) -> Result<(), SchemaError>;

    fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError>;

    fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError>;
}

/// A logical type with no conversion: the physical value passes through.
#[derive(Debug, Clone)]
pub struct AnnotationType {
    name: &'static str,
    allowed: &'static [SchemaType],
    fixed_size: Option<usize>,
}

const ANNOTATIONS: &[AnnotationType] = &[
    AnnotationType {
        name: "time-millis",
        allowed: &[SchemaType::Int],
        fixed_size: None,
    },
    AnnotationType {
        name: "time-micros",
        allowed: &[SchemaType::Long],
        fixed_size: None,
    },
    AnnotationType {
        name: "timestamp-micros",
        allowed: &[SchemaType::Long],
        fixed_size: None,
    },
    AnnotationType {
        name: "local-timestamp-millis",
        allowed: &[SchemaType::Long],
        fixed_size: None,
    },
    AnnotationType {
        name: "local-timestamp-micros",
        allowed: &[SchemaType::Long],
        fixed_size: None,
    },
    AnnotationType {
        name: "duration",
        allowed: &[SchemaType::Fixed],
        fixed_size: Some(12),
    },
];

impl AnnotationType {
    fn validate(&self, target: &LogicalTarget) -> Result<(), SchemaError> {
        if !self.allowed.contains(&target.schema_type) {
            let allowed: Vec<&str> = self.allowed.iter().map(|t| t.as_str()).collect();
            return Err(target.reject(self.name, &allowed.join(" or ")));
        }
        if let (Some(expected), Some(size)) = (self.fixed_size, target.fixed_size) {
            if expected != size {
                return Err(SchemaError::InvalidLogicalType {
                    logical_type: self.name.to_string(),
                    reason: format!("requires fixed size {}, found {}", expected, size),
                });
            }
        }
        Ok(())
    }
}

/// A logical type attached to a schema node.
#[derive(Debug, Clone)]
pub enum LogicalType {
    Decimal(DecimalType),
    BigInteger(BigIntegerType),
    Date(DateType),
    YearMonth(YearMonthType),
    Instant(InstantType),
    Text(TextType),
    Json(JsonType),
    Any(AnyType),
    Annotation(AnnotationType),
    Custom(Arc<dyn CustomLogicalType>),
}

impl LogicalType {
    /// The `logicalType` property value.
    pub fn name(&self) -> &str {
        match self {
            LogicalType::Decimal(_) => "decimal",
            LogicalType::BigInteger(_) => "bigint",
            LogicalType::Date(_) => "date",
            LogicalType::YearMonth(_) => "year-month",
            LogicalType::Instant(t) => t.name(),
            LogicalType::Text(t) => t.kind().name(),
            LogicalType::Json(t) => t.kind().name(),
            LogicalType::Any(_) => "any",
            LogicalType::Annotation(t) => t.name,
            LogicalType::Custom(t) => t.name(),
        }
    }

    /// Properties contributed to the schema node, `logicalType` included.
    /// Only values declared in the schema document are contributed.
    pub fn properties(&self) -> Properties {
        let mut props = match self {
            LogicalType::Decimal(t) => t.declared().clone(),
            LogicalType::BigInteger(t) => t.declared().clone(),
            LogicalType::Custom(t) => t.properties(),
            _ => Properties::new(),
        };
        props.insert("logicalType".into(), Value::String(self.name().to_string()));
        props
    }

    /// Validate the physical shape and cache what the conversions need from
    /// it (field positions, fixed size, encoding).
    pub fn bind(self, target: &LogicalTarget) -> Result<LogicalType, SchemaError> {
        Ok(match self {
            LogicalType::Decimal(t) => LogicalType::Decimal(t.bind(target)?),
            LogicalType::BigInteger(t) => LogicalType::BigInteger(t.bind(target)?),
            LogicalType::Date(t) => LogicalType::Date(t.bind(target)?),
            LogicalType::YearMonth(t) => LogicalType::YearMonth(t.bind(target)?),
            LogicalType::Instant(t) => LogicalType::Instant(t.bind(target)?),
            LogicalType::Text(t) => LogicalType::Text(t.bind(target)?),
            LogicalType::Json(t) => LogicalType::Json(t.bind(target)?),
            LogicalType::Any(t) => LogicalType::Any(t.bind(target)?),
            LogicalType::Annotation(t) => {
                t.validate(target)?;
                LogicalType::Annotation(t)
            }
            LogicalType::Custom(t) => {
                t.validate(target)?;
                LogicalType::Custom(t)
            }
        })
    }

    /// Convert a domain value to its physical form. Values already in
    /// physical form pass through unchanged.
    pub fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        match self {
            LogicalType::Decimal(t) => t.to_wire(value),
            LogicalType::BigInteger(t) => t.to_wire(value),
            LogicalType::Date(t) => t.to_wire(value),
            LogicalType::YearMonth(t) => t.to_wire(value),
            LogicalType::Instant(t) => t.to_wire(value),
            LogicalType::Text(t) => t.to_wire(value),
            LogicalType::Json(t) => t.to_wire(value),
            LogicalType::Any(t) => t.to_wire(value),
            LogicalType::Annotation(_) => Ok(value.clone()),
            LogicalType::Custom(t) => t.to_wire(value),
        }
    }

    /// Convert a physical value to its domain form.
    pub fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        match self {
            LogicalType::Decimal(t) => t.from_wire(value),
            LogicalType::BigInteger(t) => t.from_wire(value),
            LogicalType::Date(t) => t.from_wire(value),
            LogicalType::YearMonth(t) => t.from_wire(value),
            LogicalType::Instant(t) => t.from_wire(value),
            LogicalType::Text(t) => t.from_wire(value),
            LogicalType::Json(t) => t.from_wire(value),
            LogicalType::Any(t) => t.from_wire(value),
            LogicalType::Annotation(_) => Ok(value),
            LogicalType::Custom(t) => t.from_wire(value),
        }
    }

    pub fn as_decimal(&self) -> Option<&DecimalType> {
        match self {
            LogicalType::Decimal(t) => Some(t),
            _ => None,
        }
    }
}

/// Creates logical types from the properties of the schema node they are
/// declared on.
pub trait LogicalTypeFactory: Send + Sync {
    fn create(&self, props: &Properties) -> Result<LogicalType, SchemaError>;
}

impl<F> LogicalTypeFactory for F
where
    F: Fn(&Properties) -> Result<LogicalType, SchemaError> + Send + Sync,
{
    fn create(&self, props: &Properties) -> Result<LogicalType, SchemaError> {
        self(props)
    }
}

/// Settings shared by the built-in logical types.
#[derive(Clone)]
pub struct BuiltinConfig {
    /// Rounding applied by decimals that declare none. `None` means
    /// out-of-range values are rejected.
    pub default_rounding: Option<RoundingMode>,
    /// Cache used by string-encoded dates.
    pub date_cache: Arc<DateStringCache>,
    /// Inference used by `any` for values without a schema.
    pub inference: Arc<dyn SchemaInference>,
}

impl Default for BuiltinConfig {
    fn default() -> Self {
        Self {
            default_rounding: None,
            date_cache: DateStringCache::global(),
            inference: Arc::new(BasicSchemaInference),
        }
    }
}

impl fmt::Debug for BuiltinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinConfig")
            .field("default_rounding", &self.default_rounding)
            .finish()
    }
}

impl BuiltinConfig {
    pub fn with_default_rounding(mut self, mode: RoundingMode) -> Self {
        self.default_rounding = Some(mode);
        self
    }

    pub fn with_date_cache(mut self, cache: Arc<DateStringCache>) -> Self {
        self.date_cache = cache;
        self
    }

    pub fn with_inference(mut self, inference: Arc<dyn SchemaInference>) -> Self {
        self.inference = inference;
        self
    }
}

/// Logical type factories by name.
#[derive(Default)]
pub struct LogicalTypeRegistry {
    factories: RwLock<HashMap<String, Arc<dyn LogicalTypeFactory>>>,
}

static GLOBAL_REGISTRY: Lazy<Arc<LogicalTypeRegistry>> =
    Lazy::new(|| Arc::new(LogicalTypeRegistry::with_builtins(BuiltinConfig::default())));

impl fmt::Debug for LogicalTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalTypeRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl LogicalTypeRegistry {
    /// A registry with no factories.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in logical type.
    pub fn with_builtins(config: BuiltinConfig) -> Self {
        let registry = Self::new();
        let mut factories = registry.factories.write();
        let mut add = |name: &str, factory: Arc<dyn LogicalTypeFactory>| {
            factories.insert(name.to_string(), factory);
        };

        let cfg = config.clone();
        add(
            "decimal",
            Arc::new(move |props: &Properties| {
                DecimalType::from_props(props, cfg.default_rounding).map(LogicalType::Decimal)
            }),
        );
        add(
            "bigint",
            Arc::new(|props: &Properties| {
                BigIntegerType::from_props(props).map(LogicalType::BigInteger)
            }),
        );
        let cache = Arc::clone(&config.date_cache);
        add(
            "date",
            Arc::new(move |_: &Properties| {
                Ok(LogicalType::Date(DateType::new(Arc::clone(&cache))))
            }),
        );
        add(
            "year-month",
            Arc::new(|_: &Properties| Ok(LogicalType::YearMonth(YearMonthType::new()))),
        );
        add(
            "instant",
            Arc::new(|_: &Properties| Ok(LogicalType::Instant(InstantType::instant()))),
        );
        add(
            "timestamp-millis",
            Arc::new(|_: &Properties| {
                Ok(LogicalType::Instant(InstantType::timestamp_millis()))
            }),
        );
        for kind in [TextKind::Uuid, TextKind::Url, TextKind::Uri] {
            add(
                kind.name(),
                Arc::new(move |_: &Properties| Ok(LogicalType::Text(TextType::new(kind)))),
            );
        }
        for kind in [JsonKind::Array, JsonKind::Record, JsonKind::Any] {
            add(
                kind.name(),
                Arc::new(move |_: &Properties| Ok(LogicalType::Json(JsonType::new(kind)))),
            );
        }
        let inference = Arc::clone(&config.inference);
        add(
            "any",
            Arc::new(move |_: &Properties| {
                Ok(LogicalType::Any(AnyType::new(Arc::clone(&inference))))
            }),
        );
        for annotation in ANNOTATIONS {
            let annotation = annotation.clone();
            add(
                annotation.name,
                Arc::new(move |_: &Properties| Ok(LogicalType::Annotation(annotation.clone()))),
            );
        }
        drop(factories);
        registry
    }

    /// The process-wide registry, preloaded with the built-in types.
    pub fn global() -> Arc<LogicalTypeRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Register a factory. Names are unique.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn LogicalTypeFactory>,
    ) -> Result<(), SchemaError> {
        let name = name.into();
        let mut factories = self.factories.write();
        if factories.contains_key(&name) {
            return Err(SchemaError::DuplicateLogicalType(name));
        }
        factories.insert(name, factory);
        Ok(())
    }

    pub fn factory(&self, name: &str) -> Option<Arc<dyn LogicalTypeFactory>> {
        self.factories.read().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}
