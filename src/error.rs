//! Error types for schema construction, logical type conversion and the codecs.

use thiserror::Error;

/// Errors raised while building, parsing or rendering schemas.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Invalid schema shape
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Malformed schema document
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Name reference that was never declared
    #[error("Undefined name: {0}")]
    UndefinedName(String),
    /// Named type or alias registered twice
    #[error("Duplicate name: {0}")]
    DuplicateName(String),
    /// Identifier with illegal characters
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    /// A record's field list was assigned twice
    #[error("Fields already set on record '{0}'")]
    FieldsAlreadySet(String),
    /// A record was published before its fields were assigned
    #[error("Fields never set on record '{0}'")]
    FieldsNotSet(String),
    /// Union with duplicate branches or a nested union
    #[error("Invalid union: {0}")]
    InvalidUnion(String),
    /// Reserved property used as a custom property
    #[error("Cannot add reserved property '{0}'")]
    ReservedProperty(String),
    /// Property already present with a different value
    #[error("Property '{name}' already set to {existing}, cannot change to {attempted}")]
    PropertyConflict {
        name: String,
        existing: String,
        attempted: String,
    },
    /// Logical type attached twice
    #[error("Logical type '{existing}' already set, cannot replace with '{attempted}'")]
    LogicalTypeAlreadySet { existing: String, attempted: String },
    /// Logical type rejected the backing schema
    #[error("Invalid logical type '{logical_type}': {reason}")]
    InvalidLogicalType {
        logical_type: String,
        reason: String,
    },
    /// `logicalType` names no registered factory
    #[error("Undefined logical type: {0}")]
    UndefinedLogicalType(String),
    /// Factory registered twice under one name
    #[error("Logical type '{0}' is already registered")]
    DuplicateLogicalType(String),
    /// Field default does not conform to the field schema
    #[error("Invalid default for field '{field}': {reason}")]
    InvalidDefault { field: String, reason: String },
    /// External schema reference failure
    #[error("Schema reference error: {0}")]
    Reference(String),
    /// Writer and reader schemas cannot be reconciled
    #[error("Incompatible schemas: {0}")]
    IncompatibleSchemas(String),
}

/// Errors raised by logical type conversions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Value has more significant digits than the declared ceiling
    #[error("Precision {received} exceeds maximum precision {max}")]
    PrecisionExceeded { received: u64, max: u64 },
    /// Rescaling would drop digits and no rounding mode is configured
    #[error("Rescaling {value} to scale {scale} requires rounding")]
    InexactRescale { value: String, scale: i64 },
    /// Logical type invoked against a variant it does not support
    #[error("Logical type '{logical_type}' does not support {variant}")]
    Unsupported {
        logical_type: String,
        variant: String,
    },
    /// Value of the wrong shape or outside the representable range
    #[error("Invalid value for '{logical_type}': {reason}")]
    InvalidValue {
        logical_type: String,
        reason: String,
    },
}

impl ConversionError {
    pub(crate) fn invalid(logical_type: &str, reason: impl Into<String>) -> Self {
        ConversionError::InvalidValue {
            logical_type: logical_type.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the grammar automaton.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    /// The codec asked for a terminal the grammar does not expect here
    #[error("Expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },
    /// Writer and reader cannot be resolved at this position
    #[error("Resolution error: {0}")]
    Resolution(String),
    /// Union or enum selection out of range
    #[error("Index {index} out of range for {what} with {len} entries")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// Structural call made in the wrong grammar state
    #[error("Invalid grammar state: {0}")]
    InvalidState(String),
}

/// Errors that can occur during encoding
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Value does not match the schema at this position
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    /// Value is structurally valid but not encodable
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    /// A record field has no value and no default
    #[error("Missing value for field '{field}' of record '{record}'")]
    MissingField { record: String, field: String },
    /// Grammar automaton error
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    /// Logical type conversion error
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Schema error surfaced while encoding
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// JSON rendering error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Invalid Avro data
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Unexpected end of data
    #[error("Unexpected end of input")]
    UnexpectedEof,
    /// Type mismatch
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// Invalid varint encoding
    #[error("Invalid varint encoding")]
    InvalidVarint,
    /// String is not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Union discriminator that names no branch
    #[error("Unknown union branch '{label}' for union {union}")]
    UnknownUnionBranch { label: String, union: String },
    /// Enum symbol unknown to the reader and no default declared
    #[error("Unknown symbol '{symbol}' for enum '{enum_name}'")]
    UnknownEnumSymbol { symbol: String, enum_name: String },
    /// Required field absent from the input and without a default
    #[error("Missing required field '{field}' in record '{record}'")]
    MissingField { record: String, field: String },
    /// Trailing unrecognized fields in strict mode
    #[error("Unknown fields {fields:?} in record '{record}'")]
    UnknownFields { record: String, fields: Vec<String> },
    /// Grammar automaton error
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    /// Logical type conversion error
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Schema error surfaced while decoding
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Malformed JSON input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<EncodeError> for DecodeError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::Grammar(e) => DecodeError::Grammar(e),
            EncodeError::Conversion(e) => DecodeError::Conversion(e),
            EncodeError::Schema(e) => DecodeError::Schema(e),
            other => DecodeError::InvalidData(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_error_names_both_precisions() {
        let err = ConversionError::PrecisionExceeded {
            received: 8,
            max: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains('8'));
        assert!(msg.contains('5'));
    }

    #[test]
    fn test_conversion_error_wraps_into_codec_errors() {
        let err: DecodeError = ConversionError::invalid("uuid", "bad").into();
        assert!(matches!(err, DecodeError::Conversion(_)));
        let err: EncodeError = ConversionError::invalid("uuid", "bad").into();
        assert!(matches!(err, EncodeError::Conversion(_)));
    }

    #[test]
    fn test_unknown_fields_message_lists_fields() {
        let err = DecodeError::UnknownFields {
            record: "User".into(),
            fields: vec!["extra".into()],
        };
        assert!(err.to_string().contains("extra"));
        assert!(err.to_string().contains("User"));
    }
}
