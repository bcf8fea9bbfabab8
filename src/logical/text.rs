//! String-backed identifiers: `uuid`, `url` and `uri`.

use uuid::Uuid;

use crate::error::{ConversionError, SchemaError};
use crate::schema::SchemaType;
use crate::value::AvroValue;

use super::LogicalTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKind {
    Uuid,
    /// Absolute URL, parsed and normalized.
    Url,
    /// URI reference, kept verbatim.
    Uri,
}

impl TextKind {
    pub fn name(self) -> &'static str {
        match self {
            TextKind::Uuid => "uuid",
            TextKind::Url => "url",
            TextKind::Uri => "uri",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextType {
    kind: TextKind,
}

impl TextType {
    pub fn new(kind: TextKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> TextKind {
        self.kind
    }

    pub(crate) fn bind(self, target: &LogicalTarget) -> Result<Self, SchemaError> {
        if target.schema_type != SchemaType::String {
            return Err(target.reject(self.kind.name(), "string"));
        }
        Ok(self)
    }

    pub(crate) fn to_wire(&self, value: &AvroValue) -> Result<AvroValue, ConversionError> {
        Ok(match value {
            AvroValue::Uuid(u) => AvroValue::String(u.hyphenated().to_string()),
            AvroValue::Url(u) => AvroValue::String(u.as_str().to_string()),
            AvroValue::Uri(u) => AvroValue::String(u.clone()),
            other => other.clone(),
        })
    }

    pub(crate) fn from_wire(&self, value: AvroValue) -> Result<AvroValue, ConversionError> {
        let name = self.kind.name();
        let text = match value {
            AvroValue::String(text) => text,
            v @ (AvroValue::Uuid(_) | AvroValue::Url(_) | AvroValue::Uri(_)) => return Ok(v),
            other => {
                return Err(ConversionError::Unsupported {
                    logical_type: name.to_string(),
                    variant: other.type_name().to_string(),
                })
            }
        };
        match self.kind {
            TextKind::Uuid => Uuid::parse_str(&text)
                .map(AvroValue::Uuid)
                .map_err(|e| ConversionError::invalid(name, format!("'{}': {}", text, e))),
            TextKind::Url => url::Url::parse(&text)
                .map(AvroValue::Url)
                .map_err(|e| ConversionError::invalid(name, format!("'{}': {}", text, e))),
            TextKind::Uri => Ok(AvroValue::Uri(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Properties;

    fn bound(kind: TextKind) -> TextType {
        TextType::new(kind)
            .bind(&LogicalTarget {
                schema_type: SchemaType::String,
                props: Properties::new(),
                fields: vec![],
                fixed_size: None,
            })
            .unwrap()
    }

    #[test]
    fn test_uuid_round_trip() {
        let t = bound(TextKind::Uuid);
        let text = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let value = t.from_wire(AvroValue::String(text.into())).unwrap();
        assert!(matches!(value, AvroValue::Uuid(_)));
        assert_eq!(t.to_wire(&value).unwrap(), AvroValue::String(text.into()));
        assert!(t.from_wire(AvroValue::String("not-a-uuid".into())).is_err());
    }

    #[test]
    fn test_url_and_uri() {
        let url = bound(TextKind::Url);
        let value = url
            .from_wire(AvroValue::String("https://example.com/a?b=1".into()))
            .unwrap();
        assert_eq!(
            url.to_wire(&value).unwrap(),
            AvroValue::String("https://example.com/a?b=1".into())
        );
        assert!(url.from_wire(AvroValue::String("relative/path".into())).is_err());

        let uri = bound(TextKind::Uri);
        assert_eq!(
            uri.from_wire(AvroValue::String("relative/path".into())).unwrap(),
            AvroValue::Uri("relative/path".into())
        );
    }

    #[test]
    fn test_string_required() {
        let target = LogicalTarget {
            schema_type: SchemaType::Bytes,
            props: Properties::new(),
            fields: vec![],
            fixed_size: None,
        };
        assert!(TextType::new(TextKind::Uuid).bind(&target).is_err());
    }
}
