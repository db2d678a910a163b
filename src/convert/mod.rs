//! Value conversion between in-process representations and stored text.
//!
//! Converters are selected by a four-part key: source type, source format,
//! target type, target format. Conversion is the identity when source and
//! target tags are equal, so an empty registry already passes
//! pre-serialized text straight through.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::{RedriveError, Result};

/// Logical type of a value (e.g. "string", "user").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn of(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The stored-text type: a plain string of serialized content.
    pub fn string() -> Self {
        Self::of("string")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire format of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    pub fn of(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn json() -> Self {
        Self::of("application/json")
    }

    /// In-process representation, not yet serialized.
    pub fn native() -> Self {
        Self::of("application/x-native")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value in one of the shapes the gateway moves between.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(JsonValue),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Json(_) => None,
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            Payload::Text(s) => Ok(s),
            Payload::Json(v) => Err(RedriveError::Conversion(format!(
                "expected text payload, got JSON value {v}"
            ))),
        }
    }
}

/// A payload tagged with its logical type and format.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub data: Payload,
    pub ty: TypeTag,
    pub media: MediaType,
}

impl TypedValue {
    /// Already-serialized JSON text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            data: Payload::Text(content.into()),
            ty: TypeTag::string(),
            media: MediaType::json(),
        }
    }

    /// An in-process JSON value carrying a logical type tag.
    pub fn json(value: JsonValue, ty: TypeTag) -> Self {
        Self {
            data: Payload::Json(value),
            ty,
            media: MediaType::native(),
        }
    }
}

/// Lookup key selecting a converter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    pub source_type: TypeTag,
    pub source_media: MediaType,
    pub target_type: TypeTag,
    pub target_media: MediaType,
}

impl ConversionKey {
    pub fn new(
        source_type: TypeTag,
        source_media: MediaType,
        target_type: TypeTag,
        target_media: MediaType,
    ) -> Self {
        Self {
            source_type,
            source_media,
            target_type,
            target_media,
        }
    }

    fn is_identity(&self) -> bool {
        self.source_type == self.target_type && self.source_media == self.target_media
    }
}

impl fmt::Display for ConversionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}({})",
            self.source_type, self.source_media, self.target_type, self.target_media
        )
    }
}

/// A single registered conversion.
pub trait Converter: Send + Sync {
    fn convert(&self, value: &Payload) -> Result<Payload>;
}

impl<F> Converter for F
where
    F: Fn(&Payload) -> Result<Payload> + Send + Sync,
{
    fn convert(&self, value: &Payload) -> Result<Payload> {
        self(value)
    }
}

/// Conversion gateway contract.
pub trait ConversionService: Send + Sync {
    fn convert(&self, value: Payload, key: &ConversionKey) -> Result<Payload>;
}

/// Registry of converters keyed by (source type, source format, target type,
/// target format).
#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<ConversionKey, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for a key. Replaces any previous registration.
    pub fn register<C>(&mut self, key: ConversionKey, converter: C)
    where
        C: Converter + 'static,
    {
        self.converters.insert(key, Arc::new(converter));
    }

    /// Register the stock JSON encode/decode pair for a native type tag, so
    /// values of that type round-trip through stored text.
    pub fn register_json(&mut self, ty: &TypeTag) {
        self.register(
            ConversionKey::new(
                ty.clone(),
                MediaType::native(),
                TypeTag::string(),
                MediaType::json(),
            ),
            json_encode,
        );
        self.register(
            ConversionKey::new(
                TypeTag::string(),
                MediaType::json(),
                ty.clone(),
                MediaType::native(),
            ),
            json_decode,
        );
    }
}

impl ConversionService for ConverterRegistry {
    fn convert(&self, value: Payload, key: &ConversionKey) -> Result<Payload> {
        if key.is_identity() {
            return Ok(value);
        }

        match self.converters.get(key) {
            Some(converter) => converter.convert(&value),
            None => Err(RedriveError::Conversion(format!(
                "no converter registered for {key}"
            ))),
        }
    }
}

/// Serialize an in-process JSON value to stored text.
pub fn json_encode(value: &Payload) -> Result<Payload> {
    match value {
        Payload::Json(v) => Ok(Payload::Text(serde_json::to_string(v)?)),
        Payload::Text(s) => Ok(Payload::Text(s.clone())),
    }
}

/// Parse stored text back into a JSON value.
pub fn json_decode(value: &Payload) -> Result<Payload> {
    match value {
        Payload::Text(s) => Ok(Payload::Json(serde_json::from_str(s)?)),
        Payload::Json(v) => Ok(Payload::Json(v.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn native_to_text() -> ConversionKey {
        ConversionKey::new(
            TypeTag::of("user"),
            MediaType::native(),
            TypeTag::string(),
            MediaType::json(),
        )
    }

    #[test]
    fn identity_key_passes_value_through() {
        let registry = ConverterRegistry::new();
        let key = ConversionKey::new(
            TypeTag::string(),
            MediaType::json(),
            TypeTag::string(),
            MediaType::json(),
        );

        let value = Payload::Text(r#"{"name":"johny"}"#.to_string());
        let converted = registry.convert(value.clone(), &key).unwrap();

        assert_eq!(converted, value);
    }

    #[test]
    fn missing_converter_is_an_error() {
        let registry = ConverterRegistry::new();

        let err = registry
            .convert(Payload::Json(json!({})), &native_to_text())
            .unwrap_err();

        assert!(matches!(err, RedriveError::Conversion(_)));
    }

    #[test]
    fn registered_converter_is_applied() {
        let mut registry = ConverterRegistry::new();
        registry.register(native_to_text(), json_encode);

        let converted = registry
            .convert(Payload::Json(json!({"name": "johny"})), &native_to_text())
            .unwrap();

        assert_eq!(converted, Payload::Text(r#"{"name":"johny"}"#.to_string()));
    }

    #[test]
    fn json_pair_round_trips() {
        let value = json!({"name": "johny", "age": 31});

        let encoded = json_encode(&Payload::Json(value.clone())).unwrap();
        let decoded = json_decode(&encoded).unwrap();

        assert_eq!(decoded, Payload::Json(value));
    }
}
