// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The payload of a topology tree node and its wire codec.
//!
//! On the wire an [`Element`] takes one of three shapes:
//!
//! ```text
//! "machine"
//! {"processing": {"kind": "core", "id": 3}}
//! {"cache": {"lvl": "L2", "li": 3, "attrs": {"size": 1048576, "line": 64, "ways": 16}}}
//! ```

use std::fmt::{Display, Formatter};

use serde::ser::SerializeMap;
use serde_json::{Map, Number, Value};

use crate::cache::{Cache, CacheAttributes, CacheLevel};
use crate::processing::{Processing, ProcessingKind};

/// Wire token of [`Element::Root`].
pub const ROOT_TOKEN: &str = "machine";

const PROCESSING_KEY: &str = "processing";
const CACHE_KEY: &str = "cache";

/// What a node of the topology tree represents.
///
/// [`Element::Root`] is the machine itself and only ever appears at
/// [`NodeId::ROOT`](crate::NodeId::ROOT).
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
    strum::EnumIs,
)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
pub enum Element {
    /// The machine.
    Root,
    /// A computation unit.
    Processing(Processing),
    /// A caching element.
    Cache(Cache),
}

/// Errors which can occur when decoding an [`Element`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ElementDecodeError {
    /// The named structure was expected to be a JSON object.
    #[error("failed to decode {within}: not an object")]
    NotAnObject { within: &'static str },
    /// The element object has neither a `processing` nor a `cache` key.
    #[error("failed to decode element: expected one of `processing` or `cache`")]
    MissingVariant,
    /// The element object has both a `processing` and a `cache` key.
    #[error("failed to decode element: both `processing` and `cache` are present")]
    AmbiguousVariant,
    /// A required field is missing or has the wrong JSON type.
    #[error("failed to decode {within}: missing or mistyped field `{field}`")]
    InvalidField {
        within: &'static str,
        field: &'static str,
    },
    /// The `kind` of a processing unit names no [`ProcessingKind`].
    #[error("unknown processing kind: '{0}'")]
    UnknownKind(String),
    /// The `lvl` of a cache names no [`CacheLevel`].
    #[error("unknown cache level: '{0}'")]
    UnknownLevel(String),
}

impl Element {
    /// Decode an [`Element`] from an already parsed JSON value.
    ///
    /// Any string starting with `machine` (ASCII case-insensitive) is the root.
    ///
    /// # Errors
    ///
    /// Returns an [`ElementDecodeError`] naming the sub-structure which could not be decoded.
    ///
    /// # Examples
    ///
    /// ```
    /// use hwtopo::{Element, Processing, ProcessingKind};
    /// use serde_json::json;
    ///
    /// assert_eq!(Element::from_value(&json!("MACHINE")).unwrap(), Element::Root);
    /// assert_eq!(
    ///     Element::from_value(&json!({"processing": {"kind": "numa_node", "id": 1}})).unwrap(),
    ///     Element::Processing(Processing::new(ProcessingKind::NumaNode, 1)),
    /// );
    /// ```
    pub fn from_value(value: &Value) -> Result<Element, ElementDecodeError> {
        match value {
            Value::String(token) if is_root_token(token) => Ok(Element::Root),
            Value::Object(fields) => match (fields.get(PROCESSING_KEY), fields.get(CACHE_KEY)) {
                (Some(processing), None) => decode_processing(processing).map(Element::Processing),
                (None, Some(cache)) => decode_cache(cache).map(Element::Cache),
                (Some(_), Some(_)) => Err(ElementDecodeError::AmbiguousVariant),
                (None, None) => Err(ElementDecodeError::MissingVariant),
            },
            _ => Err(ElementDecodeError::NotAnObject { within: "element" }),
        }
    }

    /// Returns the processing unit, if this is one.
    #[must_use]
    pub fn as_processing(&self) -> Option<&Processing> {
        match self {
            Element::Processing(processing) => Some(processing),
            Element::Root | Element::Cache(_) => None,
        }
    }

    /// Returns the cache, if this is one.
    #[must_use]
    pub fn as_cache(&self) -> Option<&Cache> {
        match self {
            Element::Cache(cache) => Some(cache),
            Element::Root | Element::Processing(_) => None,
        }
    }

    /// True if this is a processing unit of the given kind.
    #[must_use]
    pub fn is_processing_kind(&self, kind: ProcessingKind) -> bool {
        self.as_processing().is_some_and(|p| p.kind == kind)
    }

    /// True if this is a cache of the given level.
    #[must_use]
    pub fn is_cache_level(&self, level: CacheLevel) -> bool {
        self.as_cache().is_some_and(|c| c.level == level)
    }
}

fn is_root_token(token: &str) -> bool {
    token
        .get(..ROOT_TOKEN.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ROOT_TOKEN))
}

fn object<'a>(
    value: &'a Value,
    within: &'static str,
) -> Result<&'a Map<String, Value>, ElementDecodeError> {
    value
        .as_object()
        .ok_or(ElementDecodeError::NotAnObject { within })
}

fn string_field<'a>(
    fields: &'a Map<String, Value>,
    within: &'static str,
    field: &'static str,
) -> Result<&'a str, ElementDecodeError> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .ok_or(ElementDecodeError::InvalidField { within, field })
}

/// Integral value of a JSON number, truncating fractions toward zero.
///
/// Callers narrow the result with `as`, i.e. with wrapping conversion.
#[allow(clippy::cast_possible_truncation)]
fn integral_field(
    fields: &Map<String, Value>,
    within: &'static str,
    field: &'static str,
) -> Result<i128, ElementDecodeError> {
    let number: &Number = match fields.get(field) {
        Some(Value::Number(number)) => number,
        _ => return Err(ElementDecodeError::InvalidField { within, field }),
    };
    if let Some(unsigned) = number.as_u64() {
        Ok(i128::from(unsigned))
    } else if let Some(signed) = number.as_i64() {
        Ok(i128::from(signed))
    } else {
        // serde_json numbers are never NaN; infinities saturate
        Ok(number.as_f64().map_or(0, |float| float as i128))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decode_processing(value: &Value) -> Result<Processing, ElementDecodeError> {
    const WITHIN: &str = "processing";
    let fields = object(value, WITHIN)?;
    let kind = string_field(fields, WITHIN, "kind")?;
    let id = integral_field(fields, WITHIN, "id")?;
    Ok(Processing {
        kind: ProcessingKind::parse(kind)?,
        id: id as u32,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decode_cache(value: &Value) -> Result<Cache, ElementDecodeError> {
    const WITHIN: &str = "cache";
    const ATTRS: &str = "cache.attrs";
    let fields = object(value, WITHIN)?;
    let level = string_field(fields, WITHIN, "lvl")?;
    let logical_index = integral_field(fields, WITHIN, "li")?;
    let attrs = match fields.get("attrs") {
        Some(attrs) => object(attrs, ATTRS)?,
        None => {
            return Err(ElementDecodeError::InvalidField {
                within: WITHIN,
                field: "attrs",
            });
        }
    };
    let size = integral_field(attrs, ATTRS, "size")?;
    let line_size = integral_field(attrs, ATTRS, "line")?;
    let associativity = integral_field(attrs, ATTRS, "ways")?;
    Ok(Cache {
        level: CacheLevel::parse(level)?,
        logical_index: logical_index as u32,
        attributes: CacheAttributes {
            size: size as u64,
            line_size: line_size as u32,
            associativity: associativity as i32,
        },
    })
}

impl TryFrom<&Value> for Element {
    type Error = ElementDecodeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Element::from_value(value)
    }
}

impl From<Processing> for Element {
    fn from(processing: Processing) -> Self {
        Element::Processing(processing)
    }
}

impl From<Cache> for Element {
    fn from(cache: Cache) -> Self {
        Element::Cache(cache)
    }
}

impl serde::Serialize for Element {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Element::Root => serializer.serialize_str(ROOT_TOKEN),
            Element::Processing(processing) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(PROCESSING_KEY, processing)?;
                map.end()
            }
            Element::Cache(cache) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(CACHE_KEY, cache)?;
                map.end()
            }
        }
    }
}

impl<'de> serde::Deserialize<'de> for Element {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Value as serde::Deserialize>::deserialize(deserializer)?;
        Element::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Element::Root => f.write_str("Machine"),
            Element::Processing(processing) => Display::fmt(processing, f),
            Element::Cache(cache) => Display::fmt(cache, f),
        }
    }
}
