//! # Wire Values
//!
//! The tagged union exchanged with the remote script, in its exact JSON shape.
//!
//! ## Format
//!
//! - **plain**: `{"type":"plain","data":<null|bool|number|string>}`
//! - **date**: `{"type":"date","data":<epoch seconds>}`
//! - **array**: `{"type":"array","data":[...]}`
//! - **dict**: `{"type":"dict","data":{...}}`
//! - **reference**: `{"type":"reference","objId":N,"className":..,"appName":..,"plainRepr":..}`
//!
//! ## Invariants
//! - Encoding then decoding any value yields an equal value.
//! - A missing `data` on a plain value reads as null.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;

/// Prefix the remote side puts on the class name of sequence specifiers.
pub const ARRAY_CLASS_PREFIX: &str = "array::";

/// Opaque handle the remote side assigned to one of its objects.
pub type ObjectId = u64;

/// A primitive scalar carried by a `plain` value.
///
/// Integral JSON numbers read as `Int`, everything else numeric as `Float`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A reference to an object living in the remote process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub obj_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_repr: Option<serde_json::Value>,
}

impl Reference {
    /// An outbound reference. The remote side already knows the object, so
    /// only the identifier travels.
    pub fn outbound(obj_id: ObjectId) -> Self {
        Self { obj_id, class_name: None, app_name: None, plain_repr: None }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_app(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// True when the class name carries the sequence marker.
    pub fn is_array(&self) -> bool {
        self.class_name
            .as_deref()
            .is_some_and(|c| c.starts_with(ARRAY_CLASS_PREFIX))
    }
}

/// One value on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireValue {
    Plain {
        #[serde(default)]
        data: Scalar,
    },
    Date {
        data: f64,
    },
    Array {
        data: Vec<WireValue>,
    },
    Dict {
        data: BTreeMap<String, WireValue>,
    },
    Reference(Reference),
}

impl WireValue {
    pub fn null() -> Self {
        Self::Plain { data: Scalar::Null }
    }

    pub fn plain(data: Scalar) -> Self {
        Self::Plain { data }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::Plain { data: Scalar::Str(s.into()) }
    }

    pub fn int(v: i64) -> Self {
        Self::Plain { data: Scalar::Int(v) }
    }

    pub fn bool(v: bool) -> Self {
        Self::Plain { data: Scalar::Bool(v) }
    }

    pub fn date(epoch_seconds: f64) -> Self {
        Self::Date { data: epoch_seconds }
    }

    pub fn array(items: Vec<WireValue>) -> Self {
        Self::Array { data: items }
    }

    pub fn dict(entries: BTreeMap<String, WireValue>) -> Self {
        Self::Dict { data: entries }
    }

    pub fn reference(reference: Reference) -> Self {
        Self::Reference(reference)
    }

    /// Name of the wire tag, as it appears in the `type` field.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Plain { .. } => "plain",
            Self::Date { .. } => "date",
            Self::Array { .. } => "array",
            Self::Dict { .. } => "dict",
            Self::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Plain { data: Scalar::Null })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Plain { data: Scalar::Str(s) } => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Plain { data: Scalar::Int(v) } => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[WireValue]> {
        match self {
            Self::Array { data } => Some(data),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, WireValue>> {
        match self {
            Self::Dict { data } => Some(data),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Serializes to the textual form carried by the transport.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses the textual form carried by the transport.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl From<Reference> for WireValue {
    fn from(r: Reference) -> Self {
        Self::Reference(r)
    }
}
