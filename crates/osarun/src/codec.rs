//! # Wire Codec
//!
//! Total, symmetric mapping between local `Value`s and `WireValue`s.
//!
//! ## Invariants
//!
//! - Encoding never touches the transport. A value with no wire
//!   representation fails with `UnsupportedType` before any command is sent.
//! - Decoding a `reference` resolves its proxy type and acquires one count as
//!   part of constructing the proxy.
//! - Dates travel as fractional epoch seconds and survive one round trip to
//!   the microsecond.

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use osapack::Reference;
use osapack::Scalar;
use osapack::WireValue;

use crate::error::Error;
use crate::error::Result;
use crate::proxy::AppLink;
use crate::proxy::ObjectProxy;
use crate::session::Session;
use crate::session::SessionId;
use crate::value::Value;

/// Deepest container nesting accepted by the encoder.
pub const MAX_DEPTH: usize = 64;

/// Encodes a local value for sending over the session `owner`.
pub fn encode(owner: SessionId, value: &Value) -> Result<WireValue> {
    encode_at(owner, value, 0)
}

fn encode_at(owner: SessionId, value: &Value, depth: usize) -> Result<WireValue> {
    if depth > MAX_DEPTH {
        return Err(Error::UnsupportedType(format!("nesting deeper than {}", MAX_DEPTH)));
    }

    Ok(match value {
        Value::Null => WireValue::null(),
        Value::Bool(v) => WireValue::bool(*v),
        Value::Int(v) => WireValue::int(*v),
        Value::Float(v) if !v.is_finite() => {
            return Err(Error::UnsupportedType(format!("non-finite float {}", v)));
        }
        Value::Float(v) => WireValue::plain(Scalar::Float(*v)),
        Value::String(s) => WireValue::string(s.as_str()),
        Value::Date(d) => WireValue::date(epoch_seconds(d)),
        Value::Array(items) => WireValue::array(
            items
                .iter()
                .map(|v| encode_at(owner, v, depth + 1))
                .collect::<Result<_>>()?,
        ),
        Value::Dict(entries) => WireValue::dict(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), encode_at(owner, v, depth + 1)?)))
                .collect::<Result<_>>()?,
        ),
        Value::Object(proxy) => {
            let minted_by = proxy.session().id();
            if minted_by != owner {
                return Err(Error::UnsupportedType(format!(
                    "object {} belongs to {}, not {}",
                    proxy.id(),
                    minted_by,
                    owner
                )));
            }
            WireValue::reference(Reference::outbound(proxy.id()))
        }
    })
}

/// Encodes positional arguments.
pub(crate) fn encode_args(owner: SessionId, args: &[Value]) -> Result<Vec<WireValue>> {
    args.iter().map(|v| encode(owner, v)).collect()
}

/// Encodes named arguments.
pub(crate) fn encode_map(
    owner: SessionId,
    map: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, WireValue>> {
    map.iter().map(|(k, v)| Ok((k.clone(), encode(owner, v)?))).collect()
}

/// Decodes a reply value received over `session`.
///
/// `scope` is the application the request was made against; references
/// without an `appName` of their own are resolved in that scope.
pub(crate) fn decode(session: &Session, wire: WireValue, scope: Option<&AppLink>) -> Result<Value> {
    Ok(match wire {
        WireValue::Plain { data } => match data {
            Scalar::Null => Value::Null,
            Scalar::Bool(v) => Value::Bool(v),
            Scalar::Int(v) => Value::Int(v),
            Scalar::Float(v) => Value::Float(v),
            Scalar::Str(s) => Value::String(s),
        },
        WireValue::Date { data } => Value::Date(from_epoch_seconds(data)?),
        WireValue::Array { data } => Value::Array(
            data.into_iter()
                .map(|v| decode(session, v, scope))
                .collect::<Result<_>>()?,
        ),
        WireValue::Dict { data } => Value::Dict(
            data.into_iter()
                .map(|(k, v)| Ok((k, decode(session, v, scope)?)))
                .collect::<Result<_>>()?,
        ),
        WireValue::Reference(reference) => {
            Value::Object(ObjectProxy::from_reference(session, reference, scope))
        }
    })
}

fn epoch_seconds(date: &DateTime<Utc>) -> f64 {
    date.timestamp_micros() as f64 / 1_000_000.0
}

fn from_epoch_seconds(seconds: f64) -> Result<DateTime<Utc>> {
    let micros = (seconds * 1_000_000.0).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return Err(Error::UnexpectedValue { expected: "date", found: seconds.to_string() });
    }
    DateTime::from_timestamp_micros(micros as i64)
        .ok_or_else(|| Error::UnexpectedValue { expected: "date", found: seconds.to_string() })
}
