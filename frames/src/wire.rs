//! Protobuf shapes for [`Frame`](crate::Frame) and the JSON ↔ `Struct` bridge.
//!
//! `data` travels as a `google.protobuf.Value`, so every JSON number becomes
//! an `f64` on the way through. Non-finite numbers cannot be represented in
//! JSON and decode as `null`.

use prost::Message;
use prost_types::value::Kind;
use serde_json::{Map, Number, Value};

use crate::{CodecError, Frame, Status};

#[derive(Clone, PartialEq, Message)]
pub(crate) struct WireFrame {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, optional, tag = "2")]
    pub parent_id: Option<String>,
    #[prost(int64, tag = "3")]
    pub ts: i64,
    #[prost(string, optional, tag = "4")]
    pub room_id: Option<String>,
    /// `Frame::from` on the wire. Not named `from`: prost would generate a
    /// `from()` getter that shadows `From::from`.
    #[prost(string, optional, tag = "5")]
    pub sender: Option<String>,
    #[prost(string, tag = "6")]
    pub syscall: String,
    #[prost(enumeration = "WireStatus", tag = "7")]
    pub status: i32,
    #[prost(message, optional, tag = "8")]
    pub data: Option<prost_types::Value>,
}

/// Wire numbering. Stable: clients in the field decode by these values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub(crate) enum WireStatus {
    Request = 0,
    Done = 1,
    Error = 2,
    Cancel = 3,
    Item = 4,
    Bulk = 5,
}

impl From<Status> for WireStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Request => Self::Request,
            Status::Item => Self::Item,
            Status::Bulk => Self::Bulk,
            Status::Done => Self::Done,
            Status::Error => Self::Error,
            Status::Cancel => Self::Cancel,
        }
    }
}

impl From<WireStatus> for Status {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Request => Self::Request,
            WireStatus::Item => Self::Item,
            WireStatus::Bulk => Self::Bulk,
            WireStatus::Done => Self::Done,
            WireStatus::Error => Self::Error,
            WireStatus::Cancel => Self::Cancel,
        }
    }
}

impl From<&Frame> for WireFrame {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id.clone(),
            parent_id: frame.parent_id.clone(),
            ts: frame.ts,
            room_id: frame.room_id.clone(),
            sender: frame.from.clone(),
            syscall: frame.syscall.clone(),
            status: frame.status.as_i32(),
            data: Some(to_proto(&frame.data)),
        }
    }
}

impl TryFrom<WireFrame> for Frame {
    type Error = CodecError;

    fn try_from(wire: WireFrame) -> Result<Self, Self::Error> {
        let status = Status::from_i32(wire.status)?;
        let data = wire
            .data
            .as_ref()
            .map_or_else(|| Value::Object(Map::new()), from_proto);
        Ok(Self {
            id: wire.id,
            parent_id: wire.parent_id,
            ts: wire.ts,
            room_id: wire.room_id,
            from: wire.sender,
            syscall: wire.syscall,
            status,
            data,
        })
    }
}

pub(crate) fn to_proto(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue.into()),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(to_proto).collect(),
        }),
        Value::Object(map) => Kind::StructValue(prost_types::Struct {
            fields: map.iter().map(|(k, v)| (k.clone(), to_proto(v))).collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

pub(crate) fn from_proto(value: &prost_types::Value) -> Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::NumberValue(n)) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(from_proto).collect()),
        Some(Kind::StructValue(obj)) => {
            Value::Object(obj.fields.iter().map(|(k, v)| (k.clone(), from_proto(v))).collect())
        }
    }
}
