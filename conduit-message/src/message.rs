use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MessageError;

/// A single named, typed value attached to a [`Message`].
///
/// A field may carry more than one value of the same type (Heka-style
/// "array fields"); single-valued fields are simply a one-element vec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Free-form unit/encoding hint (e.g. "ipv4", "email"), never interpreted by conduit itself.
    pub representation: Option<String>,
    pub value: FieldValue,
}

impl Field {
    pub fn string(name: impl Into<String>, values: Vec<String>) -> Self {
        Field { name: name.into(), representation: None, value: FieldValue::String(values) }
    }

    pub fn integer(name: impl Into<String>, values: Vec<i64>) -> Self {
        Field { name: name.into(), representation: None, value: FieldValue::Integer(values) }
    }

    pub fn double(name: impl Into<String>, values: Vec<f64>) -> Self {
        Field { name: name.into(), representation: None, value: FieldValue::Double(values) }
    }

    pub fn boolean(name: impl Into<String>, values: Vec<bool>) -> Self {
        Field { name: name.into(), representation: None, value: FieldValue::Bool(values) }
    }

    pub fn bytes(name: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        Field { name: name.into(), representation: None, value: FieldValue::Bytes(values) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    String(Vec<String>),
    Integer(Vec<i64>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    Bytes(Vec<Vec<u8>>),
}

/// The fixed string fields a match expression can reference directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringHeader {
    Uuid,
    Type,
    Logger,
    Payload,
    EnvVersion,
    Hostname,
}

/// The fixed numeric fields a match expression can reference directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericHeader {
    Timestamp,
    Severity,
    Pid,
}

/// A single telemetry record: a fixed header plus an ordered set of
/// arbitrary typed fields.
///
/// Serializes to and deserializes from a self-describing binary form
/// (MessagePack, via `rmp-serde`) so it can be spooled, framed on the wire,
/// and round-tripped without an external schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub uuid: Uuid,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub message_type: String,
    pub logger: String,
    pub severity: i32,
    pub payload: String,
    pub env_version: String,
    pub pid: i32,
    pub hostname: String,
    pub fields: Vec<Field>,
}

impl Message {
    pub fn new(message_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Message {
            uuid: Uuid::new_v4(),
            timestamp: now_nanos(),
            message_type: message_type.into(),
            logger: String::new(),
            severity: 7, // debug, matching syslog's least-severe level as the harmless default
            payload: payload.into(),
            env_version: String::new(),
            pid: 0,
            hostname: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn string_header(&self, header: StringHeader) -> std::borrow::Cow<'_, str> {
        match header {
            StringHeader::Uuid => std::borrow::Cow::Owned(self.uuid.to_string()),
            StringHeader::Type => std::borrow::Cow::Borrowed(&self.message_type),
            StringHeader::Logger => std::borrow::Cow::Borrowed(&self.logger),
            StringHeader::Payload => std::borrow::Cow::Borrowed(&self.payload),
            StringHeader::EnvVersion => std::borrow::Cow::Borrowed(&self.env_version),
            StringHeader::Hostname => std::borrow::Cow::Borrowed(&self.hostname),
        }
    }

    pub fn numeric_header(&self, header: NumericHeader) -> f64 {
        match header {
            NumericHeader::Timestamp => self.timestamp as f64,
            NumericHeader::Severity => self.severity as f64,
            NumericHeader::Pid => self.pid as f64,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Encodes the message to its self-describing binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        rmp_serde::to_vec_named(self).map_err(MessageError::Encode)
    }

    /// Decodes a message previously produced by [`Message::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        rmp_serde::from_slice(bytes).map_err(MessageError::Decode)
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
