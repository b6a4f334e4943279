/// Ordered-fallback field extraction from nested producer payloads.
///
/// Each semantic field has a fixed list of candidate paths per payload shape.
/// Candidates are tried left to right and the first non-null value wins. While
/// walking a path, arrays contribute their first element, which is how the
/// protocol shape batches messages under `data.m`.
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::normalize::Shape;

/// A path of object keys from the payload root.
pub type Path = &'static [&'static str];

/// Marker that flags a conversation key as a group, matched case-insensitively.
pub const GROUP_MARKER: char = 'g';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Store,
    Text,
    /// Peer of an outgoing message.
    Recipient,
    /// Peer of an incoming message.
    Sender,
    FromMe,
    /// Producer event time in epoch seconds.
    EventEpoch,
    /// Stub and protocol kinds; every present candidate is relevant.
    MessageKind,
    Message,
    Broadcast,
}

const PROTOCOL_STORE: &[Path] = &[&["client", "store"]];
const PROTOCOL_TEXT: &[Path] = &[
    &["data", "m", "message", "conversation"],
    &["data", "m", "message", "extendedTextMessage", "text"],
    &["data", "m", "message", "imageMessage", "caption"],
    &["data", "m", "message", "imageMessage", "fileSha256"],
    &["data", "m", "message", "stickerMessage", "fileSha256"],
];
const PROTOCOL_PEER: &[Path] = &[&["data", "m", "key", "remoteJid"]];
const PROTOCOL_FROM_ME: &[Path] = &[&["data", "m", "key", "fromMe"]];
const PROTOCOL_EPOCH: &[Path] = &[&["data", "m", "messageTimestamp"]];
const PROTOCOL_KIND: &[Path] = &[
    &["data", "m", "messageStubType"],
    &["data", "m", "message", "protocolMessage", "type"],
];
const PROTOCOL_MESSAGE: &[Path] = &[&["data", "m", "message"]];

const CONVERSATIONAL_STORE: &[Path] = &[&["store"]];
const CONVERSATIONAL_TEXT: &[Path] = &[&["message", "otherInfo", "body"], &["message", "message"]];
const CONVERSATIONAL_RECIPIENT: &[Path] = &[&["message", "otherInfo", "to"]];
const CONVERSATIONAL_SENDER: &[Path] = &[&["message", "otherInfo", "author"]];
const CONVERSATIONAL_FROM_ME: &[Path] = &[&["message", "fromMe"]];
const CONVERSATIONAL_EPOCH: &[Path] = &[&["message", "date"]];
const CONVERSATIONAL_MESSAGE: &[Path] = &[&["message", "message"]];
const CONVERSATIONAL_BROADCAST: &[Path] = &[&["message", "otherInfo", "broadcast"]];

const NONE: &[Path] = &[];

static NULL: Value = Value::Null;

/// Candidate paths for `field` under `shape`, in resolution order.
pub fn candidates(shape: Shape, field: Field) -> &'static [Path] {
    match (shape, field) {
        (Shape::Protocol, Field::Store) => PROTOCOL_STORE,
        (Shape::Protocol, Field::Text) => PROTOCOL_TEXT,
        (Shape::Protocol, Field::Recipient | Field::Sender) => PROTOCOL_PEER,
        (Shape::Protocol, Field::FromMe) => PROTOCOL_FROM_ME,
        (Shape::Protocol, Field::EventEpoch) => PROTOCOL_EPOCH,
        (Shape::Protocol, Field::MessageKind) => PROTOCOL_KIND,
        (Shape::Protocol, Field::Message) => PROTOCOL_MESSAGE,
        (Shape::Protocol, Field::Broadcast) => NONE,
        (Shape::Conversational, Field::Store) => CONVERSATIONAL_STORE,
        (Shape::Conversational, Field::Text) => CONVERSATIONAL_TEXT,
        (Shape::Conversational, Field::Recipient) => CONVERSATIONAL_RECIPIENT,
        (Shape::Conversational, Field::Sender) => CONVERSATIONAL_SENDER,
        (Shape::Conversational, Field::FromMe) => CONVERSATIONAL_FROM_ME,
        (Shape::Conversational, Field::EventEpoch) => CONVERSATIONAL_EPOCH,
        (Shape::Conversational, Field::MessageKind) => NONE,
        (Shape::Conversational, Field::Message) => CONVERSATIONAL_MESSAGE,
        (Shape::Conversational, Field::Broadcast) => CONVERSATIONAL_BROADCAST,
    }
}

fn first_element(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(&NULL),
        other => other,
    }
}

/// Walk `path` from `payload`, returning the value if present and non-null.
pub fn walk<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = payload;
    for key in path {
        current = first_element(current).get(*key)?;
    }
    let current = first_element(current);
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// First non-null candidate for `field`.
pub fn resolve(payload: &Value, shape: Shape, field: Field) -> Option<&Value> {
    candidates(shape, field)
        .iter()
        .find_map(|path| walk(payload, path))
}

/// Every non-null candidate for `field`, in candidate order.
pub fn resolve_all(payload: &Value, shape: Shape, field: Field) -> Vec<&Value> {
    candidates(shape, field)
        .iter()
        .filter_map(|path| walk(payload, path))
        .collect()
}

/// Render a scalar as a grouping key.
///
/// Objects and arrays (binary hashes stored as byte maps) are rendered as
/// compact JSON so distinct media still produce distinct keys.
pub fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => serde_json::to_string(other).ok(),
    }
}

pub fn resolve_string(payload: &Value, shape: Shape, field: Field) -> Option<String> {
    resolve(payload, shape, field).and_then(render)
}

pub fn resolve_bool(payload: &Value, shape: Shape, field: Field, default: bool) -> bool {
    match resolve(payload, shape, field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64().map_or(default, |n| n != 0),
        _ => default,
    }
}

/// Peer of the exchange: the recipient when outgoing, the sender otherwise.
pub fn resolve_peer(payload: &Value, shape: Shape, from_me: bool) -> Option<String> {
    let field = if from_me { Field::Recipient } else { Field::Sender };
    resolve_string(payload, shape, field)
}

/// Event time from the embedded epoch-seconds field, else `fallback`.
pub fn resolve_timestamp(payload: &Value, shape: Shape, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let seconds = match resolve(payload, shape, Field::EventEpoch) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    seconds
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or(fallback)
}

pub fn resolve_kinds(payload: &Value, shape: Shape) -> Vec<String> {
    resolve_all(payload, shape, Field::MessageKind)
        .into_iter()
        .filter_map(render)
        .collect()
}

pub fn is_group_key(conversation: Option<&str>) -> bool {
    conversation.is_some_and(|key| {
        key.chars()
            .any(|c| c.eq_ignore_ascii_case(&GROUP_MARKER))
    })
}
