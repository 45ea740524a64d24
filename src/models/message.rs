//! Message history records
//!
//! A `MessageRecord` is one message exchanged between the current user and a
//! named counterpart. Records are immutable once created; the library only
//! appends them or removes them in bulk.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of the other party in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    #[default]
    Creator,
    Mentor,
    Sponsor,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Mentor => "mentor",
            Self::Sponsor => "sponsor",
        }
    }

    /// Parse a role tag, ignoring case and surrounding whitespace.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "creator" => Some(Self::Creator),
            "mentor" => Some(Self::Mentor),
            "sponsor" => Some(Self::Sponsor),
            _ => None,
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantRole {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownTag {
            kind: "participant role",
            value: s.to_string(),
            expected: "creator, mentor, sponsor",
        })
    }
}

/// Whether the current user sent or received the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    #[default]
    Sent,
    Received,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "sent" => Some(Self::Sent),
            "received" => Some(Self::Received),
            _ => None,
        }
    }
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageDirection {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownTag {
            kind: "message direction",
            value: s.to_string(),
            expected: "sent, received",
        })
    }
}

/// Provenance tag used for grouping in dashboards.
///
/// The set is open: tags other than the two known ones are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageSource {
    CreatorNetwork,
    #[default]
    Library,
    Other(String),
}

impl MessageSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreatorNetwork => "creator-network",
            Self::Library => "library",
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Parse a source tag. Blank tags are not valid sources.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        match tag {
            "" => None,
            "creator-network" => Some(Self::CreatorNetwork),
            "library" => Some(Self::Library),
            other => Some(Self::Other(other.to_string())),
        }
    }
}

impl From<String> for MessageSource {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag).unwrap_or_default()
    }
}

impl From<MessageSource> for String {
    fn from(source: MessageSource) -> Self {
        source.as_str().to_string()
    }
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageSource {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| UnknownTag {
            kind: "message source",
            value: s.to_string(),
            expected: "a non-empty tag such as creator-network or library",
        })
    }
}

/// A tag string that does not name any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?} (expected {expected})")]
pub struct UnknownTag {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub participant_name: String,
    pub participant_role: ParticipantRole,
    pub content: String,
    pub direction: MessageDirection,
    /// ISO-8601 UTC timestamp, millisecond precision
    pub created_at: String,
    pub source: MessageSource,
}

impl MessageRecord {
    /// True if this record belongs to `name`, and to `role` when one is given.
    pub fn matches(&self, name: &str, role: Option<ParticipantRole>) -> bool {
        self.participant_name == name && role.map_or(true, |r| self.participant_role == r)
    }
}

/// Why a candidate value could not become a `MessageRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("message entry is not an object")]
    NotAnObject,
    #[error("participant name is missing or empty")]
    MissingParticipantName,
    #[error("message content is missing or empty")]
    MissingContent,
}

/// Input for appending a message. Optional fields fall back to defaults.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub participant_name: String,
    pub content: String,
    pub participant_role: Option<ParticipantRole>,
    pub direction: Option<MessageDirection>,
    pub source: Option<MessageSource>,
}

impl NewMessage {
    pub fn new(participant_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            participant_name: participant_name.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn role(mut self, role: ParticipantRole) -> Self {
        self.participant_role = Some(role);
        self
    }

    pub fn direction(mut self, direction: MessageDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn source(mut self, source: MessageSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Build a fresh record with a new id and the current time.
    pub fn into_record(self) -> Result<MessageRecord, Rejection> {
        if self.participant_name.trim().is_empty() {
            return Err(Rejection::MissingParticipantName);
        }
        if self.content.trim().is_empty() {
            return Err(Rejection::MissingContent);
        }

        let source = self
            .source
            .and_then(|s| MessageSource::from_tag(s.as_str()))
            .unwrap_or_default();

        Ok(MessageRecord {
            id: new_id(),
            participant_name: self.participant_name,
            participant_role: self.participant_role.unwrap_or_default(),
            content: self.content,
            direction: self.direction.unwrap_or_default(),
            created_at: now_timestamp(),
            source,
        })
    }
}

/// Validate a loosely-typed value (usually read back from storage).
///
/// Missing `id` and `createdAt` are generated; unrecognized role, direction
/// or source values fall back to their defaults. Extra fields are ignored.
pub fn validate(candidate: &Value) -> Result<MessageRecord, Rejection> {
    let obj = candidate.as_object().ok_or(Rejection::NotAnObject)?;

    let participant_name =
        text_field(obj, "participantName").ok_or(Rejection::MissingParticipantName)?;
    let content = text_field(obj, "content").ok_or(Rejection::MissingContent)?;

    let participant_role = tag_field(obj, "participantRole")
        .and_then(ParticipantRole::parse)
        .unwrap_or_default();
    let direction = tag_field(obj, "direction")
        .and_then(MessageDirection::parse)
        .unwrap_or_default();
    let source = tag_field(obj, "source")
        .and_then(MessageSource::from_tag)
        .unwrap_or_default();

    let id = text_field(obj, "id").unwrap_or_else(new_id);
    let created_at = tag_field(obj, "createdAt")
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
        .unwrap_or_else(now_timestamp);

    Ok(MessageRecord {
        id,
        participant_name,
        participant_role,
        content,
        direction,
        created_at,
        source,
    })
}

/// `validate` with the rejection collapsed to `None`.
pub fn normalize(candidate: &Value) -> Option<MessageRecord> {
    validate(candidate).ok()
}

/// Non-empty text, with numbers rendered as text.
///
/// Blank strings count as missing. Any number, `0` included, is kept as its
/// decimal text.
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn tag_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time in the same shape as JavaScript's `toISOString()`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
