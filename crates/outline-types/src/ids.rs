//! Identifier newtypes shared across the outline engine crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a node's owning container (an episode's "outline" or
/// "inbox", or a show's single container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub Uuid);

impl ContainerId {
    /// Generate a fresh random container id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ContainerId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Identifier for a node. Stable for the node's entire life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Generate a fresh random node id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for NodeId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Identifier for the user issuing a command. The engine treats callers as
/// already authenticated (spec §1 Non-goals); this is an opaque label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Caller-supplied correlation token of the form `<uuid>:<originator>`
/// (spec §3, §9). The originator segment identifies the issuing session so
/// subscribers can suppress echoes of their own commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId {
    uuid: Uuid,
    originator: String,
}

/// Error returned when an `event_id` does not match the `<uuid>:<originator>`
/// convention.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventIdParseError {
    /// No `:` separator found, or the originator half was empty.
    #[error("event id {0:?} is not of the form <uuid>:<originator>")]
    MalformedToken(String),
    /// The uuid half did not parse.
    #[error("event id {0:?} has an invalid uuid component")]
    InvalidUuid(String),
}

impl EventId {
    /// Build an `EventId` from its components.
    pub fn new(uuid: Uuid, originator: impl Into<String>) -> Result<Self, EventIdParseError> {
        let originator = originator.into();
        if originator.is_empty() {
            return Err(EventIdParseError::MalformedToken(format!("{uuid}:{originator}")));
        }
        Ok(Self { uuid, originator })
    }

    /// The caller-supplied uuid half of the token.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The session/originator half of the token, used for echo suppression.
    pub fn originator(&self) -> &str {
        &self.originator
    }

    /// True if this event id was issued by `originator`.
    pub fn is_from(&self, originator: &str) -> bool {
        self.originator == originator
    }
}

impl FromStr for EventId {
    type Err = EventIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uuid_part, originator) = s
            .split_once(':')
            .ok_or_else(|| EventIdParseError::MalformedToken(s.to_string()))?;
        if originator.is_empty() {
            return Err(EventIdParseError::MalformedToken(s.to_string()));
        }
        let uuid = Uuid::parse_str(uuid_part)
            .map_err(|_| EventIdParseError::InvalidUuid(s.to_string()))?;
        Ok(Self { uuid, originator: originator.to_string() })
    }
}

impl TryFrom<String> for EventId {
    type Error = EventIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventId> for String {
    fn from(value: EventId) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uuid, self.originator)
    }
}

/// Monotonic per-container event counter, assigned at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(pub u64);

impl Sequence {
    /// The sequence value preceding the first committed event.
    pub const ZERO: Sequence = Sequence(0);

    /// The next sequence number after this one.
    pub fn next(self) -> Sequence {
        Sequence(self.0 + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_round_trips_through_string() {
        let uuid = Uuid::new_v4();
        let id = EventId::new(uuid, "session-42").unwrap();
        let rendered = id.to_string();
        let parsed: EventId = rendered.parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.uuid(), uuid);
        assert_eq!(parsed.originator(), "session-42");
    }

    #[test]
    fn event_id_rejects_missing_separator() {
        let err = "not-a-valid-token".parse::<EventId>().unwrap_err();
        assert!(matches!(err, EventIdParseError::MalformedToken(_)));
    }

    #[test]
    fn event_id_rejects_empty_originator() {
        let uuid = Uuid::new_v4();
        let err = format!("{uuid}:").parse::<EventId>().unwrap_err();
        assert!(matches!(err, EventIdParseError::MalformedToken(_)));
    }

    #[test]
    fn sequence_advances_monotonically() {
        let s = Sequence::ZERO;
        assert_eq!(s.next(), Sequence(1));
        assert_eq!(s.next().next(), Sequence(2));
    }
}
