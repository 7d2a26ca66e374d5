//! Entity identity and cached entity representation.

use crate::error::SyncError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Reserved prefix marking client-assigned temporary ids, e.g. `local:3e9a...`.
pub const LOCAL_PREFIX: &str = "local:";

/// Entity-type-specific payload: a mapping of field name to JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Identifier of an entity.
///
/// Whether an entity has been confirmed by the remote store is a type-level
/// fact, not a property of id formatting:
///
/// - [`EntityId::Remote`] holds the authoritative id assigned by the remote
///   store.
/// - [`EntityId::Local`] holds a client-minted temporary id for an entity
///   whose `Create` is still queued.
///
/// The string form of a local id carries the reserved `local:` prefix, so
/// ids round-trip through payloads and the cache without losing the tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityId {
    /// Remote-assigned authoritative identifier.
    Remote(String),
    /// Client-assigned temporary identifier, pending confirmation.
    Local(Uuid),
}

impl EntityId {
    /// Mints a fresh local temporary id.
    #[must_use]
    pub fn local() -> Self {
        Self::Local(Uuid::new_v4())
    }

    /// Creates a remote id.
    pub fn remote(id: impl Into<String>) -> Self {
        Self::Remote(id.into())
    }

    /// Returns true if this id is a local temporary id.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Local(uuid) => write!(f, "{LOCAL_PREFIX}{uuid}"),
        }
    }
}

impl FromStr for EntityId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(LOCAL_PREFIX) {
            Some(rest) => {
                let uuid = Uuid::parse_str(rest).map_err(|_| SyncError::InvalidId {
                    value: s.to_string(),
                })?;
                Ok(Self::Local(uuid))
            }
            None if s.is_empty() => Err(SyncError::InvalidId {
                value: s.to_string(),
            }),
            None => Ok(Self::Remote(s.to_string())),
        }
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A domain record as held by the local durable cache.
///
/// `synced == false` marks a record the remote store has not confirmed:
/// either an offline create (the id is then [`EntityId::Local`]) or an
/// offline update of an already-remote entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier.
    pub id: EntityId,
    /// Entity-type-specific fields.
    pub fields: Document,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Last modification time, milliseconds since the Unix epoch.
    pub updated_at: i64,
    /// Whether the remote store has confirmed this exact state.
    pub synced: bool,
}

impl Entity {
    /// Creates a new unsynced entity with a fresh local id.
    #[must_use]
    pub fn new_local(fields: Document) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::local(),
            fields,
            created_at: now,
            updated_at: now,
            synced: false,
        }
    }

    /// Applies a shallow patch: top-level fields in `patch` replace the
    /// entity's fields of the same name.
    pub fn merge_patch(&mut self, patch: &Document) {
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
        self.updated_at = now_millis();
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
