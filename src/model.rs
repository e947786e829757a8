//! Модель данных: коммит проекции, происхождение события, снапшот.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::id::ProjectionId;
use crate::version::ProjectionVersion;

/// Откуда пришло событие, породившее коммит. Поля образуют clustering key
/// строки: (aggregate_root_id, aggregate_revision, aggregate_event_position, timestamp).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOrigin {
    pub aggregate_root_id: String,
    pub aggregate_revision: i32,
    pub aggregate_event_position: i32,
    /// epoch millis
    pub timestamp: i64,
}

impl EventOrigin {
    pub fn new<S: Into<String>>(
        aggregate_root_id: S,
        aggregate_revision: i32,
        aggregate_event_position: i32,
        timestamp: i64,
    ) -> Self {
        Self {
            aggregate_root_id: aggregate_root_id.into(),
            aggregate_revision,
            aggregate_event_position,
            timestamp,
        }
    }
}

/// Неизменяемая дельта проекции.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionCommit {
    pub projection_id: ProjectionId,
    pub snapshot_marker: i32,
    pub event_origin: EventOrigin,
    pub version: ProjectionVersion,
    #[serde(with = "crate::codec::b64")]
    pub data: Vec<u8>,
}

impl ProjectionCommit {
    pub fn new(
        projection_id: ProjectionId,
        snapshot_marker: i32,
        event_origin: EventOrigin,
        version: ProjectionVersion,
        data: Vec<u8>,
    ) -> Self {
        Self {
            projection_id,
            snapshot_marker,
            event_origin,
            version,
            data,
        }
    }
}

/// Содержимое снапшота: либо найденное состояние, либо "нет снапшота".
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotState {
    Found { state: Json, revision: i32 },
    /// Проигрывать с начала; ревизия по контракту 0.
    Missing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub id: ProjectionId,
    pub projection_type: String,
    pub content: SnapshotState,
}

impl Snapshot {
    pub fn new<S: Into<String>>(id: ProjectionId, projection_type: S, state: Json, revision: i32) -> Self {
        Self {
            id,
            projection_type: projection_type.into(),
            content: SnapshotState::Found { state, revision },
        }
    }

    pub fn missing<S: Into<String>>(id: ProjectionId, projection_type: S) -> Self {
        Self {
            id,
            projection_type: projection_type.into(),
            content: SnapshotState::Missing,
        }
    }

    /// Старший маркер, уже свёрнутый в состояние (Missing => 0).
    #[inline]
    pub fn revision(&self) -> i32 {
        match &self.content {
            SnapshotState::Found { revision, .. } => *revision,
            SnapshotState::Missing => 0,
        }
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self.content, SnapshotState::Missing)
    }

    pub fn state(&self) -> Option<&Json> {
        match &self.content {
            SnapshotState::Found { state, .. } => Some(state),
            SnapshotState::Missing => None,
        }
    }
}
