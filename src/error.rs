//! Типизированные ошибки, которые вызывающая сторона должна уметь различать.
//!
//! Всё остальное API возвращает `anyhow::Result`; эти варианты едут внутри
//! `anyhow::Error` и достаются через `err.downcast_ref::<StoreError>()`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Не передан обязательный коллаборатор (session, serializer, ...).
    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("no projection types are registered")]
    NoProjectionTypes,

    /// Нарушен инвариант "ровно одна Live-версия".
    #[error("contract '{contract}' must have exactly one live version, found {found}")]
    LiveVersion { contract: String, found: usize },

    #[error("contract '{contract}' has no building version to replay into")]
    NoBuildingVersion { contract: String },

    #[error("contract '{contract}' has no version {version}")]
    UnknownVersion { contract: String, version: i32 },

    #[error("refusing to drop live version {version} of contract '{contract}'")]
    LiveVersionDrop { contract: String, version: i32 },

    #[error("unsupported projection id kind '{kind}'")]
    UnsupportedId { kind: String },

    #[error("table '{table}' does not exist")]
    UnknownTable { table: String },

    #[error("corrupted frame in {path} at offset {offset}: {reason}")]
    Corrupted {
        path: String,
        offset: u64,
        reason: String,
    },
}
