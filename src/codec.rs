//! codec - контракт сериализатора (коллаборатор) и JSON-реализация по умолчанию.
//!
//! Ядро не знает формата полезной нагрузки: в колонку `data` пишется то, что
//! вернул Serializer (весь ProjectionCommit целиком для таблицы коммитов,
//! состояние снапшота для таблицы снапшотов).

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use serde_json::Value as Json;

use crate::model::ProjectionCommit;

pub trait Serializer: Send + Sync {
    fn serialize_commit(&self, commit: &ProjectionCommit) -> Result<Vec<u8>>;
    fn deserialize_commit(&self, bytes: &[u8]) -> Result<ProjectionCommit>;

    fn serialize_state(&self, state: &Json) -> Result<Vec<u8>>;
    fn deserialize_state(&self, bytes: &[u8]) -> Result<Json>;
}

/// serde_json поверх serde-моделей коммита.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize_commit(&self, commit: &ProjectionCommit) -> Result<Vec<u8>> {
        serde_json::to_vec(commit).context("serialize projection commit")
    }

    fn deserialize_commit(&self, bytes: &[u8]) -> Result<ProjectionCommit> {
        serde_json::from_slice(bytes).context("deserialize projection commit")
    }

    fn serialize_state(&self, state: &Json) -> Result<Vec<u8>> {
        serde_json::to_vec(state).context("serialize snapshot state")
    }

    fn deserialize_state(&self, bytes: &[u8]) -> Result<Json> {
        serde_json::from_slice(bytes).context("deserialize snapshot state")
    }
}

pub(crate) fn b64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub(crate) fn b64_decode(s: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(s.trim())
        .map_err(|e| anyhow!("base64 decode: {}", e))
}

/// serde-адаптер: `Vec<u8>` <-> base64-строка (`#[serde(with = "crate::codec::b64")]`).
pub mod b64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::b64_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        super::b64_decode(&s).map_err(de::Error::custom)
    }
}
