//! Идентификаторы экземпляров проекций.
//!
//! Вид идентификатора фиксируется один раз на границе (`from_tagged`), дальше
//! ядро работает с закрытым enum и не инспектирует тип на каждом вызове.
//!
//! Кодирование в ключ хранилища:
//! - Blob  -> base64 (standard, с паддингом) от сырых байт;
//! - Guid  -> каноническая строка (lowercase, с дефисами);
//! - Text  -> строка как есть.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::codec::{b64_decode, b64_encode};
use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ProjectionId {
    Blob(#[serde(with = "crate::codec::b64")] Vec<u8>),
    Guid(Uuid),
    Text(String),
}

impl ProjectionId {
    pub fn blob<B: Into<Vec<u8>>>(raw: B) -> Self {
        ProjectionId::Blob(raw.into())
    }

    pub fn text<S: Into<String>>(s: S) -> Self {
        ProjectionId::Text(s.into())
    }

    /// Разобрать идентификатор из пары (вид, значение) - граница API/CLI.
    /// Blob ожидает base64, Guid - любую форму, которую принимает uuid.
    pub fn from_tagged(kind: &str, value: &str) -> Result<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "blob" | "bytes" => {
                let raw = b64_decode(value).context("blob projection id")?;
                Ok(ProjectionId::Blob(raw))
            }
            "guid" | "uuid" => {
                let g = Uuid::parse_str(value.trim())
                    .with_context(|| format!("guid projection id '{}'", value))?;
                Ok(ProjectionId::Guid(g))
            }
            "string" | "text" => Ok(ProjectionId::Text(value.to_string())),
            other => Err(StoreError::UnsupportedId {
                kind: other.to_string(),
            }
            .into()),
        }
    }

    /// Строковый ключ партиции (колонка `id`).
    pub fn encode(&self) -> String {
        match self {
            ProjectionId::Blob(raw) => b64_encode(raw),
            ProjectionId::Guid(g) => g.hyphenated().to_string(),
            ProjectionId::Text(s) => s.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProjectionId::Blob(_) => "blob",
            ProjectionId::Guid(_) => "guid",
            ProjectionId::Text(_) => "string",
        }
    }

    /// Сырые байты для Blob, иначе None.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            ProjectionId::Blob(raw) => Some(raw),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.encode())
    }
}

impl From<Uuid> for ProjectionId {
    fn from(g: Uuid) -> Self {
        ProjectionId::Guid(g)
    }
}
