//! version - версии проекций и разрешение "живого" физического расположения.
//!
//! Подмодули:
//! - mod.rs      - ProjectionStatus / ProjectionVersion / ProjectionVersions, правила именования.
//! - registry.rs - VersionRegistry: in-memory (+ опционально JSON на диске) реализация резолвера.
//!
//! Именование location:
//!   lower(contract без '-' и прочих недопустимых символов) + suffix + "_" + version_number
//! Например: "Orders-Summary" (v3), suffix "_sp" -> "orderssummary_sp_3".

mod registry;

pub use registry::VersionRegistry;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionStatus {
    Building,
    Live,
    Retired,
    Canceled,
}

impl fmt::Display for ProjectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectionStatus::Building => "building",
            ProjectionStatus::Live => "live",
            ProjectionStatus::Retired => "retired",
            ProjectionStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectionVersion {
    pub projection_name: String,
    pub version_number: i32,
    pub status: ProjectionStatus,
}

impl ProjectionVersion {
    pub fn new<S: Into<String>>(projection_name: S, version_number: i32, status: ProjectionStatus) -> Self {
        Self {
            projection_name: projection_name.into(),
            version_number,
            status,
        }
    }

    pub fn live<S: Into<String>>(projection_name: S, version_number: i32) -> Self {
        Self::new(projection_name, version_number, ProjectionStatus::Live)
    }

    /// Физическое имя таблицы этой версии в неймспейсе `suffix`.
    pub fn location(&self, suffix: &str) -> String {
        format!("{}_{}", column_family(&self.projection_name, suffix), self.version_number)
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.status == ProjectionStatus::Live
    }
}

/// Логическое имя семейства колонок: lower-case, без '-', только [a-z0-9_].
pub fn column_family(contract_id: &str, suffix: &str) -> String {
    let mut out = String::with_capacity(contract_id.len() + suffix.len());
    for ch in contract_id.chars().chain(suffix.chars()) {
        let c = ch.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            out.push(c);
        }
    }
    out
}

/// Упорядоченный (по номеру) набор версий одного контракта.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectionVersions {
    items: Vec<ProjectionVersion>,
}

impl ProjectionVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить версию; одинаковый номер заменяет прежнюю запись.
    pub fn insert(&mut self, v: ProjectionVersion) {
        match self
            .items
            .binary_search_by_key(&v.version_number, |x| x.version_number)
        {
            Ok(pos) => self.items[pos] = v,
            Err(pos) => self.items.insert(pos, v),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectionVersion> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, version_number: i32) -> Option<&ProjectionVersion> {
        self.items
            .binary_search_by_key(&version_number, |x| x.version_number)
            .ok()
            .map(|pos| &self.items[pos])
    }

    /// Наибольший номер версии (0, если версий нет).
    pub fn max_number(&self) -> i32 {
        self.items.last().map(|v| v.version_number).unwrap_or(0)
    }

    /// Единственная Live-версия. 0 или >1 совпадений - фатальная ошибка.
    pub fn live(&self, contract_id: &str) -> Result<&ProjectionVersion> {
        let mut found = self.items.iter().filter(|v| v.is_live());
        match (found.next(), found.next()) {
            (Some(v), None) => Ok(v),
            _ => Err(StoreError::LiveVersion {
                contract: contract_id.to_string(),
                found: self.items.iter().filter(|v| v.is_live()).count(),
            }
            .into()),
        }
    }

    /// Самая свежая версия в статусе Building (цель replay).
    pub fn building(&self) -> Option<&ProjectionVersion> {
        self.items
            .iter()
            .rev()
            .find(|v| v.status == ProjectionStatus::Building)
    }

    pub fn live_location(&self, contract_id: &str, suffix: &str) -> Result<String> {
        Ok(self.live(contract_id)?.location(suffix))
    }
}

impl FromIterator<ProjectionVersion> for ProjectionVersions {
    fn from_iter<I: IntoIterator<Item = ProjectionVersion>>(iter: I) -> Self {
        let mut out = ProjectionVersions::new();
        for v in iter {
            out.insert(v);
        }
        out
    }
}

/// Контракт резолвера версий: единственный источник истины contract -> location.
pub trait VersionResolver: Send + Sync {
    fn get_versions(&self, contract_id: &str) -> Result<ProjectionVersions>;

    fn get_live_location(&self, contract_id: &str, suffix: &str) -> Result<String> {
        self.get_versions(contract_id)?.live_location(contract_id, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_family_strips_and_lowercases() {
        assert_eq!(column_family("Orders-Summary", ""), "orderssummary");
        assert_eq!(column_family("Orders-Summary", "_sp"), "orderssummary_sp");
        assert_eq!(column_family("a.b/c d\"e", ""), "abcde");
    }

    #[test]
    fn location_appends_version_number() {
        let v = ProjectionVersion::live("Orders-Summary", 3);
        assert_eq!(v.location(""), "orderssummary_3");
        assert_eq!(v.location("_sp"), "orderssummary_sp_3");
    }

    #[test]
    fn versions_stay_ordered_and_replace_by_number() {
        let mut vs = ProjectionVersions::new();
        vs.insert(ProjectionVersion::new("c", 2, ProjectionStatus::Building));
        vs.insert(ProjectionVersion::live("c", 1));
        vs.insert(ProjectionVersion::new("c", 2, ProjectionStatus::Canceled));
        let nums: Vec<i32> = vs.iter().map(|v| v.version_number).collect();
        assert_eq!(nums, vec![1, 2]);
        assert_eq!(vs.get(2).map(|v| v.status), Some(ProjectionStatus::Canceled));
        assert_eq!(vs.max_number(), 2);
        assert!(vs.building().is_none());
    }
}
