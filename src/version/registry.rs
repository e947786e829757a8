//! Реестр версий проекций (реализация VersionResolver).
//!
//! Формат (опционально на диске): <root>/versions.json
//! {
//!   "contracts": {
//!     "<contract_id>": [
//!       {"projection_name":"<contract_id>","version_number":1,"status":"live"},
//!       ...
//!     ]
//!   }
//! }
//!
//! Замечания:
//! - Все мутации сохраняют инвариант "не больше одной Live-версии на контракт".
//! - Запись выполняется атомарно через tmp+rename.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::{ProjectionStatus, ProjectionVersion, ProjectionVersions, VersionResolver};
use crate::error::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    contracts: BTreeMap<String, Vec<ProjectionVersion>>,
}

pub struct VersionRegistry {
    path: Option<PathBuf>,
    inner: RwLock<BTreeMap<String, ProjectionVersions>>,
}

impl VersionRegistry {
    /// Реестр только в памяти.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Открыть (или создать пустой) реестр в файле `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let mut map = BTreeMap::new();
        if path.exists() {
            let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
            let file: RegistryFile = serde_json::from_slice(&bytes)
                .with_context(|| format!("parse {}", path.display()))?;
            for (contract, list) in file.contracts {
                map.insert(contract, list.into_iter().collect::<ProjectionVersions>());
            }
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            inner: RwLock::new(map),
        })
    }

    /// Добавить/заменить версию как есть (без проверок статусов).
    /// Нужен для импорта и тестов; обычные переходы - start_building/promote/cancel.
    pub fn register(&self, contract_id: &str, version: ProjectionVersion) -> Result<()> {
        self.mutate(|map| {
            map.entry(contract_id.to_string())
                .or_default()
                .insert(version);
            Ok(())
        })
    }

    /// Если у контракта нет версий - завести v1 в статусе Live. Возвращает Live-версию.
    pub fn ensure_live(&self, contract_id: &str) -> Result<ProjectionVersion> {
        self.mutate(|map| {
            let versions = map.entry(contract_id.to_string()).or_default();
            if versions.is_empty() {
                info!("versions: bootstrap {} v1 as live", contract_id);
                versions.insert(ProjectionVersion::live(contract_id, 1));
            }
            versions.live(contract_id).cloned()
        })
    }

    /// Новое поколение для пересборки: max+1 в статусе Building.
    pub fn start_building(&self, contract_id: &str) -> Result<ProjectionVersion> {
        self.mutate(|map| {
            let versions = map.entry(contract_id.to_string()).or_default();
            let v = ProjectionVersion::new(
                contract_id,
                versions.max_number() + 1,
                ProjectionStatus::Building,
            );
            info!("versions: {} v{} building", contract_id, v.version_number);
            versions.insert(v.clone());
            Ok(v)
        })
    }

    /// Сделать версию Live; прежняя Live уходит в Retired.
    pub fn promote(&self, contract_id: &str, version_number: i32) -> Result<ProjectionVersion> {
        self.mutate(|map| {
            let versions = map.entry(contract_id.to_string()).or_default();
            let target = versions
                .get(version_number)
                .cloned()
                .ok_or_else(|| StoreError::UnknownVersion {
                    contract: contract_id.to_string(),
                    version: version_number,
                })?;

            let retired: Vec<ProjectionVersion> = versions
                .iter()
                .filter(|v| v.is_live() && v.version_number != version_number)
                .map(|v| ProjectionVersion {
                    status: ProjectionStatus::Retired,
                    ..v.clone()
                })
                .collect();
            for v in retired {
                info!("versions: {} v{} retired", contract_id, v.version_number);
                versions.insert(v);
            }

            let live = ProjectionVersion {
                status: ProjectionStatus::Live,
                ..target
            };
            info!("versions: {} v{} live", contract_id, live.version_number);
            versions.insert(live.clone());
            Ok(live)
        })
    }

    /// Отменить пересборку (только Building -> Canceled).
    pub fn cancel(&self, contract_id: &str, version_number: i32) -> Result<()> {
        self.mutate(|map| {
            let versions = map.entry(contract_id.to_string()).or_default();
            match versions.get(version_number).cloned() {
                Some(v) if v.status == ProjectionStatus::Building => {
                    versions.insert(ProjectionVersion {
                        status: ProjectionStatus::Canceled,
                        ..v
                    });
                    Ok(())
                }
                Some(_) => Ok(()),
                None => Err(StoreError::UnknownVersion {
                    contract: contract_id.to_string(),
                    version: version_number,
                }
                .into()),
            }
        })
    }

    pub fn contracts(&self) -> Vec<String> {
        match self.inner.read() {
            Ok(g) => g.keys().cloned().collect(),
            Err(p) => p.into_inner().keys().cloned().collect(),
        }
    }

    fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<String, ProjectionVersions>) -> Result<T>,
    {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| anyhow::anyhow!("version registry lock poisoned"))?;
        let out = f(&mut guard)?;
        if let Some(path) = &self.path {
            save_file(path, &guard)?;
        }
        Ok(out)
    }
}

impl VersionResolver for VersionRegistry {
    fn get_versions(&self, contract_id: &str) -> Result<ProjectionVersions> {
        let guard = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("version registry lock poisoned"))?;
        Ok(guard.get(contract_id).cloned().unwrap_or_default())
    }
}

fn save_file(path: &Path, map: &BTreeMap<String, ProjectionVersions>) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
    }
    let file = RegistryFile {
        contracts: map
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
            .collect(),
    };
    let tmp = path.with_extension("json.tmp");

    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp)
        .with_context(|| format!("open {}", tmp.display()))?;

    let data = serde_json::to_vec_pretty(&file).context("serialize versions.json")?;
    f.write_all(&data)?;
    let _ = f.sync_all();

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
