//! ProjectionStore - фасад, который видит окружающий фреймворк:
//! load/save коммитов, load/save снапшотов, версии.
//!
//! Маршрутизация:
//! - чтение без replay -> Live-версия контракта;
//! - чтение с replay   -> самая свежая Building-версия (нет такой => NoBuildingVersion);
//! - запись всегда идёт в `commit.version`.
//! При старте создаются только таблицы Live-версий; остальные - лениво, при первом обращении.

use anyhow::{Context, Result};
use log::{debug, info};
use std::sync::Arc;

use crate::codec::Serializer;
use crate::commits::CommitStore;
use crate::config::ProjConfig;
use crate::consts::{COMMITS_SUFFIX, SNAPSHOTS_SUFFIX};
use crate::error::StoreError;
use crate::id::ProjectionId;
use crate::model::{ProjectionCommit, Snapshot};
use crate::registry::ProjectionRegistry;
use crate::schema::SchemaManager;
use crate::session::Session;
use crate::snapshots::SnapshotStore;
use crate::stream::ProjectionStream;
use crate::version::{ProjectionVersions, VersionResolver};

pub struct ProjectionStore {
    resolver: Arc<dyn VersionResolver>,
    commits: CommitStore,
    snapshots: SnapshotStore,
    config: ProjConfig,
}

impl ProjectionStore {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub fn config(&self) -> &ProjConfig {
        &self.config
    }

    /// Снапшот + коммиты с маркера `snapshot.revision() + 1`.
    pub fn load(
        &self,
        contract_id: &str,
        projection_id: &ProjectionId,
        snapshot: &Snapshot,
        is_replay: bool,
    ) -> Result<ProjectionStream> {
        let location = self.read_location(contract_id, is_replay)?;
        let commits = match snapshot.revision().checked_add(1) {
            Some(start) => self.commits.scan_from(&location, projection_id, start)?,
            None => Vec::new(),
        };
        debug!(
            "store: load {} {} from {} -> {} commits",
            contract_id,
            projection_id,
            location,
            commits.len()
        );
        Ok(ProjectionStream::assemble(projection_id.clone(), snapshot.clone(), commits))
    }

    /// Запись всегда в `commit.version`. Таблица Building-версии или Live после
    /// promote создаётся при первой записи.
    pub fn save(&self, commit: &ProjectionCommit, is_replay: bool) -> Result<()> {
        self.commits.ensure(&commit.version.location(COMMITS_SUFFIX))?;
        if is_replay {
            debug!("store: replay save {} into v{}", commit.projection_id, commit.version.version_number);
        }
        self.commits.append(commit)
    }

    pub fn load_snapshot(&self, projection_type: &str, id: &ProjectionId) -> Result<Snapshot> {
        self.snapshots.load(projection_type, id)
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.snapshots.save(snapshot)
    }

    pub fn get_versions(&self, contract_id: &str) -> Result<ProjectionVersions> {
        self.resolver.get_versions(contract_id)
    }

    /// Последний снапшот и всё, что после него. Replay снапшоты не читает:
    /// у Building-поколения их ещё нет, проигрываем с начала.
    pub fn load_latest(
        &self,
        contract_id: &str,
        projection_id: &ProjectionId,
        is_replay: bool,
    ) -> Result<ProjectionStream> {
        let snapshot = if is_replay {
            Snapshot::missing(projection_id.clone(), contract_id)
        } else {
            self.load_snapshot(contract_id, projection_id)?
        };
        self.load(contract_id, projection_id, &snapshot, is_replay)
    }

    /// Удалить таблицы коммитов и снапшотов не-Live версии.
    pub fn drop_version(&self, contract_id: &str, version_number: i32) -> Result<()> {
        let versions = self.resolver.get_versions(contract_id)?;
        let version = versions
            .get(version_number)
            .ok_or_else(|| StoreError::UnknownVersion {
                contract: contract_id.to_string(),
                version: version_number,
            })?;
        if version.is_live() {
            return Err(StoreError::LiveVersionDrop {
                contract: contract_id.to_string(),
                version: version_number,
            }
            .into());
        }

        self.commits.drop_table(&version.location(COMMITS_SUFFIX))?;
        self.snapshots.drop_table(&version.location(SNAPSHOTS_SUFFIX))?;
        info!(
            "store: dropped {} v{} ({})",
            contract_id, version_number, version.status
        );
        Ok(())
    }

    fn read_location(&self, contract_id: &str, is_replay: bool) -> Result<String> {
        let location = if is_replay {
            let versions = self.resolver.get_versions(contract_id)?;
            let building = versions
                .building()
                .ok_or_else(|| StoreError::NoBuildingVersion {
                    contract: contract_id.to_string(),
                })?;
            building.location(COMMITS_SUFFIX)
        } else {
            self.commits.live_location(contract_id)?
        };
        // Building-таблица (или новая Live после promote) могла ещё не создаваться
        self.commits.ensure(&location)?;
        Ok(location)
    }
}

/// Сборка ProjectionStore. Все коллабораторы обязательны, кроме config.
#[derive(Default)]
pub struct StoreBuilder {
    session: Option<Arc<dyn Session>>,
    serializer: Option<Arc<dyn Serializer>>,
    resolver: Option<Arc<dyn VersionResolver>>,
    registry: Option<ProjectionRegistry>,
    config: ProjConfig,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn VersionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn registry(mut self, registry: ProjectionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: ProjConfig) -> Self {
        self.config = config;
        self
    }

    /// Fail fast: проверка коллабораторов, затем CREATE таблиц для годных типов.
    pub fn build(self) -> Result<ProjectionStore> {
        let session = self.session.ok_or(StoreError::MissingCollaborator("session"))?;
        let serializer = self
            .serializer
            .ok_or(StoreError::MissingCollaborator("serializer"))?;
        let resolver = self
            .resolver
            .ok_or(StoreError::MissingCollaborator("version resolver"))?;
        let registry = self
            .registry
            .ok_or(StoreError::MissingCollaborator("projection registry"))?;
        if registry.is_empty() {
            return Err(StoreError::NoProjectionTypes.into());
        }

        let schema = Arc::new(SchemaManager::new(session.clone()));
        let commits = CommitStore::new(
            &registry,
            session.clone(),
            serializer.clone(),
            resolver.clone(),
            schema.clone(),
            self.config.scan_warn_commits,
        )
        .context("initialize commit tables")?;
        let snapshots = SnapshotStore::new(&registry, session, serializer, resolver.clone(), schema)
            .context("initialize snapshot tables")?;

        info!(
            "store: ready ({} projection types, {} eligible)",
            registry.len(),
            registry.eligible().count()
        );
        Ok(ProjectionStore {
            resolver,
            commits,
            snapshots,
            config: self.config,
        })
    }
}
