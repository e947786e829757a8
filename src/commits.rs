//! commits - журнал коммитов проекций: append и инкрементальный скан по бакетам.
//!
//! Ключ партиции (id, sm): маркер `sm` ротирует по мере роста истории, так что
//! партиции остаются ограниченными, а не одна бесконечная на экземпляр.
//!
//! Скан:
//! - начинаем с start_marker, читаем партицию (id, sm);
//! - непустая -> десериализуем строки, sm += 1, повторяем;
//! - пустая -> стоп.
//! Пустой бакет завершает скан: коммиты в бакетах за "дыркой" не возвращаются.
//! Это контракт завершения скана, а не оптимизация.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::sync::Arc;

use crate::codec::Serializer;
use crate::consts::{render, COMMITS_SUFFIX, INSERT_COMMIT_TEMPLATE, SELECT_COMMITS_TEMPLATE};
use crate::id::ProjectionId;
use crate::metrics::{record_commit_appended, record_scan, record_scan_capacity_warning};
use crate::model::ProjectionCommit;
use crate::registry::ProjectionRegistry;
use crate::schema::SchemaManager;
use crate::session::cache::StatementCache;
use crate::session::{Session, Statement, TableSchema, Value};
use crate::version::VersionResolver;

const INSERT_COLUMNS: [&str; 7] = ["id", "sm", "evarid", "evarrev", "evarpos", "evarts", "data"];

pub struct CommitStore {
    session: Arc<dyn Session>,
    serializer: Arc<dyn Serializer>,
    resolver: Arc<dyn VersionResolver>,
    schema: Arc<SchemaManager>,
    insert_statements: StatementCache,
    select_statements: StatementCache,
    scan_warn_commits: usize,
}

impl CommitStore {
    /// Создаёт store и до приёма трафика гарантирует таблицы коммитов
    /// для Live-версий всех годных типов проекций.
    pub fn new(
        registry: &ProjectionRegistry,
        session: Arc<dyn Session>,
        serializer: Arc<dyn Serializer>,
        resolver: Arc<dyn VersionResolver>,
        schema: Arc<SchemaManager>,
        scan_warn_commits: usize,
    ) -> Result<Self> {
        let store = Self {
            session,
            serializer,
            resolver,
            schema,
            insert_statements: StatementCache::new(),
            select_statements: StatementCache::new(),
            scan_warn_commits,
        };
        store.initialize(registry)?;
        Ok(store)
    }

    fn initialize(&self, registry: &ProjectionRegistry) -> Result<()> {
        for t in registry.eligible() {
            let location = self
                .resolver
                .get_live_location(&t.contract_id, COMMITS_SUFFIX)
                .with_context(|| format!("resolve commit table of '{}'", t.contract_id))?;
            self.create(&location)?;
        }
        Ok(())
    }

    /// Live-location таблицы коммитов контракта.
    pub fn live_location(&self, contract_id: &str) -> Result<String> {
        self.resolver.get_live_location(contract_id, COMMITS_SUFFIX)
    }

    /// Записать коммит в таблицу его версии (`name_versionNumber`). Без чтения перед записью.
    pub fn append(&self, commit: &ProjectionCommit) -> Result<()> {
        let location = commit.version.location(COMMITS_SUFFIX);
        self.append_to(&location, commit)
    }

    pub fn append_to(&self, location: &str, commit: &ProjectionCommit) -> Result<()> {
        let data = self.serializer.serialize_commit(commit)?;
        let statement = self.insert_statements.get_or_prepare(location, || {
            self.session.prepare(
                &render(INSERT_COMMIT_TEMPLATE, location),
                Statement::insert(location, &INSERT_COLUMNS),
            )
        })?;

        let origin = &commit.event_origin;
        self.session.execute(
            &statement,
            &[
                Value::Text(commit.projection_id.encode()),
                Value::Int(commit.snapshot_marker),
                Value::Text(origin.aggregate_root_id.clone()),
                Value::Int(origin.aggregate_revision),
                Value::Int(origin.aggregate_event_position),
                Value::BigInt(origin.timestamp),
                Value::Blob(data),
            ],
        )?;

        record_commit_appended();
        debug!(
            "commits: appended {} sm={} to {}",
            commit.projection_id, commit.snapshot_marker, location
        );
        Ok(())
    }

    /// Инкрементальный скан бакетов начиная с `start_marker` до первого пустого.
    pub fn scan_from(
        &self,
        location: &str,
        projection_id: &ProjectionId,
        start_marker: i32,
    ) -> Result<Vec<ProjectionCommit>> {
        let statement = self.select_statements.get_or_prepare(location, || {
            self.session.prepare(
                &render(SELECT_COMMITS_TEMPLATE, location),
                Statement::select(location, &["data"], &["id", "sm"], None),
            )
        })?;

        let id = projection_id.encode();
        let mut commits: Vec<ProjectionCommit> = Vec::new();
        let mut marker = start_marker;
        let mut buckets = 0u64;

        loop {
            let rows = self
                .session
                .execute(&statement, &[Value::Text(id.clone()), Value::Int(marker)])?;
            buckets += 1;
            if rows.is_empty() {
                break;
            }
            for row in &rows {
                let data = row.get_blob("data")?;
                let commit = self
                    .serializer
                    .deserialize_commit(data)
                    .with_context(|| format!("{}: commit {} sm={}", location, projection_id, marker))?;
                commits.push(commit);
            }
            marker = match marker.checked_add(1) {
                Some(m) => m,
                None => break,
            };
        }

        record_scan(buckets, commits.len() as u64);
        if commits.len() > self.scan_warn_commits {
            record_scan_capacity_warning();
            warn!(
                "projection {} in `{}` loads a lot of commits ({}) starting at sm={}. \
                 This puts CPU and RAM pressure on every read; enable snapshots for this projection.",
                projection_id,
                location,
                commits.len(),
                start_marker
            );
        }
        Ok(commits)
    }

    /// Идемпотентный CREATE таблицы коммитов.
    pub fn create(&self, location: &str) -> Result<()> {
        self.schema.create(&TableSchema::commits(location))
    }

    /// CREATE только если этот экземпляр ещё не создавал таблицу.
    pub fn ensure(&self, location: &str) -> Result<()> {
        self.schema.ensure(&TableSchema::commits(location))
    }

    /// Идемпотентный DROP; подготовленные DML для location сбрасываются.
    pub fn drop_table(&self, location: &str) -> Result<()> {
        self.schema.drop_table(location)?;
        self.insert_statements.invalidate(location);
        self.select_statements.invalidate(location);
        Ok(())
    }
}
