//! Snapshot store: последнее материализованное состояние на экземпляр проекции.
//!
//! Семантика:
//! - тип не включил снапшоты -> load всегда Missing, save - no-op; к хранилищу не ходим;
//! - load: SELECT data, rev ... LIMIT 1 (rev DESC => самая свежая ревизия);
//! - save: upsert (id, rev, data), без compare-and-swap - последняя запись побеждает.

use anyhow::{Context, Result};
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

use crate::codec::Serializer;
use crate::consts::{render, INSERT_SNAPSHOT_TEMPLATE, SELECT_SNAPSHOT_TEMPLATE, SNAPSHOTS_SUFFIX};
use crate::id::ProjectionId;
use crate::metrics::{record_snapshot_load, record_snapshot_save, record_snapshot_skipped};
use crate::model::{Snapshot, SnapshotState};
use crate::registry::ProjectionRegistry;
use crate::schema::SchemaManager;
use crate::session::cache::StatementCache;
use crate::session::{Session, Statement, TableSchema, Value};
use crate::version::VersionResolver;

pub struct SnapshotStore {
    session: Arc<dyn Session>,
    serializer: Arc<dyn Serializer>,
    resolver: Arc<dyn VersionResolver>,
    schema: Arc<SchemaManager>,
    enabled: HashSet<String>,
    insert_statements: StatementCache,
    select_statements: StatementCache,
}

impl SnapshotStore {
    /// Создаёт store и гарантирует таблицы `_sp` для годных типов с включёнными снапшотами.
    pub fn new(
        registry: &ProjectionRegistry,
        session: Arc<dyn Session>,
        serializer: Arc<dyn Serializer>,
        resolver: Arc<dyn VersionResolver>,
        schema: Arc<SchemaManager>,
    ) -> Result<Self> {
        let store = Self {
            session,
            serializer,
            resolver,
            schema,
            enabled: registry.snapshot_contracts().map(str::to_string).collect(),
            insert_statements: StatementCache::new(),
            select_statements: StatementCache::new(),
        };
        for t in registry.snapshot_eligible() {
            let location = store
                .resolver
                .get_live_location(&t.contract_id, SNAPSHOTS_SUFFIX)
                .with_context(|| format!("resolve snapshot table of '{}'", t.contract_id))?;
            store.create(&location)?;
        }
        Ok(store)
    }

    #[inline]
    pub fn is_enabled(&self, projection_type: &str) -> bool {
        self.enabled.contains(projection_type)
    }

    pub fn load(&self, projection_type: &str, id: &ProjectionId) -> Result<Snapshot> {
        if !self.is_enabled(projection_type) {
            return Ok(Snapshot::missing(id.clone(), projection_type));
        }

        let location = self
            .resolver
            .get_live_location(projection_type, SNAPSHOTS_SUFFIX)?;
        self.ensure(&location)?;
        let statement = self.select_statements.get_or_prepare(&location, || {
            self.session.prepare(
                &render(SELECT_SNAPSHOT_TEMPLATE, &location),
                Statement::select(&location, &["data", "rev"], &["id"], Some(1)),
            )
        })?;

        let rows = self
            .session
            .execute(&statement, &[Value::Text(id.encode())])?;
        let row = match rows.first() {
            Some(r) => r,
            None => {
                record_snapshot_load(false);
                return Ok(Snapshot::missing(id.clone(), projection_type));
            }
        };

        let revision = row.get_int("rev")?;
        let state = self
            .serializer
            .deserialize_state(row.get_blob("data")?)
            .with_context(|| format!("{}: snapshot {} rev={}", location, id, revision))?;
        record_snapshot_load(true);
        debug!("snapshots: loaded {} rev={} from {}", id, revision, location);
        Ok(Snapshot::new(id.clone(), projection_type, state, revision))
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if !self.is_enabled(&snapshot.projection_type) {
            record_snapshot_skipped();
            return Ok(());
        }
        let (state, revision) = match &snapshot.content {
            SnapshotState::Found { state, revision } => (state, *revision),
            // Нечего сохранять: "нет снапшота" не материализуется.
            SnapshotState::Missing => {
                record_snapshot_skipped();
                return Ok(());
            }
        };

        let location = self
            .resolver
            .get_live_location(&snapshot.projection_type, SNAPSHOTS_SUFFIX)?;
        self.ensure(&location)?;
        let data = self.serializer.serialize_state(state)?;
        let statement = self.insert_statements.get_or_prepare(&location, || {
            self.session.prepare(
                &render(INSERT_SNAPSHOT_TEMPLATE, &location),
                Statement::insert(&location, &["id", "rev", "data"]),
            )
        })?;
        self.session.execute(
            &statement,
            &[
                Value::Text(snapshot.id.encode()),
                Value::Int(revision),
                Value::Blob(data),
            ],
        )?;

        record_snapshot_save();
        debug!("snapshots: saved {} rev={} to {}", snapshot.id, revision, location);
        Ok(())
    }

    pub fn create(&self, location: &str) -> Result<()> {
        self.schema.create(&TableSchema::snapshots(location))
    }

    /// Live могла смениться после старта (promote): таблицу создаём лениво.
    pub fn ensure(&self, location: &str) -> Result<()> {
        self.schema.ensure(&TableSchema::snapshots(location))
    }

    pub fn drop_table(&self, location: &str) -> Result<()> {
        self.schema.drop_table(location)?;
        self.insert_statements.invalidate(location);
        self.select_statements.invalidate(location);
        Ok(())
    }
}
