//! Schema manager - идемпотентный DDL для таблиц коммитов и снапшотов.
//!
//! Все CREATE в процессе идут под одним мьютексом, все DROP - под другим:
//! кластерное хранилище не переносит параллельных изменений схемы (гонки
//! schema agreement, в т.ч. на разных column family). Мьютексы принадлежат
//! экземпляру; CommitStore и SnapshotStore делят один Arc<SchemaManager>,
//! поэтому в рамках одного ProjectionStore исключение общее.
//!
//! `ensure` пропускает DDL для таблиц, которые этот экземпляр уже создавал:
//! ленивое создание на горячем пути (replay, новая Live после promote).

use anyhow::{anyhow, Context, Result};
use log::info;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use crate::consts::{render, DROP_TABLE_TEMPLATE};
use crate::metrics::{record_ddl_create, record_ddl_drop};
use crate::session::cache::StatementCache;
use crate::session::{Session, Statement, TableSchema};

pub struct SchemaManager {
    session: Arc<dyn Session>,
    create_mutex: Mutex<()>,
    drop_mutex: Mutex<()>,
    create_statements: StatementCache,
    drop_statements: StatementCache,
    // locations, для которых CREATE уже выполнен этим экземпляром
    known: RwLock<HashSet<String>>,
}

impl SchemaManager {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self {
            session,
            create_mutex: Mutex::new(()),
            drop_mutex: Mutex::new(()),
            create_statements: StatementCache::new(),
            drop_statements: StatementCache::new(),
            known: RwLock::new(HashSet::new()),
        }
    }

    /// CREATE TABLE IF NOT EXISTS по схеме; повторный вызов безвреден.
    pub fn create(&self, schema: &TableSchema) -> Result<()> {
        let _g = self
            .create_mutex
            .lock()
            .map_err(|_| anyhow!("schema create mutex poisoned"))?;

        let location = schema.name.clone();
        // Отметка до DDL: параллельный DROP (другой мьютекс) снимет её после себя,
        // и следующий ensure повторит CREATE, а не пропустит его.
        self.known
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(location.clone());

        if let Err(e) = self.execute_create(schema) {
            self.known
                .write()
                .unwrap_or_else(|p| p.into_inner())
                .remove(&location);
            return Err(e);
        }

        record_ddl_create();
        info!("schema: ensured table {}", location);
        Ok(())
    }

    fn execute_create(&self, schema: &TableSchema) -> Result<()> {
        let statement = self.create_statements.get_or_prepare(&schema.name, || {
            self.session
                .prepare(&schema.create_cql(), Statement::CreateTable(schema.clone()))
        })?;
        self.session
            .execute(&statement, &[])
            .with_context(|| format!("create table {}", schema.name))?;
        Ok(())
    }

    /// CREATE только если этот экземпляр ещё не создавал таблицу.
    pub fn ensure(&self, schema: &TableSchema) -> Result<()> {
        let known = self
            .known
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&schema.name);
        if known {
            return Ok(());
        }
        self.create(schema)
    }

    /// DROP TABLE IF EXISTS; повторный вызов безвреден.
    pub fn drop_table(&self, location: &str) -> Result<()> {
        let _g = self
            .drop_mutex
            .lock()
            .map_err(|_| anyhow!("schema drop mutex poisoned"))?;

        let statement = self.drop_statements.get_or_prepare(location, || {
            self.session.prepare(
                &render(DROP_TABLE_TEMPLATE, location),
                Statement::DropTable {
                    table: location.to_string(),
                },
            )
        })?;
        self.session
            .execute(&statement, &[])
            .with_context(|| format!("drop table {}", location))?;

        self.known
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(location);
        record_ddl_drop();
        info!("schema: dropped table {}", location);
        Ok(())
    }
}
