//! MemorySession - хранилище целиком в памяти процесса.
//!
//! Используется в тестах и при встраивании без диска. Считает вызовы execute,
//! чтобы тесты могли доказать "обращения к хранилищу не было".

use anyhow::{anyhow, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::table::Table;
use super::{Prepared, Row, Session, Statement, Value};
use crate::error::StoreError;
use crate::metrics::record_session_execution;

#[derive(Default)]
pub struct MemorySession {
    tables: RwLock<HashMap<String, Table>>,
    next_id: AtomicU64,
    executions: AtomicU64,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Сколько раз вызывался execute.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables
            .read()
            .map(|g| g.contains_key(name))
            .unwrap_or(false)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn unknown(table: &str) -> anyhow::Error {
    StoreError::UnknownTable {
        table: table.to_string(),
    }
    .into()
}

impl Session for MemorySession {
    fn prepare(&self, cql: &str, statement: Statement) -> Result<Prepared> {
        // Как и у кластера: DML нельзя подготовить к несуществующей таблице.
        match &statement {
            Statement::Insert { table, columns } | Statement::Select { table, columns, .. } => {
                let guard = self
                    .tables
                    .read()
                    .map_err(|_| anyhow!("memory session lock poisoned"))?;
                let t = guard.get(table).ok_or_else(|| unknown(table))?;
                t.schema.check_columns(columns)?;
            }
            Statement::CreateTable(_) | Statement::DropTable { .. } => {}
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Prepared::new(id, cql.to_string(), statement))
    }

    fn execute(&self, prepared: &Prepared, params: &[Value]) -> Result<Vec<Row>> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        record_session_execution();

        match prepared.statement() {
            Statement::CreateTable(schema) => {
                let mut guard = self
                    .tables
                    .write()
                    .map_err(|_| anyhow!("memory session lock poisoned"))?;
                if !guard.contains_key(&schema.name) {
                    debug!("memory: create table {}", schema.name);
                    guard.insert(schema.name.clone(), Table::new(schema.clone()));
                }
                Ok(Vec::new())
            }
            Statement::DropTable { table } => {
                let mut guard = self
                    .tables
                    .write()
                    .map_err(|_| anyhow!("memory session lock poisoned"))?;
                if guard.remove(table).is_some() {
                    debug!("memory: drop table {}", table);
                }
                Ok(Vec::new())
            }
            Statement::Insert { table, columns } => {
                let mut guard = self
                    .tables
                    .write()
                    .map_err(|_| anyhow!("memory session lock poisoned"))?;
                let t = guard.get_mut(table).ok_or_else(|| unknown(table))?;
                let row = t.schema.build_row(columns, params)?;
                t.insert(row)?;
                Ok(Vec::new())
            }
            Statement::Select {
                table,
                columns,
                filter,
                limit,
            } => {
                let guard = self
                    .tables
                    .read()
                    .map_err(|_| anyhow!("memory session lock poisoned"))?;
                let t = guard.get(table).ok_or_else(|| unknown(table))?;
                let pk = t.schema.partition_key_from_filter(filter, params)?;
                Ok(t.select(&pk, columns, *limit))
            }
        }
    }
}
