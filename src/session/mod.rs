//! session - контракт сессии к кластерному хранилищу и локальные бэкенды.
//!
//! Подмодули:
//! - mod.rs    - Value / Row / Statement / Prepared, трейт Session.
//! - table.rs  - схема таблицы, ключи партиции/кластеризации, партиция в порядке clustering.
//! - cache.rs  - per-location кэш подготовленных выражений (get-or-create, гонки безвредны).
//! - memory.rs - MemorySession: всё в памяти (тесты, встраивание).
//! - file.rs   - FileSession: партиции в append-only файлах с CRC-кадрами.
//!
//! Statement несёт и структуру (её интерпретируют локальные бэкенды), и точный
//! CQL-текст (`Prepared::cql`) - его может исполнить удалённый драйвер.
//! Ретраи, таймауты и consistency - забота транспорта, не этого слоя.

pub(crate) mod cache;
mod file;
mod memory;
mod table;

pub use file::FileSession;
pub use memory::MemorySession;
pub use table::{ClusteringOrder, ColumnDef, ColumnType, TableSchema};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "lowercase")]
pub enum Value {
    Text(String),
    Int(i32),
    BigInt(i64),
    Blob(#[serde(with = "crate::codec::b64")] Vec<u8>),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Text(_) => ColumnType::Text,
            Value::Int(_) => ColumnType::Int,
            Value::BigInt(_) => ColumnType::BigInt,
            Value::Blob(_) => ColumnType::Blob,
        }
    }
}

/// Строка результата: пары (колонка, значение) в порядке проекции SELECT.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(c, _)| c == name)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &(String, Value)> {
        self.columns.iter()
    }

    pub fn get_blob(&self, name: &str) -> Result<&[u8]> {
        match self.get(name) {
            Some(Value::Blob(b)) => Ok(b),
            other => Err(anyhow!("column '{}': expected blob, got {:?}", name, other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i32> {
        match self.get(name) {
            Some(Value::Int(n)) => Ok(*n),
            other => Err(anyhow!("column '{}': expected int, got {:?}", name, other)),
        }
    }

    pub fn get_bigint(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(Value::BigInt(n)) => Ok(*n),
            other => Err(anyhow!("column '{}': expected bigint, got {:?}", name, other)),
        }
    }

    pub fn get_text(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Ok(s),
            other => Err(anyhow!("column '{}': expected text, got {:?}", name, other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    CreateTable(TableSchema),
    DropTable {
        table: String,
    },
    Insert {
        table: String,
        columns: Vec<String>,
    },
    /// Равенство по всем колонкам ключа партиции (`filter`), опционально LIMIT.
    Select {
        table: String,
        columns: Vec<String>,
        filter: Vec<String>,
        limit: Option<usize>,
    },
}

impl Statement {
    pub fn table(&self) -> &str {
        match self {
            Statement::CreateTable(s) => &s.name,
            Statement::DropTable { table }
            | Statement::Insert { table, .. }
            | Statement::Select { table, .. } => table,
        }
    }

    pub fn insert(table: &str, columns: &[&str]) -> Self {
        Statement::Insert {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn select(table: &str, columns: &[&str], filter: &[&str], limit: Option<usize>) -> Self {
        Statement::Select {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            filter: filter.iter().map(|c| c.to_string()).collect(),
            limit,
        }
    }
}

/// Подготовленное выражение. Детерминированная функция от (cql, statement),
/// поэтому две параллельно построенные копии взаимозаменяемы.
#[derive(Clone, Debug)]
pub struct Prepared {
    id: u64,
    cql: String,
    statement: Statement,
}

impl Prepared {
    pub fn new(id: u64, cql: String, statement: Statement) -> Self {
        Self { id, cql, statement }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cql(&self) -> &str {
        &self.cql
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }
}

/// Живая сессия к хранилищу. Все вызовы синхронные и потокобезопасные.
pub trait Session: Send + Sync {
    fn prepare(&self, cql: &str, statement: Statement) -> Result<Prepared>;

    fn execute(&self, prepared: &Prepared, params: &[Value]) -> Result<Vec<Row>>;
}
