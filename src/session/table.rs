//! Табличный движок локальных бэкендов.
//!
//! Семантика повторяет кластерное хранилище в том объёме, который нужен ядру:
//! - строка адресуется (partition key, clustering key);
//! - INSERT = upsert по полному первичному ключу (последняя запись побеждает);
//! - SELECT только с равенством по всему ключу партиции, строки отдаются
//!   в порядке кластеризации (ASC/DESC по колонкам), LIMIT обрезает хвост.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use super::{Row, Value};
use crate::consts::{render, CREATE_COMMITS_TABLE_TEMPLATE, CREATE_SNAPSHOTS_TABLE_TEMPLATE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Int,
    BigInt,
    Blob,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringOrder {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub partition_key: Vec<String>,
    pub clustering: Vec<(String, ClusteringOrder)>,
}

fn col(name: &str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        ty,
    }
}

impl TableSchema {
    /// Таблица коммитов: (id text, sm int, evarid text, evarrev int, evarts bigint,
    /// evarpos int, data blob), PRIMARY KEY ((id, sm), evarid, evarrev, evarpos, evarts).
    pub fn commits(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: vec![
                col("id", ColumnType::Text),
                col("sm", ColumnType::Int),
                col("evarid", ColumnType::Text),
                col("evarrev", ColumnType::Int),
                col("evarts", ColumnType::BigInt),
                col("evarpos", ColumnType::Int),
                col("data", ColumnType::Blob),
            ],
            partition_key: vec!["id".into(), "sm".into()],
            clustering: vec![
                ("evarid".into(), ClusteringOrder::Asc),
                ("evarrev".into(), ClusteringOrder::Asc),
                ("evarpos".into(), ClusteringOrder::Asc),
                ("evarts".into(), ClusteringOrder::Asc),
            ],
        }
    }

    /// Таблица снапшотов: (id text, rev int, data blob), PRIMARY KEY (id, rev), rev DESC.
    pub fn snapshots(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: vec![
                col("id", ColumnType::Text),
                col("rev", ColumnType::Int),
                col("data", ColumnType::Blob),
            ],
            partition_key: vec!["id".into()],
            clustering: vec![("rev".into(), ClusteringOrder::Desc)],
        }
    }

    /// CQL для CREATE. Для двух известных раскладок - точный шаблон.
    pub fn create_cql(&self) -> String {
        if *self == TableSchema::commits(&self.name) {
            return render(CREATE_COMMITS_TABLE_TEMPLATE, &self.name);
        }
        if *self == TableSchema::snapshots(&self.name) {
            return render(CREATE_SNAPSHOTS_TABLE_TEMPLATE, &self.name);
        }
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, cql_type(c.ty)))
            .collect();
        let ck: Vec<&str> = self.clustering.iter().map(|(c, _)| c.as_str()).collect();
        let pk = if ck.is_empty() {
            format!("({})", self.partition_key.join(", "))
        } else {
            format!("({}), {}", self.partition_key.join(", "), ck.join(", "))
        };
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{}" ({}, PRIMARY KEY ({}));"#,
            self.name,
            cols.join(", "),
            pk
        )
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn check_columns(&self, columns: &[String]) -> Result<()> {
        for c in columns {
            if self.column(c).is_none() {
                return Err(anyhow!("table '{}': unknown column '{}'", self.name, c));
            }
        }
        Ok(())
    }

    /// Собрать строку из (колонки, параметры) с проверкой типов и наличия ключа.
    pub(crate) fn build_row(&self, columns: &[String], params: &[Value]) -> Result<Row> {
        if columns.len() != params.len() {
            return Err(anyhow!(
                "table '{}': {} columns but {} values bound",
                self.name,
                columns.len(),
                params.len()
            ));
        }
        let mut out = Vec::with_capacity(columns.len());
        for (c, v) in columns.iter().zip(params.iter()) {
            let def = self
                .column(c)
                .ok_or_else(|| anyhow!("table '{}': unknown column '{}'", self.name, c))?;
            if def.ty != v.column_type() {
                return Err(anyhow!(
                    "table '{}': column '{}' is {:?}, got {:?}",
                    self.name,
                    c,
                    def.ty,
                    v.column_type()
                ));
            }
            out.push((c.clone(), v.clone()));
        }
        let row = Row::new(out);
        for k in self
            .partition_key
            .iter()
            .chain(self.clustering.iter().map(|(c, _)| c))
        {
            if row.get(k).is_none() {
                return Err(anyhow!("table '{}': missing primary key column '{}'", self.name, k));
            }
        }
        Ok(row)
    }

    pub(crate) fn partition_key(&self, row: &Row) -> Result<PartitionKey> {
        self.partition_key
            .iter()
            .map(|c| {
                row.get(c)
                    .cloned()
                    .ok_or_else(|| anyhow!("table '{}': missing partition column '{}'", self.name, c))
            })
            .collect()
    }

    /// Ключ партиции из WHERE: фильтр обязан покрывать ровно весь ключ партиции.
    pub(crate) fn partition_key_from_filter(
        &self,
        filter: &[String],
        params: &[Value],
    ) -> Result<PartitionKey> {
        if filter.len() != params.len() {
            return Err(anyhow!(
                "table '{}': {} filter columns but {} values bound",
                self.name,
                filter.len(),
                params.len()
            ));
        }
        let mut key = Vec::with_capacity(self.partition_key.len());
        for pk in &self.partition_key {
            let pos = filter.iter().position(|f| f == pk).ok_or_else(|| {
                anyhow!(
                    "table '{}': select must restrict partition column '{}'",
                    self.name,
                    pk
                )
            })?;
            key.push(params[pos].clone());
        }
        if filter.len() != self.partition_key.len() {
            return Err(anyhow!(
                "table '{}': only partition key restrictions are supported",
                self.name
            ));
        }
        Ok(key)
    }

    pub(crate) fn clustering_key(&self, row: &Row) -> Result<ClusteringKey> {
        self.clustering
            .iter()
            .map(|(c, order)| {
                let v = row
                    .get(c)
                    .cloned()
                    .ok_or_else(|| anyhow!("table '{}': missing clustering column '{}'", self.name, c))?;
                Ok(match order {
                    ClusteringOrder::Asc => KeyPart::Asc(v),
                    ClusteringOrder::Desc => KeyPart::Desc(Reverse(v)),
                })
            })
            .collect()
    }
}

fn cql_type(t: ColumnType) -> &'static str {
    match t {
        ColumnType::Text => "text",
        ColumnType::Int => "int",
        ColumnType::BigInt => "bigint",
        ColumnType::Blob => "blob",
    }
}

pub(crate) type PartitionKey = Vec<Value>;

/// Компонент clustering key; у одной схемы варианты стоят на одних и тех же
/// позициях, поэтому derive(Ord) сравнивает только значения.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum KeyPart {
    Asc(Value),
    Desc(Reverse<Value>),
}

pub(crate) type ClusteringKey = Vec<KeyPart>;

/// Одна партиция: строки в порядке кластеризации.
#[derive(Debug, Default)]
pub(crate) struct Partition {
    rows: BTreeMap<ClusteringKey, Row>,
}

impl Partition {
    pub(crate) fn upsert(&mut self, schema: &TableSchema, row: Row) -> Result<()> {
        let ck = schema.clustering_key(&row)?;
        self.rows.insert(ck, row);
        Ok(())
    }

    pub(crate) fn select(&self, columns: &[String], limit: Option<usize>) -> Vec<Row> {
        let take = limit.unwrap_or(usize::MAX);
        self.rows
            .values()
            .take(take)
            .map(|r| project(r, columns))
            .collect()
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }
}

fn project(row: &Row, columns: &[String]) -> Row {
    Row::new(
        columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect(),
    )
}

/// Таблица целиком в памяти (MemorySession).
#[derive(Debug)]
pub(crate) struct Table {
    pub(crate) schema: TableSchema,
    partitions: HashMap<PartitionKey, Partition>,
}

impl Table {
    pub(crate) fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            partitions: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, row: Row) -> Result<()> {
        let pk = self.schema.partition_key(&row)?;
        let part = self.partitions.entry(pk).or_default();
        part.upsert(&self.schema, row)
    }

    pub(crate) fn select(&self, pk: &PartitionKey, columns: &[String], limit: Option<usize>) -> Vec<Row> {
        match self.partitions.get(pk) {
            Some(p) => p.select(columns, limit),
            None => Vec::new(),
        }
    }

    #[allow(dead_code)]
    pub(crate) fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_row(id: &str, sm: i32, evarid: &str, rev: i32, pos: i32, ts: i64, data: &[u8]) -> Row {
        let s = TableSchema::commits("t");
        s.build_row(
            &["id", "sm", "evarid", "evarrev", "evarpos", "evarts", "data"]
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>(),
            &[
                Value::Text(id.into()),
                Value::Int(sm),
                Value::Text(evarid.into()),
                Value::Int(rev),
                Value::Int(pos),
                Value::BigInt(ts),
                Value::Blob(data.to_vec()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn commits_cluster_by_origin_ascending() {
        let s = TableSchema::commits("t");
        let mut t = Table::new(s);
        t.insert(commit_row("x", 1, "b", 1, 0, 10, b"3")).unwrap();
        t.insert(commit_row("x", 1, "a", 2, 0, 10, b"2")).unwrap();
        t.insert(commit_row("x", 1, "a", 1, 1, 10, b"1")).unwrap();
        t.insert(commit_row("x", 1, "a", 1, 0, 10, b"0")).unwrap();
        t.insert(commit_row("x", 2, "a", 1, 0, 10, b"other-bucket")).unwrap();

        let pk = vec![Value::Text("x".into()), Value::Int(1)];
        let rows = t.select(&pk, &["data".to_string()], None);
        let got: Vec<&[u8]> = rows.iter().map(|r| r.get_blob("data").unwrap()).collect();
        assert_eq!(got, vec![&b"0"[..], &b"1"[..], &b"2"[..], &b"3"[..]]);
        assert_eq!(t.partition_count(), 2);
    }

    #[test]
    fn snapshots_cluster_by_revision_descending() {
        let s = TableSchema::snapshots("t_sp");
        let cols: Vec<String> = ["id", "rev", "data"].iter().map(|c| c.to_string()).collect();
        let mut t = Table::new(s.clone());
        for rev in [3, 9, 5] {
            let row = s
                .build_row(&cols, &[Value::Text("x".into()), Value::Int(rev), Value::Blob(vec![rev as u8])])
                .unwrap();
            t.insert(row).unwrap();
        }
        let rows = t.select(&vec![Value::Text("x".into())], &cols, Some(1));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_int("rev").unwrap(), 9);
    }

    #[test]
    fn same_primary_key_is_upsert() {
        let mut t = Table::new(TableSchema::commits("t"));
        t.insert(commit_row("x", 1, "a", 1, 0, 10, b"old")).unwrap();
        t.insert(commit_row("x", 1, "a", 1, 0, 10, b"new")).unwrap();
        let pk = vec![Value::Text("x".into()), Value::Int(1)];
        let rows = t.select(&pk, &["data".to_string()], None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_blob("data").unwrap(), b"new");
    }

    #[test]
    fn known_layouts_render_exact_cql() {
        assert_eq!(
            TableSchema::commits("orders_1").create_cql(),
            r#"CREATE TABLE IF NOT EXISTS "orders_1" (id text, sm int, evarid text, evarrev int, evarts bigint, evarpos int, data blob, PRIMARY KEY ((id, sm), evarid, evarrev, evarpos, evarts)) WITH CLUSTERING ORDER BY (evarid ASC);"#
        );
        assert_eq!(
            TableSchema::snapshots("orders_sp_1").create_cql(),
            r#"CREATE TABLE IF NOT EXISTS "orders_sp_1" (id text, rev int, data blob, PRIMARY KEY (id, rev)) WITH CLUSTERING ORDER BY (rev DESC);"#
        );
    }

    #[test]
    fn select_requires_full_partition_key() {
        let s = TableSchema::commits("t");
        let err = s
            .partition_key_from_filter(&["id".to_string()], &[Value::Text("x".into())])
            .unwrap_err();
        assert!(err.to_string().contains("'sm'"));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let s = TableSchema::snapshots("t");
        let cols: Vec<String> = ["id", "rev", "data"].iter().map(|c| c.to_string()).collect();
        assert!(s
            .build_row(&cols, &[Value::Text("x".into()), Value::BigInt(1), Value::Blob(vec![])])
            .is_err());
    }
}
