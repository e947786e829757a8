//! FileSession - долговременный локальный бэкенд.
//!
//! Раскладка:
//!   <root>/<keyspace>/LOCK                      - fs2 exclusive lock (один процесс-владелец)
//!   <root>/<keyspace>/<table>/schema.json       - TableSchema
//!   <root>/<keyspace>/<table>/p-<xx64>.part     - одна партиция = один append-only файл
//!
//! Кадр: [len u32 LE][crc32 u32 LE] + payload(len), payload = JSON строки.
//! CRC: crc32 над [len u32] + payload.
//!
//! Замечания:
//! - Имя файла партиции - xxhash64(seed=0) от JSON ключа партиции; коллизии
//!   разрешаются сравнением ключа каждой прочитанной строки.
//! - При open недописанный хвост (crash посреди кадра) усекается.
//! - При чтении неполный последний кадр пропускается (параллельный append),
//!   CRC mismatch в середине файла - Corrupted.

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32;
use fs2::FileExt;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::hash::Hasher;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use super::table::{Partition, PartitionKey, TableSchema};
use super::{Prepared, Row, Session, Statement, Value};
use crate::config::ProjConfig;
use crate::consts::{FRAME_HDR_SIZE, LOCK_FILE, PARTITION_EXT, PARTITION_PREFIX, SCHEMA_FILE};
use crate::error::StoreError;
use crate::metrics::record_session_execution;

pub struct FileSession {
    dir: PathBuf,
    _lock: File, // держим дескриптор
    data_fsync: bool,
    schemas: RwLock<HashMap<String, TableSchema>>,
    // сериализует append'ы в файлы партиций
    write_lock: Mutex<()>,
    next_id: AtomicU64,
    executions: AtomicU64,
}

impl FileSession {
    /// Открыть keyspace `<root>/<keyspace>` (создаётся при отсутствии).
    pub fn open(root: &Path, keyspace: &str, data_fsync: bool) -> Result<Self> {
        if keyspace.is_empty() || !keyspace.chars().all(is_name_char) {
            return Err(anyhow!("invalid keyspace name '{}'", keyspace));
        }
        let dir = root.join(keyspace);
        fs::create_dir_all(&dir).with_context(|| format!("create keyspace dir {}", dir.display()))?;

        let lock_path = dir.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        lock.try_lock_exclusive()
            .with_context(|| format!("keyspace {} is locked by another process", dir.display()))?;

        let schemas = load_schemas(&dir)?;
        let mut truncated = 0usize;
        for name in schemas.keys() {
            truncated += repair_table(&dir.join(name))?;
        }
        info!(
            "file session: opened {} ({} table(s), {} torn tail(s) truncated)",
            dir.display(),
            schemas.len(),
            truncated
        );

        Ok(Self {
            dir,
            _lock: lock,
            data_fsync,
            schemas: RwLock::new(schemas),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(0),
            executions: AtomicU64::new(0),
        })
    }

    /// Открыть по конфигурации (root обязателен).
    pub fn open_with_config(cfg: &ProjConfig) -> Result<Self> {
        let root = cfg
            .root
            .as_deref()
            .ok_or_else(|| anyhow!("file session requires a root directory (QP_ROOT)"))?;
        Self::open(Path::new(root), &cfg.keyspace, cfg.data_fsync)
    }

    pub fn dir_path(&self) -> &Path {
        &self.dir
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.schemas
            .read()
            .map(|g| g.contains_key(name))
            .unwrap_or(false)
    }

    fn schema(&self, table: &str) -> Result<TableSchema> {
        let guard = self
            .schemas
            .read()
            .map_err(|_| anyhow!("file session lock poisoned"))?;
        guard.get(table).cloned().ok_or_else(|| {
            StoreError::UnknownTable {
                table: table.to_string(),
            }
            .into()
        })
    }

    fn partition_path(&self, table: &str, pk: &PartitionKey) -> Result<PathBuf> {
        let key = serde_json::to_vec(pk).context("encode partition key")?;
        let mut h = twox_hash::XxHash64::with_seed(0);
        h.write(&key);
        Ok(self
            .dir
            .join(table)
            .join(format!("{}{:016x}.{}", PARTITION_PREFIX, h.finish(), PARTITION_EXT)))
    }

    fn create_table(&self, schema: &TableSchema) -> Result<()> {
        if !schema.name.chars().all(is_name_char) || schema.name.is_empty() {
            return Err(anyhow!("invalid table name '{}'", schema.name));
        }
        let mut guard = self
            .schemas
            .write()
            .map_err(|_| anyhow!("file session lock poisoned"))?;
        if guard.contains_key(&schema.name) {
            return Ok(());
        }
        let tdir = self.dir.join(&schema.name);
        fs::create_dir_all(&tdir).with_context(|| format!("create {}", tdir.display()))?;

        let path = tdir.join(SCHEMA_FILE);
        let tmp = tdir.join("schema.json.tmp");
        let data = serde_json::to_vec_pretty(schema).context("serialize schema.json")?;
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .with_context(|| format!("open {}", tmp.display()))?;
        f.write_all(&data)?;
        let _ = f.sync_all();
        fs::rename(&tmp, &path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;

        debug!("file session: created table {}", schema.name);
        guard.insert(schema.name.clone(), schema.clone());
        Ok(())
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        let mut guard = self
            .schemas
            .write()
            .map_err(|_| anyhow!("file session lock poisoned"))?;
        guard.remove(table);
        let tdir = self.dir.join(table);
        if tdir.exists() {
            fs::remove_dir_all(&tdir).with_context(|| format!("remove {}", tdir.display()))?;
            debug!("file session: dropped table {}", table);
        }
        Ok(())
    }

    fn insert(&self, table: &str, columns: &[String], params: &[Value]) -> Result<()> {
        let schema = self.schema(table)?;
        let row = schema.build_row(columns, params)?;
        let pk = schema.partition_key(&row)?;
        let path = self.partition_path(table, &pk)?;
        let payload = serde_json::to_vec(&row).context("encode row")?;

        let mut frame = vec![0u8; FRAME_HDR_SIZE + payload.len()];
        LittleEndian::write_u32(&mut frame[0..4], payload.len() as u32);
        let mut hasher = Crc32::new();
        hasher.update(&frame[0..4]);
        hasher.update(&payload);
        LittleEndian::write_u32(&mut frame[4..8], hasher.finalize());
        frame[FRAME_HDR_SIZE..].copy_from_slice(&payload);

        let _g = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("file session write lock poisoned"))?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        f.write_all(&frame)
            .with_context(|| format!("append {}", path.display()))?;
        if self.data_fsync {
            f.sync_data()?;
        }
        Ok(())
    }

    fn select(
        &self,
        table: &str,
        columns: &[String],
        filter: &[String],
        params: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        let schema = self.schema(table)?;
        let pk = schema.partition_key_from_filter(filter, params)?;
        let path = self.partition_path(table, &pk)?;
        let part = read_partition(&path, &schema, &pk)?;
        Ok(part.select(columns, limit))
    }
}

impl Session for FileSession {
    fn prepare(&self, cql: &str, statement: Statement) -> Result<Prepared> {
        match &statement {
            Statement::Insert { table, columns } | Statement::Select { table, columns, .. } => {
                self.schema(table)?.check_columns(columns)?;
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
                self.create_table(schema)?;
                Ok(Vec::new())
            }
            Statement::DropTable { table } => {
                self.drop_table(table)?;
                Ok(Vec::new())
            }
            Statement::Insert { table, columns } => {
                self.insert(table, columns, params)?;
                Ok(Vec::new())
            }
            Statement::Select {
                table,
                columns,
                filter,
                limit,
            } => self.select(table, columns, filter, params, *limit),
        }
    }
}

#[inline]
fn is_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

fn load_schemas(dir: &Path) -> Result<HashMap<String, TableSchema>> {
    let mut out = HashMap::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path().join(SCHEMA_FILE);
        if !path.exists() {
            continue;
        }
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        let schema: TableSchema =
            serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?;
        out.insert(schema.name.clone(), schema);
    }
    Ok(out)
}

/// Пройти кадры файла; вернуть смещение конца последнего целого кадра
/// и признак "хвост повреждён/недописан".
fn scan_frames<F>(path: &Path, bytes: &[u8], mut on_frame: F) -> Result<(usize, bool)>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut pos = 0usize;
    while pos < bytes.len() {
        if bytes.len() - pos < FRAME_HDR_SIZE {
            debug!("{}: partial header tail at off={}", path.display(), pos);
            return Ok((pos, true));
        }
        let len = LittleEndian::read_u32(&bytes[pos..pos + 4]) as usize;
        let crc_expected = LittleEndian::read_u32(&bytes[pos + 4..pos + 8]);
        let start = pos + FRAME_HDR_SIZE;
        let end = match start.checked_add(len) {
            Some(e) if e <= bytes.len() => e,
            _ => {
                debug!("{}: partial frame tail at off={}", path.display(), pos);
                return Ok((pos, true));
            }
        };
        let payload = &bytes[start..end];

        let mut hasher = Crc32::new();
        hasher.update(&bytes[pos..pos + 4]);
        hasher.update(payload);
        if hasher.finalize() != crc_expected {
            if end == bytes.len() {
                return Ok((pos, true));
            }
            return Err(StoreError::Corrupted {
                path: path.display().to_string(),
                offset: pos as u64,
                reason: "crc mismatch".into(),
            }
            .into());
        }

        on_frame(payload)?;
        pos = end;
    }
    Ok((pos, false))
}

fn read_partition(path: &Path, schema: &TableSchema, pk: &PartitionKey) -> Result<Partition> {
    let mut part = Partition::default();
    if !path.exists() {
        return Ok(part);
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    scan_frames(path, &bytes, |payload| {
        let row: Row = serde_json::from_slice(payload)
            .with_context(|| format!("decode row in {}", path.display()))?;
        // xx64-коллизия: в файле могут лежать чужие партиции
        if schema.partition_key(&row)? == *pk {
            part.upsert(schema, row)?;
        }
        Ok(())
    })?;
    Ok(part)
}

/// Усечь недописанные хвосты во всех партициях таблицы. Возвращает число усечённых файлов.
fn repair_table(tdir: &Path) -> Result<usize> {
    let mut truncated = 0usize;
    for entry in fs::read_dir(tdir).with_context(|| format!("read_dir {}", tdir.display()))? {
        let path = entry?.path();
        let is_part = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(PARTITION_PREFIX) && n.ends_with(PARTITION_EXT))
            .unwrap_or(false);
        if !is_part {
            continue;
        }
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        let (good_end, torn) = scan_frames(&path, &bytes, |_| Ok(()))?;
        if torn {
            warn!(
                "{}: truncating torn tail ({} -> {} bytes)",
                path.display(),
                bytes.len(),
                good_end
            );
            let f = OpenOptions::new()
                .write(true)
                .open(&path)
                .with_context(|| format!("open {}", path.display()))?;
            f.set_len(good_end as u64)?;
            f.sync_all()?;
            truncated += 1;
        }
    }
    Ok(truncated)
}
