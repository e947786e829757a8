//! Общие константы: CQL-шаблоны таблиц, суффиксы неймспейсов, пороги.
//!
//! Шаблоны воспроизводят физическую раскладку байт-в-байт (совместимость с
//! уже существующими кластерами). `{0}` заменяется именем таблицы (location).

// -------- Commit table --------
// PRIMARY KEY ((id, sm), evarid, evarrev, evarpos, evarts)
pub const CREATE_COMMITS_TABLE_TEMPLATE: &str = r#"CREATE TABLE IF NOT EXISTS "{0}" (id text, sm int, evarid text, evarrev int, evarts bigint, evarpos int, data blob, PRIMARY KEY ((id, sm), evarid, evarrev, evarpos, evarts)) WITH CLUSTERING ORDER BY (evarid ASC);"#;
pub const INSERT_COMMIT_TEMPLATE: &str =
    r#"INSERT INTO "{0}" (id, sm, evarid, evarrev, evarpos, evarts, data) VALUES (?,?,?,?,?,?,?);"#;
pub const SELECT_COMMITS_TEMPLATE: &str = r#"SELECT data FROM "{0}" WHERE id=? AND sm=?;"#;

// -------- Snapshot table --------
// PRIMARY KEY (id, rev), rev DESC -> LIMIT 1 = последняя ревизия
pub const CREATE_SNAPSHOTS_TABLE_TEMPLATE: &str = r#"CREATE TABLE IF NOT EXISTS "{0}" (id text, rev int, data blob, PRIMARY KEY (id, rev)) WITH CLUSTERING ORDER BY (rev DESC);"#;
pub const INSERT_SNAPSHOT_TEMPLATE: &str = r#"INSERT INTO "{0}" (id, rev, data) VALUES (?,?,?);"#;
pub const SELECT_SNAPSHOT_TEMPLATE: &str = r#"SELECT data, rev FROM "{0}" WHERE id=? LIMIT 1;"#;

// -------- DDL --------
pub const DROP_TABLE_TEMPLATE: &str = r#"DROP TABLE IF EXISTS "{0}";"#;

// -------- Namespaces --------
/// Неймспейс таблиц коммитов (без суффикса).
pub const COMMITS_SUFFIX: &str = "";
/// Неймспейс таблиц снапшотов.
pub const SNAPSHOTS_SUFFIX: &str = "_sp";

// -------- Scan guard --------
/// Мягкий порог: больше стольких коммитов в одном скане -> warn (не ошибка).
pub const SCAN_WARN_COMMITS: usize = 1000;

// -------- Snapshot strategy defaults --------
pub const DEFAULT_SNAPSHOT_OFFSET_SECS: u64 = 10 * 24 * 60 * 60;
pub const DEFAULT_EVENTS_IN_SNAPSHOT: u32 = 500;

// -------- Local backends --------
pub const DEFAULT_KEYSPACE: &str = "projections";
pub const LOCK_FILE: &str = "LOCK";
pub const SCHEMA_FILE: &str = "schema.json";
pub const VERSIONS_FILE: &str = "versions.json";
pub const PARTITION_PREFIX: &str = "p-";
pub const PARTITION_EXT: &str = "part";
/// Кадр партиции: [len u32][crc32 u32] + payload(len)
pub const FRAME_HDR_SIZE: usize = 8;

/// Подставить имя таблицы в шаблон.
#[inline]
pub fn render(template: &str, table: &str) -> String {
    template.replace("{0}", table)
}
