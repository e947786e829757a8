use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use QuiverProj::consts::VERSIONS_FILE;
use QuiverProj::{
    JsonSerializer, ProjConfig, ProjectionId, ProjectionRegistry, ProjectionStore, ProjectionType,
    Session, SessionProvider, VersionRegistry,
};

/// Открытый keyspace: сессия + реестр версий рядом с таблицами.
pub struct Ctx {
    pub cfg: ProjConfig,
    pub session: Arc<dyn Session>,
    pub versions: Arc<VersionRegistry>,
}

pub fn open_ctx(root: Option<PathBuf>, keyspace: Option<String>) -> Result<Ctx> {
    let mut cfg = ProjConfig::from_env();
    if let Some(r) = root {
        cfg = cfg.with_root(Some(r.display().to_string()));
    }
    if let Some(ks) = keyspace {
        cfg = cfg.with_keyspace(ks);
    }
    let root = cfg
        .root
        .clone()
        .ok_or_else(|| anyhow!("--root (or QP_ROOT) is required"))?;

    let session = SessionProvider::from_config(cfg.clone()).session()?;
    let versions_path = Path::new(&root).join(&cfg.keyspace).join(VERSIONS_FILE);
    let versions = Arc::new(VersionRegistry::open(&versions_path)?);
    Ok(Ctx {
        cfg,
        session,
        versions,
    })
}

/// Store над перечисленными контрактами. Из CLI каждый контракт считается
/// определением проекции со снапшотами; у контракта без версий появляется Live v1.
pub fn open_store(ctx: &Ctx, contracts: &[String]) -> Result<ProjectionStore> {
    let mut registry = ProjectionRegistry::new().use_snapshots(contracts.iter().cloned());
    for c in contracts {
        ctx.versions.ensure_live(c)?;
        registry = registry.register(ProjectionType::new(c.as_str()).handles("*"));
    }
    ProjectionStore::builder()
        .session(ctx.session.clone())
        .serializer(Arc::new(JsonSerializer))
        .resolver(ctx.versions.clone())
        .registry(registry)
        .config(ctx.cfg.clone())
        .build()
}

pub fn parse_id(kind: &str, value: &str) -> Result<ProjectionId> {
    ProjectionId::from_tagged(kind, value)
}

pub fn decode_data_arg(arg: &str) -> Result<Vec<u8>> {
    if arg == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    if let Some(p) = arg.strip_prefix('@') {
        return std::fs::read(p).with_context(|| format!("read data file {}", p));
    }
    Ok(arg.as_bytes().to_vec())
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub fn display_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => format!("<{} B binary>", bytes.len()),
    }
}
