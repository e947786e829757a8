use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use QuiverProj::consts::VERSIONS_FILE;
use QuiverProj::{
    EventOrigin, FileSession, JsonSerializer, ProjectionCommit, ProjectionId, ProjectionRegistry,
    ProjectionStore, ProjectionType, Snapshot, VersionRegistry,
};

/// Уникальный корневой путь для теста.
fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("qproj-{}-{}-{}", prefix, pid, t))
}

fn open_store(root: &Path) -> Result<(Arc<FileSession>, Arc<VersionRegistry>, ProjectionStore)> {
    let session = Arc::new(FileSession::open(root, "projections", false)?);
    let versions = Arc::new(VersionRegistry::open(&session.dir_path().join(VERSIONS_FILE))?);
    versions.ensure_live("orders")?;
    let store = ProjectionStore::builder()
        .session(session.clone())
        .serializer(Arc::new(JsonSerializer))
        .resolver(versions.clone())
        .registry(
            ProjectionRegistry::new()
                .register(ProjectionType::new("orders").handles("OrderPlaced"))
                .use_snapshots(["orders"]),
        )
        .build()?;
    Ok((session, versions, store))
}

fn append(store: &ProjectionStore, versions: &VersionRegistry, id: &ProjectionId, sm: i32, data: &[u8]) -> Result<()> {
    let live = versions.ensure_live("orders")?;
    store.save(
        &ProjectionCommit::new(
            id.clone(),
            sm,
            EventOrigin::new("agg-1", sm, 0, 1_700_000_000_000 + i64::from(sm)),
            live,
            data.to_vec(),
        ),
        false,
    )
}

fn partition_files(table_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for e in fs::read_dir(table_dir)? {
        let p = e?.path();
        if p.extension().and_then(|x| x.to_str()) == Some("part") {
            out.push(p);
        }
    }
    out.sort();
    Ok(out)
}

#[test]
fn commits_and_snapshots_survive_reopen() -> Result<()> {
    let root = unique_root("reopen");
    fs::create_dir_all(&root)?;
    let id = ProjectionId::text("x");

    {
        let (session, versions, store) = open_store(&root)?;
        assert!(session.has_table("orders_1"));
        assert!(session.has_table("orders_sp_1"));
        append(&store, &versions, &id, 1, b"A")?;
        append(&store, &versions, &id, 2, b"B")?;
        store.save_snapshot(&Snapshot::new(id.clone(), "orders", serde_json::json!({"n": 1}), 1))?;
    }

    let (_session, _versions, store) = open_store(&root)?;
    let stream = store.load("orders", &id, &Snapshot::missing(id.clone(), "orders"), false)?;
    let data: Vec<&[u8]> = stream.commits().iter().map(|c| c.data.as_slice()).collect();
    assert_eq!(data, vec![&b"A"[..], &b"B"[..]]);

    let latest = store.load_latest("orders", &id, false)?;
    assert_eq!(latest.snapshot().revision(), 1);
    assert_eq!(latest.len(), 1, "only marker 2 follows the snapshot");
    Ok(())
}

#[test]
fn torn_tail_is_truncated_on_open() -> Result<()> {
    let root = unique_root("torn");
    fs::create_dir_all(&root)?;
    let id = ProjectionId::text("x");
    let table_dir = root.join("projections").join("orders_1");

    {
        let (_session, versions, store) = open_store(&root)?;
        append(&store, &versions, &id, 1, b"first")?;
    }

    let parts = partition_files(&table_dir)?;
    assert_eq!(parts.len(), 1, "one partition (id, sm=1)");
    let good_len = fs::metadata(&parts[0])?.len();

    // недописанный кадр: заголовок обещает 64 байта, есть только 3
    {
        let mut f = OpenOptions::new().append(true).open(&parts[0])?;
        f.write_all(&[64, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF, 1, 2, 3])?;
        f.sync_all()?;
    }

    let (_session, _versions, store) = open_store(&root)?;
    assert_eq!(fs::metadata(&parts[0])?.len(), good_len, "tail must be truncated");
    let stream = store.load("orders", &id, &Snapshot::missing(id.clone(), "orders"), false)?;
    assert_eq!(stream.len(), 1);
    assert_eq!(stream.commits()[0].data, b"first".to_vec());
    Ok(())
}

#[test]
fn keyspace_is_exclusively_locked() -> Result<()> {
    let root = unique_root("lock");
    fs::create_dir_all(&root)?;

    let first = FileSession::open(&root, "projections", false)?;
    assert!(
        FileSession::open(&root, "projections", false).is_err(),
        "second open of the same keyspace must fail"
    );
    // другой keyspace не заблокирован
    let _other = FileSession::open(&root, "other", false)?;
    drop(first);
    let _again = FileSession::open(&root, "projections", false)?;
    Ok(())
}
