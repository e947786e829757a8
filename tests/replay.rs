use anyhow::Result;
use std::sync::Arc;

use QuiverProj::{
    EventOrigin, JsonSerializer, MemorySession, ProjectionCommit, ProjectionId, ProjectionRegistry,
    ProjectionStore, ProjectionType, ProjectionVersion, Snapshot, StoreError, VersionRegistry,
};

fn open() -> Result<(Arc<MemorySession>, Arc<VersionRegistry>, ProjectionStore)> {
    let session = Arc::new(MemorySession::new());
    let versions = Arc::new(VersionRegistry::in_memory());
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

fn commit(id: &ProjectionId, version: &ProjectionVersion, sm: i32, data: &[u8]) -> ProjectionCommit {
    ProjectionCommit::new(
        id.clone(),
        sm,
        EventOrigin::new("agg-1", sm, 0, 1_700_000_000_000),
        version.clone(),
        data.to_vec(),
    )
}

#[test]
fn replay_without_building_version_fails() -> Result<()> {
    let (_session, _versions, store) = open()?;
    let id = ProjectionId::text("x");
    let err = match store.load("orders", &id, &Snapshot::missing(id.clone(), "orders"), true) {
        Ok(_) => panic!("replay load must fail without a building version"),
        Err(e) => e,
    };
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::NoBuildingVersion { .. })
    ));
    Ok(())
}

#[test]
fn replay_reads_and_writes_the_building_generation() -> Result<()> {
    let (session, versions, store) = open()?;
    let id = ProjectionId::text("x");
    let live = versions.ensure_live("orders")?;

    store.save(&commit(&id, &live, 1, b"old"), false)?;

    let building = versions.start_building("orders")?;
    assert!(!session.has_table("orders_2"), "building tables are created lazily");

    // пустая Building-таблица читается как пустой поток
    assert!(store.load_latest("orders", &id, true)?.is_empty());

    store.save(&commit(&id, &building, 1, b"new"), true)?;
    assert!(session.has_table("orders_2"));

    let replayed = store.load_latest("orders", &id, true)?;
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed.commits()[0].data, b"new".to_vec());

    let current = store.load_latest("orders", &id, false)?;
    assert_eq!(current.len(), 1);
    assert_eq!(current.commits()[0].data, b"old".to_vec());

    versions.promote("orders", building.version_number)?;
    let promoted = store.load_latest("orders", &id, false)?;
    assert_eq!(promoted.commits()[0].data, b"new".to_vec());
    Ok(())
}

#[test]
fn drop_version_refuses_live_and_removes_others() -> Result<()> {
    let (session, versions, store) = open()?;
    let building = versions.start_building("orders")?;
    let id = ProjectionId::text("x");
    store.save(&commit(&id, &building, 1, b"tmp"), true)?;

    let err = store.drop_version("orders", 1).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::LiveVersionDrop { version: 1, .. })
    ));
    assert!(session.has_table("orders_1"));

    let err = store.drop_version("orders", 7).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::UnknownVersion { version: 7, .. })
    ));

    store.drop_version("orders", 2)?;
    assert!(!session.has_table("orders_2"));

    // после promote старая Live становится Retired и удаляется вместе со снапшотами
    let v3 = versions.start_building("orders")?;
    versions.promote("orders", v3.version_number)?;
    assert!(session.has_table("orders_sp_1"));
    store.drop_version("orders", 1)?;
    assert!(!session.has_table("orders_1"));
    assert!(!session.has_table("orders_sp_1"));
    Ok(())
}

#[test]
fn write_to_freshly_promoted_version_creates_its_table() -> Result<()> {
    let (session, versions, store) = open()?;
    let id = ProjectionId::text("x");
    let building = versions.start_building("orders")?;
    let live = versions.promote("orders", building.version_number)?;
    assert!(!session.has_table("orders_2"));

    // без предварительного load
    store.save(&commit(&id, &live, 1, b"first"), false)?;
    assert!(session.has_table("orders_2"));

    let stream = store.load_latest("orders", &id, false)?;
    assert_eq!(stream.len(), 1);
    assert_eq!(stream.commits()[0].data, b"first".to_vec());
    Ok(())
}
