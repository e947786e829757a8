use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use QuiverProj::version::column_family;
use QuiverProj::{
    JsonSerializer, MemorySession, ProjectionRegistry, ProjectionStatus, ProjectionStore,
    ProjectionType, ProjectionVersion, StoreError, VersionRegistry, VersionResolver,
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

fn live_count_error(err: &anyhow::Error) -> Option<usize> {
    match err.downcast_ref::<StoreError>() {
        Some(StoreError::LiveVersion { found, .. }) => Some(*found),
        _ => None,
    }
}

#[test]
fn zero_live_versions_is_fatal() -> Result<()> {
    let reg = VersionRegistry::in_memory();
    reg.register("orders", ProjectionVersion::new("orders", 1, ProjectionStatus::Building))?;

    let err = reg.get_live_location("orders", "").unwrap_err();
    assert_eq!(live_count_error(&err), Some(0));

    // контракт без версий вообще - тоже ноль Live
    let err = reg.get_live_location("nobody", "").unwrap_err();
    assert_eq!(live_count_error(&err), Some(0));
    Ok(())
}

#[test]
fn two_live_versions_are_fatal() -> Result<()> {
    let reg = VersionRegistry::in_memory();
    reg.register("orders", ProjectionVersion::live("orders", 1))?;
    reg.register("orders", ProjectionVersion::live("orders", 2))?;

    let err = reg.get_live_location("orders", "_sp").unwrap_err();
    assert_eq!(live_count_error(&err), Some(2), "must never pick one of two live versions");
    Ok(())
}

#[test]
fn store_build_fails_when_live_version_is_ambiguous() -> Result<()> {
    let reg = Arc::new(VersionRegistry::in_memory());
    reg.register("orders", ProjectionVersion::live("orders", 1))?;
    reg.register("orders", ProjectionVersion::live("orders", 2))?;

    let res = ProjectionStore::builder()
        .session(Arc::new(MemorySession::new()))
        .serializer(Arc::new(JsonSerializer))
        .resolver(reg)
        .registry(ProjectionRegistry::new().register(ProjectionType::new("orders").handles("E")))
        .build();
    let err = match res {
        Ok(_) => panic!("build must fail"),
        Err(e) => e,
    };
    assert_eq!(live_count_error(&err), Some(2));
    Ok(())
}

#[test]
fn location_naming() {
    assert_eq!(column_family("Orders-Summary", ""), "orderssummary");
    assert_eq!(column_family("Orders-Summary", "_sp"), "orderssummary_sp");
    assert_eq!(
        ProjectionVersion::live("Orders-Summary", 3).location("_sp"),
        "orderssummary_sp_3"
    );
    assert_eq!(ProjectionVersion::live("Billing.Invoice v2", 1).location(""), "billinginvoicev2_1");
}

#[test]
fn promote_retires_previous_live() -> Result<()> {
    let reg = VersionRegistry::in_memory();
    let v1 = reg.ensure_live("orders")?;
    assert_eq!(v1.version_number, 1);
    assert_eq!(reg.get_live_location("orders", "")?, "orders_1");

    let v2 = reg.start_building("orders")?;
    assert_eq!(v2.version_number, 2);
    assert_eq!(v2.status, ProjectionStatus::Building);
    // Building не мешает единственной Live
    assert_eq!(reg.get_live_location("orders", "")?, "orders_1");

    reg.promote("orders", 2)?;
    let versions = reg.get_versions("orders")?;
    assert_eq!(versions.get(1).map(|v| v.status), Some(ProjectionStatus::Retired));
    assert_eq!(versions.get(2).map(|v| v.status), Some(ProjectionStatus::Live));
    assert_eq!(reg.get_live_location("orders", "_sp")?, "orders_sp_2");

    let err = reg.promote("orders", 9).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::UnknownVersion { version: 9, .. })
    ));
    Ok(())
}

#[test]
fn cancel_marks_building_only() -> Result<()> {
    let reg = VersionRegistry::in_memory();
    reg.ensure_live("orders")?;
    let v2 = reg.start_building("orders")?;
    reg.cancel("orders", v2.version_number)?;
    // Live не отменяется
    reg.cancel("orders", 1)?;

    let versions = reg.get_versions("orders")?;
    assert_eq!(versions.get(2).map(|v| v.status), Some(ProjectionStatus::Canceled));
    assert_eq!(versions.get(1).map(|v| v.status), Some(ProjectionStatus::Live));
    assert!(versions.building().is_none());
    Ok(())
}

#[test]
fn registry_file_survives_reopen() -> Result<()> {
    let root = unique_root("versions");
    fs::create_dir_all(&root)?;
    let path = root.join("versions.json");

    {
        let reg = VersionRegistry::open(&path)?;
        reg.ensure_live("orders")?;
        reg.start_building("orders")?;
        reg.ensure_live("billing")?;
    }

    let reg = VersionRegistry::open(&path)?;
    assert_eq!(reg.contracts(), vec!["billing".to_string(), "orders".to_string()]);
    let versions = reg.get_versions("orders")?;
    assert_eq!(versions.len(), 2);
    assert_eq!(versions.building().map(|v| v.version_number), Some(2));
    assert_eq!(reg.get_live_location("orders", "")?, "orders_1");
    Ok(())
}

#[test]
fn builder_fails_fast_on_missing_collaborators() -> Result<()> {
    let registry = || ProjectionRegistry::new().register(ProjectionType::new("orders").handles("E"));
    let versions = Arc::new(VersionRegistry::in_memory());
    versions.ensure_live("orders")?;

    let err = match ProjectionStore::builder()
        .serializer(Arc::new(JsonSerializer))
        .resolver(versions.clone())
        .registry(registry())
        .build()
    {
        Ok(_) => panic!("build without session must fail"),
        Err(e) => e,
    };
    assert_eq!(
        err.downcast_ref::<StoreError>(),
        Some(&StoreError::MissingCollaborator("session"))
    );

    let err = match ProjectionStore::builder()
        .session(Arc::new(MemorySession::new()))
        .resolver(versions.clone())
        .registry(registry())
        .build()
    {
        Ok(_) => panic!("build without serializer must fail"),
        Err(e) => e,
    };
    assert_eq!(
        err.downcast_ref::<StoreError>(),
        Some(&StoreError::MissingCollaborator("serializer"))
    );

    let err = match ProjectionStore::builder()
        .session(Arc::new(MemorySession::new()))
        .serializer(Arc::new(JsonSerializer))
        .resolver(versions)
        .registry(ProjectionRegistry::new())
        .build()
    {
        Ok(_) => panic!("build with empty registry must fail"),
        Err(e) => e,
    };
    assert_eq!(err.downcast_ref::<StoreError>(), Some(&StoreError::NoProjectionTypes));
    Ok(())
}
