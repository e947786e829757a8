use anyhow::Result;
use std::path::PathBuf;

use QuiverProj::{EventOrigin, ProjectionCommit, StoreError, VersionResolver};

use super::util::{decode_data_arg, now_millis, open_ctx, open_store, parse_id};

pub struct AppendArgs {
    pub contract: String,
    pub id: String,
    pub id_kind: String,
    pub marker: i32,
    pub aggregate: String,
    pub revision: i32,
    pub position: i32,
    pub data: String,
    pub version: Option<i32>,
    pub replay: bool,
}

pub fn exec(root: Option<PathBuf>, keyspace: Option<String>, a: AppendArgs) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    let store = open_store(&ctx, std::slice::from_ref(&a.contract))?;
    let versions = ctx.versions.get_versions(&a.contract)?;

    let version = match a.version {
        Some(n) => versions.get(n).cloned().ok_or_else(|| StoreError::UnknownVersion {
            contract: a.contract.clone(),
            version: n,
        })?,
        None if a.replay => versions.building().cloned().ok_or_else(|| {
            StoreError::NoBuildingVersion {
                contract: a.contract.clone(),
            }
        })?,
        None => versions.live(&a.contract)?.clone(),
    };

    let id = parse_id(&a.id_kind, &a.id)?;
    let data = decode_data_arg(&a.data)?;
    let len = data.len();
    let commit = ProjectionCommit::new(
        id,
        a.marker,
        EventOrigin::new(a.aggregate, a.revision, a.position, now_millis()),
        version,
        data,
    );
    store.save(&commit, a.replay)?;

    println!(
        "OK appended {} sm={} ({} B) -> {}",
        commit.projection_id,
        commit.snapshot_marker,
        len,
        commit.version.location("")
    );
    Ok(())
}
