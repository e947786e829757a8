use anyhow::{Context, Result};
use std::path::PathBuf;

use QuiverProj::Snapshot;

use super::util::{open_ctx, open_store, parse_id};

pub fn exec_get(
    root: Option<PathBuf>,
    keyspace: Option<String>,
    contract: String,
    id: String,
    id_kind: String,
) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    let store = open_store(&ctx, std::slice::from_ref(&contract))?;
    let id = parse_id(&id_kind, &id)?;
    let snap = store.load_snapshot(&contract, &id)?;
    match snap.state() {
        Some(state) => println!("FOUND {} rev={} state={}", id, snap.revision(), state),
        None => println!("MISSING {}", id),
    }
    Ok(())
}

pub fn exec_put(
    root: Option<PathBuf>,
    keyspace: Option<String>,
    contract: String,
    id: String,
    id_kind: String,
    revision: i32,
    state: String,
) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    let store = open_store(&ctx, std::slice::from_ref(&contract))?;
    let id = parse_id(&id_kind, &id)?;
    let state: serde_json::Value = serde_json::from_str(&state).context("parse --state as JSON")?;
    store.save_snapshot(&Snapshot::new(id.clone(), contract.as_str(), state, revision))?;
    println!("OK snapshot {} rev={}", id, revision);
    Ok(())
}
