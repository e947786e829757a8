use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use QuiverProj::VersionResolver;

use super::util::{open_ctx, open_store};

pub fn exec_list(root: Option<PathBuf>, keyspace: Option<String>, contract: String, json: bool) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    ctx.versions.ensure_live(&contract)?;
    let versions = ctx.versions.get_versions(&contract)?;

    if json {
        let items: Vec<_> = versions
            .iter()
            .map(|v| {
                json!({
                    "version": v.version_number,
                    "status": v.status.to_string(),
                    "location": v.location(""),
                })
            })
            .collect();
        println!("{}", json!({ "contract": contract, "versions": items }));
        return Ok(());
    }

    println!("contract '{}':", contract);
    for v in versions.iter() {
        println!("  v{:<4} {:<9} {}", v.version_number, v.status, v.location(""));
    }
    Ok(())
}

pub fn exec_build(root: Option<PathBuf>, keyspace: Option<String>, contract: String) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    ctx.versions.ensure_live(&contract)?;
    let v = ctx.versions.start_building(&contract)?;
    println!("building {} v{} -> {}", contract, v.version_number, v.location(""));
    Ok(())
}

pub fn exec_promote(root: Option<PathBuf>, keyspace: Option<String>, contract: String, version: i32) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    let v = ctx.versions.promote(&contract, version)?;
    // таблицы новой Live-версии создаются при сборке store
    open_store(&ctx, std::slice::from_ref(&contract))?;
    println!("live {} v{} -> {}", contract, v.version_number, v.location(""));
    Ok(())
}

pub fn exec_cancel(root: Option<PathBuf>, keyspace: Option<String>, contract: String, version: i32) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    ctx.versions.cancel(&contract, version)?;
    println!("canceled {} v{}", contract, version);
    Ok(())
}

pub fn exec_drop(root: Option<PathBuf>, keyspace: Option<String>, contract: String, version: i32) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    let store = open_store(&ctx, std::slice::from_ref(&contract))?;
    store.drop_version(&contract, version)?;
    println!("dropped {} v{}", contract, version);
    Ok(())
}
