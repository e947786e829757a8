use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use QuiverProj::metrics;

use super::util::{open_ctx, open_store};

pub fn exec(root: Option<PathBuf>, keyspace: Option<String>, json: bool) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    let contracts = ctx.versions.contracts();
    if !contracts.is_empty() {
        open_store(&ctx, &contracts)?;
    }
    let m = metrics::snapshot();

    if json {
        let mut doc = serde_json::to_value(&m)?;
        doc["contracts"] = json!(contracts);
        println!("{}", doc);
        return Ok(());
    }

    println!("contracts: {}", contracts.join(", "));
    println!(
        "commits: appended={} scans={} buckets={} (avg {:.2}/scan) returned={} capacity_warnings={}",
        m.commits_appended,
        m.commit_scans,
        m.scan_buckets_read,
        m.avg_buckets_per_scan(),
        m.scan_commits_returned,
        m.scan_capacity_warnings
    );
    println!(
        "snapshots: loads={} missing={} saves={} skipped={}",
        m.snapshot_loads, m.snapshot_missing, m.snapshot_saves, m.snapshot_skipped
    );
    println!(
        "ddl: creates={} drops={}; prepared: built={} hits={} (ratio {:.2}); executions={}",
        m.ddl_creates,
        m.ddl_drops,
        m.prepared_built,
        m.prepared_cache_hits,
        m.prepared_hit_ratio(),
        m.session_executions
    );
    Ok(())
}
