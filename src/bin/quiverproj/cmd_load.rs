use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use super::util::{display_text, open_ctx, open_store, parse_id};

pub fn exec(
    root: Option<PathBuf>,
    keyspace: Option<String>,
    contract: String,
    id: String,
    id_kind: String,
    replay: bool,
    json: bool,
) -> Result<()> {
    let ctx = open_ctx(root, keyspace)?;
    let store = open_store(&ctx, std::slice::from_ref(&contract))?;
    let id = parse_id(&id_kind, &id)?;
    let stream = store.load_latest(&contract, &id, replay)?;

    if json {
        let commits: Vec<_> = stream
            .commits()
            .iter()
            .map(|c| {
                json!({
                    "sm": c.snapshot_marker,
                    "evarid": c.event_origin.aggregate_root_id,
                    "evarrev": c.event_origin.aggregate_revision,
                    "evarpos": c.event_origin.aggregate_event_position,
                    "evarts": c.event_origin.timestamp,
                    "data": display_text(&c.data),
                })
            })
            .collect();
        println!(
            "{}",
            json!({
                "id": id.to_string(),
                "snapshot_revision": stream.snapshot().revision(),
                "latest_marker": stream.latest_marker(),
                "commits": commits,
            })
        );
        return Ok(());
    }

    match stream.snapshot().state() {
        Some(state) => println!("snapshot rev={} state={}", stream.snapshot().revision(), state),
        None => println!("snapshot: (missing)"),
    }
    if stream.is_empty() {
        println!("(no commits)");
    }
    for c in stream.commits() {
        println!(
            "sm={} evarid={} rev={} pos={} ts={} -> '{}' ({} B)",
            c.snapshot_marker,
            c.event_origin.aggregate_root_id,
            c.event_origin.aggregate_revision,
            c.event_origin.aggregate_event_position,
            c.event_origin.timestamp,
            display_text(&c.data),
            c.data.len()
        );
    }
    Ok(())
}
