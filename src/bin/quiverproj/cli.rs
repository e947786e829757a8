use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI для журнала коммитов и снапшотов проекций (файловый бэкенд)
#[derive(Parser, Debug)]
#[command(name = "quiverproj", version, about = "QuiverProj CLI")]
pub struct Cli {
    /// Root directory (default: QP_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    /// Keyspace under root (default: QP_KEYSPACE or "projections")
    #[arg(long, global = true)]
    pub keyspace: Option<String>,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List versions of a contract (bootstraps v1 as live)
    Versions {
        #[arg(long)]
        contract: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Start a new building generation (max+1)
    Build {
        #[arg(long)]
        contract: String,
    },
    /// Make a version live; the previous live one is retired
    Promote {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        version: i32,
    },
    /// Cancel a building version
    Cancel {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        version: i32,
    },
    /// Drop commit and snapshot tables of a non-live version
    Drop {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        version: i32,
    },
    /// Append one commit
    Append {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        id: String,
        /// Id kind: string | guid | blob (blob value is base64)
        #[arg(long, default_value = "string")]
        id_kind: String,
        #[arg(long)]
        marker: i32,
        #[arg(long)]
        aggregate: String,
        #[arg(long)]
        revision: i32,
        #[arg(long, default_value_t = 0)]
        position: i32,
        /// Payload: literal string, @file or '-' for stdin
        #[arg(long)]
        data: String,
        /// Target version (default: live, or newest building with --replay)
        #[arg(long)]
        version: Option<i32>,
        #[arg(long, default_value_t = false)]
        replay: bool,
    },
    /// Load snapshot + newer commits
    Load {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "string")]
        id_kind: String,
        #[arg(long, default_value_t = false)]
        replay: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the latest snapshot
    SnapshotGet {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "string")]
        id_kind: String,
    },
    /// Store a snapshot (state is a JSON document)
    SnapshotPut {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "string")]
        id_kind: String,
        #[arg(long)]
        revision: i32,
        #[arg(long)]
        state: String,
    },
    /// Open all known contracts and print process metrics
    Metrics {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
