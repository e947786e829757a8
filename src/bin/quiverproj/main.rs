use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_versions;
mod cmd_append;
mod cmd_load;
mod cmd_snapshot;
mod cmd_metrics;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт - info.
    // Пример: RUST_LOG=debug ./quiverproj ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli::Cli { root, keyspace, cmd } = cli::Cli::parse();
    match cmd {
        cli::Cmd::Versions { contract, json } =>
            cmd_versions::exec_list(root, keyspace, contract, json),

        cli::Cmd::Build { contract } =>
            cmd_versions::exec_build(root, keyspace, contract),

        cli::Cmd::Promote { contract, version } =>
            cmd_versions::exec_promote(root, keyspace, contract, version),

        cli::Cmd::Cancel { contract, version } =>
            cmd_versions::exec_cancel(root, keyspace, contract, version),

        cli::Cmd::Drop { contract, version } =>
            cmd_versions::exec_drop(root, keyspace, contract, version),

        cli::Cmd::Append { contract, id, id_kind, marker, aggregate, revision, position, data, version, replay } =>
            cmd_append::exec(
                root,
                keyspace,
                cmd_append::AppendArgs {
                    contract,
                    id,
                    id_kind,
                    marker,
                    aggregate,
                    revision,
                    position,
                    data,
                    version,
                    replay,
                },
            ),

        cli::Cmd::Load { contract, id, id_kind, replay, json } =>
            cmd_load::exec(root, keyspace, contract, id, id_kind, replay, json),

        cli::Cmd::SnapshotGet { contract, id, id_kind } =>
            cmd_snapshot::exec_get(root, keyspace, contract, id, id_kind),

        cli::Cmd::SnapshotPut { contract, id, id_kind, revision, state } =>
            cmd_snapshot::exec_put(root, keyspace, contract, id, id_kind, revision, state),

        cli::Cmd::Metrics { json } =>
            cmd_metrics::exec(root, keyspace, json),
    }
}
