//! Snapshots module split into submodules:
//! - store.rs: SnapshotStore (load/save последнего состояния, фильтр opt-in типов).
//! - strategy.rs: SnapshotStrategy (когда пора делать новый снапшот).
//!
//! Таблицы снапшотов живут в отдельном неймспейсе: суффикс `_sp` к имени контракта.

mod store;
mod strategy;

pub use store::SnapshotStore;
pub use strategy::{DefaultSnapshotStrategy, NoSnapshotStrategy, SnapshotStrategy};
