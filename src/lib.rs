#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod error;
pub mod metrics;
pub mod config;

// Модель и идентификаторы
pub mod id;
pub mod model;
pub mod codec;

// Коллабораторы: сессия к хранилищу, реестр типов, версии
pub mod session;  // src/session/{mod,cache,table,memory,file}.rs
pub mod registry;
pub mod version;  // src/version/{mod,registry}.rs
pub mod provider;

// Ядро: DDL, журнал коммитов, снапшоты, сборка потока
pub mod schema;
pub mod commits;
pub mod snapshots; // src/snapshots/{mod,store,strategy}.rs
pub mod stream;
pub mod store;

// Удобные реэкспорты
pub use codec::{JsonSerializer, Serializer};
pub use commits::CommitStore;
pub use config::ProjConfig;
pub use error::StoreError;
pub use id::ProjectionId;
pub use model::{EventOrigin, ProjectionCommit, Snapshot, SnapshotState};
pub use provider::SessionProvider;
pub use registry::{ProjectionRegistry, ProjectionType};
pub use schema::SchemaManager;
pub use session::{FileSession, MemorySession, Session};
pub use snapshots::{DefaultSnapshotStrategy, NoSnapshotStrategy, SnapshotStore, SnapshotStrategy};
pub use store::{ProjectionStore, StoreBuilder};
pub use stream::ProjectionStream;
pub use version::{
    ProjectionStatus, ProjectionVersion, ProjectionVersions, VersionRegistry, VersionResolver,
};
