//! ProjectionStream - снапшот + коммиты новее него. Не хранится, собирается на каждое чтение.

use anyhow::Result;
use serde_json::Value as Json;

use crate::id::ProjectionId;
use crate::model::{ProjectionCommit, Snapshot};

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionStream {
    projection_id: ProjectionId,
    commits: Vec<ProjectionCommit>,
    snapshot: Snapshot,
}

impl ProjectionStream {
    /// Чистая композиция без I/O. Порядок коммитов - порядок скана; не пересортировываем.
    /// Id потока - тот, по которому грузили, а не id снапшота.
    pub fn assemble(projection_id: ProjectionId, snapshot: Snapshot, commits: Vec<ProjectionCommit>) -> Self {
        Self {
            projection_id,
            commits,
            snapshot,
        }
    }

    pub fn projection_id(&self) -> &ProjectionId {
        &self.projection_id
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn commits(&self) -> &[ProjectionCommit] {
        &self.commits
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Старший маркер, до которого доходит поток (ревизия снапшота, если коммитов нет).
    pub fn latest_marker(&self) -> i32 {
        self.commits
            .iter()
            .map(|c| c.snapshot_marker)
            .fold(self.snapshot.revision(), i32::max)
    }

    /// Проиграть коммиты поверх состояния, построенного из снапшота.
    /// `seed` получает None для Missing.
    pub fn fold<S, I, F>(&self, seed: I, mut apply: F) -> Result<S>
    where
        I: FnOnce(Option<&Json>) -> Result<S>,
        F: FnMut(S, &ProjectionCommit) -> Result<S>,
    {
        let mut state = seed(self.snapshot.state())?;
        for c in &self.commits {
            state = apply(state, c)?;
        }
        Ok(state)
    }

    pub fn into_parts(self) -> (Snapshot, Vec<ProjectionCommit>) {
        (self.snapshot, self.commits)
    }
}
