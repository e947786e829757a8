//! Реестр типов проекций (коллаборатор): какие проекции существуют, какие
//! события они обрабатывают и какие включили снапшоты.
//!
//! Под инициализацию таблиц попадают только "годные" типы: это определение
//! проекции И обрабатывает хотя бы один тип события.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionType {
    pub contract_id: String,
    /// Тип является определением проекции (а не вспомогательным обработчиком).
    pub is_definition: bool,
    pub handled_events: Vec<String>,
}

impl ProjectionType {
    pub fn new<S: Into<String>>(contract_id: S) -> Self {
        Self {
            contract_id: contract_id.into(),
            is_definition: true,
            handled_events: Vec::new(),
        }
    }

    pub fn handles<S: Into<String>>(mut self, event: S) -> Self {
        self.handled_events.push(event.into());
        self
    }

    pub fn not_definition(mut self) -> Self {
        self.is_definition = false;
        self
    }

    #[inline]
    pub fn is_eligible(&self) -> bool {
        self.is_definition && !self.handled_events.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProjectionRegistry {
    types: BTreeMap<String, ProjectionType>,
    snapshots: BTreeSet<String>,
}

impl ProjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, t: ProjectionType) -> Self {
        self.types.insert(t.contract_id.clone(), t);
        self
    }

    /// Включить снапшоты для перечисленных контрактов.
    pub fn use_snapshots<I, S>(mut self, contracts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.snapshots.extend(contracts.into_iter().map(Into::into));
        self
    }

    pub fn get(&self, contract_id: &str) -> Option<&ProjectionType> {
        self.types.get(contract_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn eligible(&self) -> impl Iterator<Item = &ProjectionType> {
        self.types.values().filter(|t| t.is_eligible())
    }

    #[inline]
    pub fn is_snapshot_enabled(&self, contract_id: &str) -> bool {
        self.snapshots.contains(contract_id)
    }

    /// Контракты со включёнными снапшотами (как заданы, без фильтра годности).
    pub fn snapshot_contracts(&self) -> impl Iterator<Item = &str> {
        self.snapshots.iter().map(|s| s.as_str())
    }

    /// Годные типы, которые ещё и включили снапшоты (им нужна таблица `_sp`).
    pub fn snapshot_eligible(&self) -> impl Iterator<Item = &ProjectionType> {
        self.eligible()
            .filter(move |t| self.snapshots.contains(&t.contract_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_requires_definition_and_handler() {
        let reg = ProjectionRegistry::new()
            .register(ProjectionType::new("a").handles("OrderPlaced"))
            .register(ProjectionType::new("b"))
            .register(ProjectionType::new("c").handles("OrderPlaced").not_definition())
            .use_snapshots(["a", "b"]);

        let eligible: Vec<&str> = reg.eligible().map(|t| t.contract_id.as_str()).collect();
        assert_eq!(eligible, vec!["a"]);

        let snap: Vec<&str> = reg.snapshot_eligible().map(|t| t.contract_id.as_str()).collect();
        assert_eq!(snap, vec!["a"]);
        assert!(reg.is_snapshot_enabled("b"));
        assert!(!reg.is_snapshot_enabled("c"));
    }
}
