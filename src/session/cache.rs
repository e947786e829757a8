//! Кэш подготовленных выражений по location.
//!
//! get-or-create без глобального лока на построение: при гонке два потока могут
//! оба вызвать prepare, в кэш попадёт первая вставка, лишняя копия выбрасывается.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::Prepared;
use crate::metrics::{record_prepared_built, record_prepared_hit};

#[derive(Default)]
pub(crate) struct StatementCache {
    map: RwLock<HashMap<String, Arc<Prepared>>>,
}

impl StatementCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get_or_prepare<F>(&self, key: &str, build: F) -> Result<Arc<Prepared>>
    where
        F: FnOnce() -> Result<Prepared>,
    {
        {
            let guard = self.map.read().unwrap_or_else(|p| p.into_inner());
            if let Some(p) = guard.get(key) {
                record_prepared_hit();
                return Ok(Arc::clone(p));
            }
        }

        // Строим вне лока: prepare может уйти в сеть.
        let built = Arc::new(build()?);
        record_prepared_built();

        let mut guard = self.map.write().unwrap_or_else(|p| p.into_inner());
        let entry = guard.entry(key.to_string()).or_insert(built);
        Ok(Arc::clone(entry))
    }

    pub(crate) fn invalidate(&self, key: &str) {
        let mut guard = self.map.write().unwrap_or_else(|p| p.into_inner());
        guard.remove(key);
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.map.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Statement;

    fn prepared(id: u64) -> Prepared {
        Prepared::new(id, "DROP TABLE IF EXISTS \"t\";".into(), Statement::DropTable { table: "t".into() })
    }

    #[test]
    fn first_build_wins_and_is_reused() {
        let cache = StatementCache::new();
        let a = cache.get_or_prepare("t", || Ok(prepared(1))).unwrap();
        let b = cache
            .get_or_prepare("t", || -> Result<Prepared> { panic!("must hit the cache") })
            .unwrap();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache = StatementCache::new();
        assert!(cache
            .get_or_prepare("t", || Err(anyhow::anyhow!("unconfigured table")))
            .is_err());
        assert_eq!(cache.len(), 0);
        let p = cache.get_or_prepare("t", || Ok(prepared(7))).unwrap();
        assert_eq!(p.id(), 7);
    }
}
