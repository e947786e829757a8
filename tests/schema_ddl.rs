use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::thread;

use QuiverProj::session::{Prepared, Row, Statement, TableSchema, Value};
use QuiverProj::{MemorySession, SchemaManager, Session};

type Hook = Box<dyn FnOnce() -> Result<()> + Send>;

/// Сессия, которая один раз выполняет hook сразу после CREATE TABLE
/// (пока create-мьютекс ещё удерживается).
struct AfterCreate {
    inner: Arc<MemorySession>,
    hook: Mutex<Option<Hook>>,
}

impl Session for AfterCreate {
    fn prepare(&self, cql: &str, statement: Statement) -> Result<Prepared> {
        self.inner.prepare(cql, statement)
    }

    fn execute(&self, prepared: &Prepared, params: &[Value]) -> Result<Vec<Row>> {
        let rows = self.inner.execute(prepared, params)?;
        if let Statement::CreateTable(_) = prepared.statement() {
            let hook = self.hook.lock().map_err(|_| anyhow::anyhow!("hook lock poisoned"))?.take();
            if let Some(hook) = hook {
                hook()?;
            }
        }
        Ok(rows)
    }
}

#[test]
fn concurrent_creates_are_serialized_and_idempotent() -> Result<()> {
    let session = Arc::new(MemorySession::new());
    let schema = Arc::new(SchemaManager::new(session.clone()));

    let mut handles = Vec::new();
    for t in 0..8 {
        let schema = schema.clone();
        handles.push(thread::spawn(move || -> Result<()> {
            for i in 0..4 {
                // половина потоков бьёт в одни и те же таблицы
                let name = format!("orders_{}", (t % 2) * 10 + i);
                schema.create(&TableSchema::commits(&name))?;
                schema.create(&TableSchema::snapshots(&format!("orders_sp_{}", i)))?;
            }
            Ok(())
        }));
    }
    for h in handles {
        h.join().map_err(|_| anyhow::anyhow!("ddl thread panicked"))??;
    }

    let names = session.table_names();
    assert_eq!(names.len(), 12, "8 commit tables + 4 snapshot tables: {:?}", names);
    for i in 0..4 {
        assert!(session.has_table(&format!("orders_{}", i)));
        assert!(session.has_table(&format!("orders_{}", 10 + i)));
        assert!(session.has_table(&format!("orders_sp_{}", i)));
    }
    Ok(())
}

#[test]
fn drop_is_idempotent() -> Result<()> {
    let session = Arc::new(MemorySession::new());
    let schema = SchemaManager::new(session.clone());

    schema.create(&TableSchema::commits("orders_1"))?;
    assert!(session.has_table("orders_1"));

    schema.drop_table("orders_1")?;
    schema.drop_table("orders_1")?;
    schema.drop_table("never_created_1")?;
    assert!(!session.has_table("orders_1"));

    // после drop таблицу можно создать заново
    schema.create(&TableSchema::commits("orders_1"))?;
    assert!(session.has_table("orders_1"));
    Ok(())
}

#[test]
fn drop_racing_a_create_does_not_leave_table_marked_known() -> Result<()> {
    let inner = Arc::new(MemorySession::new());
    let session = Arc::new(AfterCreate {
        inner: inner.clone(),
        hook: Mutex::new(None),
    });
    let schema = Arc::new(SchemaManager::new(session.clone()));

    // DROP проходит между выполнением CREATE и возвратом из create()
    let dropper = schema.clone();
    *session.hook.lock().map_err(|_| anyhow::anyhow!("hook lock poisoned"))? =
        Some(Box::new(move || dropper.drop_table("orders_2")));

    schema.create(&TableSchema::commits("orders_2"))?;
    assert!(!inner.has_table("orders_2"), "drop ran after the create");

    // ensure не должен считать таблицу созданной
    schema.ensure(&TableSchema::commits("orders_2"))?;
    assert!(inner.has_table("orders_2"));
    Ok(())
}

#[test]
fn ensure_skips_ddl_for_known_tables() -> Result<()> {
    let session = Arc::new(MemorySession::new());
    let schema = SchemaManager::new(session.clone());

    schema.ensure(&TableSchema::commits("orders_1"))?;
    let after_first = session.executions();
    schema.ensure(&TableSchema::commits("orders_1"))?;
    assert_eq!(session.executions(), after_first);

    schema.drop_table("orders_1")?;
    schema.ensure(&TableSchema::commits("orders_1"))?;
    assert!(session.has_table("orders_1"));
    Ok(())
}
