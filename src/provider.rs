//! SessionProvider - кэш хэндла сессии, привязанный к "эпохе" конфигурации.
//!
//! reconfigure(cfg) заменяет конфигурацию и увеличивает эпоху; следующий
//! session() видит, что кэш построен в старой эпохе, и пересоздаёт хэндл.
//! Уже выданные Arc<dyn Session> продолжают жить у своих владельцев.

use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::config::ProjConfig;
use crate::session::{FileSession, MemorySession, Session};

pub type SessionFactory = Box<dyn Fn(&ProjConfig) -> Result<Arc<dyn Session>> + Send + Sync>;

pub struct SessionProvider {
    config: RwLock<ProjConfig>,
    epoch: AtomicU64,
    cached: Mutex<Option<(u64, Arc<dyn Session>)>>,
    factory: SessionFactory,
}

impl SessionProvider {
    pub fn new(config: ProjConfig, factory: SessionFactory) -> Self {
        Self {
            config: RwLock::new(config),
            epoch: AtomicU64::new(0),
            cached: Mutex::new(None),
            factory,
        }
    }

    /// root задан => FileSession, иначе MemorySession.
    pub fn from_config(config: ProjConfig) -> Self {
        Self::new(config, Box::new(open_session))
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn config(&self) -> ProjConfig {
        match self.config.read() {
            Ok(g) => g.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }

    /// Новая конфигурация; закэшированный хэндл отпускается сразу
    /// (FileSession держит lock на keyspace).
    pub fn reconfigure(&self, config: ProjConfig) -> Result<u64> {
        let epoch = {
            let mut g = self
                .config
                .write()
                .map_err(|_| anyhow!("provider config lock poisoned"))?;
            *g = config;
            self.epoch.fetch_add(1, Ordering::AcqRel) + 1
        };
        self.cached
            .lock()
            .map_err(|_| anyhow!("provider cache lock poisoned"))?
            .take();
        info!("provider: configuration epoch {}", epoch);
        Ok(epoch)
    }

    pub fn session(&self) -> Result<Arc<dyn Session>> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow!("provider cache lock poisoned"))?;

        // эпоха и конфигурация читаются согласованно под одним локом
        let (epoch, config) = {
            let g = self
                .config
                .read()
                .map_err(|_| anyhow!("provider config lock poisoned"))?;
            (self.epoch.load(Ordering::Acquire), g.clone())
        };

        if let Some((e, s)) = cached.as_ref() {
            if *e == epoch {
                return Ok(s.clone());
            }
        }
        *cached = None;

        let session = (self.factory)(&config)?;
        *cached = Some((epoch, session.clone()));
        Ok(session)
    }
}

fn open_session(cfg: &ProjConfig) -> Result<Arc<dyn Session>> {
    match cfg.root.as_deref() {
        Some(root) => Ok(Arc::new(FileSession::open(
            Path::new(root),
            &cfg.keyspace,
            cfg.data_fsync,
        )?)),
        None => Ok(Arc::new(MemorySession::new())),
    }
}
