//! Databases: backend connection, table registry and teardown cascade.

use crate::readiness::{ReadyState, Readiness};
use crate::{ReadyTable, Table};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tabula_core::{HandleKind, Schema, TabulaConfig, TabulaResult};
use tabula_events::{DatabaseEvent, DatabaseEventKind, EventEmitter, ListenerId, Subscription};
use tabula_storage::Backend;

/// State every table of a database shares.
pub(crate) struct DatabaseShared {
    pub(crate) name: String,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) config: TabulaConfig,
    readiness: Readiness,
    events: EventEmitter<DatabaseEvent>,
}

impl DatabaseShared {
    /// Connect the backend once; every caller sees the same outcome.
    pub(crate) async fn ready(&self) -> TabulaResult<()> {
        self.readiness
            .wait_with(|| async {
                self.backend.connect(&self.name).await?;
                tracing::debug!(database = %self.name, "Database ready");
                self.events.emit(&DatabaseEvent::Ready);
                Ok(())
            })
            .await
    }
}

#[derive(Default)]
struct TableRegistry {
    tables: HashMap<String, Table>,
    /// Every name ever requested, in first-request order.
    names: Vec<String>,
}

/// A named database bound to a backend.
///
/// Owns its tables: disconnecting or deleting the database tears every table
/// down with it. Clones share state.
#[derive(Clone)]
pub struct Database {
    shared: Arc<DatabaseShared>,
    registry: Arc<Mutex<TableRegistry>>,
}

impl Database {
    /// Open a database with the default configuration.
    ///
    /// Eager init starts connecting right away on the current runtime, so a
    /// `Ready` listener attached afterwards may come too late. Check
    /// [`Database::state`] or open with `eager_init` off to observe it.
    pub fn new<B>(name: impl Into<String>, backend: B) -> Self
    where
        B: Backend + 'static,
    {
        Self::build(name.into(), Arc::new(backend), TabulaConfig::default())
    }

    /// Open a database after validating `config`.
    pub fn with_config<B>(
        name: impl Into<String>,
        backend: B,
        config: TabulaConfig,
    ) -> TabulaResult<Self>
    where
        B: Backend + 'static,
    {
        config.validate()?;
        Ok(Self::build(name.into(), Arc::new(backend), config))
    }

    fn build(name: String, backend: Arc<dyn Backend>, config: TabulaConfig) -> Self {
        let database = Self {
            shared: Arc::new(DatabaseShared {
                readiness: Readiness::new(HandleKind::Database, name.clone()),
                name,
                backend,
                config,
                events: EventEmitter::new(),
            }),
            registry: Arc::new(Mutex::new(TableRegistry::default())),
        };
        database.start();
        database
    }

    fn start(&self) {
        if !self.shared.config.eager_init {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.shared);
            handle.spawn(async move {
                if let Err(e) = shared.ready().await {
                    tracing::warn!(database = %shared.name, error = %e, "Database connection failed");
                }
            });
        }
    }

    fn registry(&self) -> MutexGuard<'_, TableRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &TabulaConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ReadyState {
        self.shared.readiness.state()
    }

    /// Wait until the backend is connected.
    pub async fn ready(&self) -> TabulaResult<()> {
        self.shared.ready().await
    }

    // ========================================================================
    // TABLES
    // ========================================================================

    /// Table handle that resolves once the backend has created the table.
    ///
    /// Returns immediately. A live handle registered under `name` is reused,
    /// and `schema` is then ignored.
    pub fn table(&self, name: impl Into<String>, schema: Schema) -> ReadyTable {
        let name = name.into();
        let mut registry = self.registry();
        if !registry.names.contains(&name) {
            registry.names.push(name.clone());
        }
        if let Some(existing) = registry.tables.get(&name) {
            if existing.state() != ReadyState::Disconnected {
                return ReadyTable::new(existing.clone());
            }
        }

        let table = Table::new(name.clone(), schema, Arc::clone(&self.shared));
        registry.tables.insert(name, table.clone());
        drop(registry);

        table.start();
        ReadyTable::new(table)
    }

    /// Create (or reuse) a table and wait until it is ready.
    pub async fn for_table(
        &self,
        name: impl Into<String>,
        schema: Schema,
    ) -> TabulaResult<Table> {
        self.table(name, schema).await
    }

    pub fn get_table(&self, name: &str) -> Option<Table> {
        self.registry().tables.get(name).cloned()
    }

    /// Names of every table ever requested, without duplicates.
    pub fn tables_names(&self) -> Vec<String> {
        self.registry().names.clone()
    }

    /// Drop a table from the backend and disconnect its handle.
    ///
    /// A registered table that was never created is only disconnected.
    pub async fn delete_table(&self, name: &str) -> TabulaResult<()> {
        self.ready().await?;
        self.drop_table(name).await
    }

    /// Remove one table: its stored copy first, then its handle. A backend
    /// failure leaves the handle registered so the call can be retried.
    async fn drop_table(&self, name: &str) -> TabulaResult<()> {
        let registered = self.get_table(name);
        if registered.as_ref().map_or(true, Table::is_created) {
            self.shared.backend.delete_table(name).await?;
        }

        let removed = self.registry().tables.remove(name);
        if let Some(table) = removed {
            // Already disconnected on its own is fine.
            let _ = table.disconnect();
        }
        tracing::debug!(database = %self.shared.name, table = %name, "Table deleted");
        self.shared
            .events
            .emit(&DatabaseEvent::DeleteTable(name.to_string()));
        Ok(())
    }

    // ========================================================================
    // TEARDOWN
    // ========================================================================

    /// Disconnect and unregister every table.
    fn disconnect_tables(&self) -> usize {
        let tables: Vec<Table> = self.registry().tables.drain().map(|(_, t)| t).collect();
        for table in &tables {
            let _ = table.disconnect();
        }
        tables.len()
    }

    /// Registered tables in first-request order.
    fn registered_names(&self) -> Vec<String> {
        let registry = self.registry();
        registry
            .names
            .iter()
            .filter(|name| registry.tables.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Disconnect the backend, then every table. A second call fails with
    /// `Disconnected`.
    ///
    /// If the backend fails the database and its tables stay usable.
    pub async fn disconnect(&self) -> TabulaResult<()> {
        self.shared.readiness.check()?;
        self.shared.backend.disconnect().await?;
        self.shared.readiness.disconnect()?;
        let tables = self.disconnect_tables();

        tracing::debug!(database = %self.shared.name, tables, "Database disconnected");
        self.shared.events.emit(&DatabaseEvent::Disconnect);
        Ok(())
    }

    /// Delete every table in first-request order, then the database itself.
    ///
    /// Stops at the first backend failure. Tables already dropped stay
    /// dropped and a retry picks up the rest.
    pub async fn delete_database(&self) -> TabulaResult<()> {
        self.ready().await?;

        let names = self.registered_names();
        for name in &names {
            self.drop_table(name).await?;
        }
        self.shared.backend.delete_database().await?;
        self.shared.readiness.disconnect()?;
        // Tables registered while the cascade ran.
        self.disconnect_tables();

        tracing::debug!(database = %self.shared.name, tables = names.len(), "Database deleted");
        self.shared.events.emit(&DatabaseEvent::Delete);
        Ok(())
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    /// Listen for `kind`. Past events are not replayed.
    pub fn on<F>(&self, kind: DatabaseEventKind, listener: F) -> Subscription
    where
        F: Fn(&DatabaseEvent) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, listener)
    }

    pub fn once<F>(&self, kind: DatabaseEventKind, listener: F) -> Subscription
    where
        F: Fn(&DatabaseEvent) + Send + Sync + 'static,
    {
        self.shared.events.once(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.events.off(id)
    }

    pub fn listener_count(&self, kind: DatabaseEventKind) -> usize {
        self.shared.events.listener_count(kind)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("tables", &self.tables_names())
            .finish()
    }
}
