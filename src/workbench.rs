//! The workbench: opens working copies, validates and commits them
//!
//! A [`Workbench`] ties together the registry, the schema catalog, the
//! validation engine, edit locks, the event bus, an optional persistence
//! store and per-category migrations. All methods take `&self`; a workbench
//! can be shared across threads behind an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::commit::DeferredWrite;
use crate::config::WorkbenchConfig;
use crate::definition::Definition;
use crate::error::{Result, WorkbenchError};
use crate::events::{EventBus, Subscription};
use crate::id::StableId;
use crate::lock::LockTable;
use crate::migration::{MigrationHooks, SchemaMigration};
use crate::persistence::{DefinitionStore, StoreError};
use crate::registry::DefinitionRegistry;
use crate::schema::{CategorySchema, SchemaCatalog};
use crate::validation::{Diagnostic, ValidationEngine};
use crate::version::VersionCheck;
use crate::working_copy::{SessionState, WorkingCopy};

/// Editing front end over a definition registry
pub struct Workbench {
    pub(crate) registry: Arc<DefinitionRegistry>,
    pub(crate) catalog: Arc<SchemaCatalog>,
    pub(crate) engine: ValidationEngine,
    pub(crate) locks: Arc<LockTable>,
    pub(crate) events: EventBus,
    pub(crate) store: Option<Arc<dyn DefinitionStore>>,
    pub(crate) migrations: MigrationHooks,
    pub(crate) deferred: Mutex<BTreeMap<StableId, DeferredWrite>>,
    /// One gate per id; store writes for an id run one at a time
    pub(crate) write_gates: Mutex<HashMap<StableId, Arc<Mutex<()>>>>,
    pub(crate) config: WorkbenchConfig,
}

impl std::fmt::Debug for Workbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("definitions", &self.registry.len())
            .field("categories", &self.catalog.categories())
            .field("migrations", &self.migrations)
            .field("persistent", &self.store.is_some())
            .field("pending_writes", &self.deferred.lock().len())
            .finish()
    }
}

impl Workbench {
    /// Create a workbench with default configuration and no store
    pub fn new(registry: Arc<DefinitionRegistry>, catalog: Arc<SchemaCatalog>) -> Self {
        Self::with_config(registry, catalog, WorkbenchConfig::default())
    }

    pub fn with_config(registry: Arc<DefinitionRegistry>, catalog: Arc<SchemaCatalog>, config: WorkbenchConfig) -> Self {
        Self {
            registry,
            catalog,
            engine: ValidationEngine::new(&config.validation),
            locks: LockTable::new(),
            events: EventBus::new(config.events.channel_capacity),
            store: None,
            migrations: MigrationHooks::new(),
            deferred: Mutex::new(BTreeMap::new()),
            write_gates: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Persist commits through `store`
    pub fn with_store(mut self, store: Arc<dyn DefinitionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register the migration for definitions of `category`
    pub fn with_migration(mut self, category: impl Into<String>, hook: impl SchemaMigration + 'static) -> Self {
        self.migrations.register(category, hook);
        self
    }

    /// Replace the validation engine, e.g. to add custom validators
    pub fn with_engine(mut self, engine: ValidationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    /// Subscribe to committed changes
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Whether a working copy currently holds the id's edit lock
    pub fn is_open(&self, id: &StableId) -> bool {
        self.locks.is_held(id)
    }

    // =========================================================================
    // Working copies
    // =========================================================================

    /// Open an existing definition for editing
    ///
    /// Definitions authored against an older schema version are migrated
    /// first; the copy starts from the migrated content.
    pub fn open(&self, id: &StableId) -> Result<WorkingCopy> {
        let base = self.registry.resolve(id)?;
        let schema = self.catalog.get(base.category())?;
        let lock = self.locks.try_acquire(id)?;

        let migrated = self.bring_current(&base, &schema)?;
        let (fields, migrated_from) = match migrated {
            Some(current) => (current.fields, Some(base.schema_version.clone())),
            None => (base.fields.clone(), None),
        };

        let wc = WorkingCopy::existing(base, fields, migrated_from, schema, &self.config.history, lock);
        info!(id = %id, session = %wc.session(), "working copy opened");
        Ok(wc)
    }

    /// Start a new definition of `category` from the schema's defaults
    pub fn open_new(&self, category: &str) -> Result<WorkingCopy> {
        let schema = self.catalog.get(category)?;
        let wc = WorkingCopy::blank(schema, &self.config.history);
        info!(category, session = %wc.session(), "blank working copy opened");
        Ok(wc)
    }

    /// Abandon a working copy; safe to call more than once
    pub fn discard(&self, wc: &mut WorkingCopy) {
        if !wc.is_open() {
            return;
        }
        wc.close(SessionState::Discarded);
        info!(session = %wc.session(), id = ?wc.id().map(|id| id.to_string()), "working copy discarded");
    }

    /// Validate the copy's current content
    pub fn validate(&self, wc: &WorkingCopy) -> Vec<Diagnostic> {
        self.engine
            .validate(wc.schema(), wc.fields(), self.registry.as_ref())
    }

    /// Validate, reusing the copy's last result while neither the copy nor
    /// the registry has changed
    pub fn diagnostics<'a>(&self, wc: &'a mut WorkingCopy) -> &'a [Diagnostic] {
        let generation = self.registry.generation();
        if wc.cached_diagnostics(generation).is_none() {
            let diagnostics = self.validate(wc);
            debug!(session = %wc.session(), count = diagnostics.len(), "diagnostics recomputed");
            wc.cache_diagnostics(generation, diagnostics);
        }
        wc.cached_diagnostics(generation).unwrap_or_default()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load one definition from the store into the registry
    pub fn load(&self, id: &StableId) -> Result<Arc<Definition>> {
        let store = self.store.as_ref().ok_or_else(|| WorkbenchError::NotFound(id.clone()))?;
        let stored = store.load(id).map_err(|e| match e {
            StoreError::NotFound(id) => WorkbenchError::NotFound(id),
            other => WorkbenchError::Store(other),
        })?;

        let schema = self.catalog.get(stored.category())?;
        let definition = match self.bring_current(&stored, &schema)? {
            Some(migrated) => migrated,
            None => stored,
        };

        let registered = self.registry.register(definition)?;
        debug!(id = %id, revision = registered.revision, "definition loaded");
        Ok(registered)
    }

    /// Load every stored definition not yet in the registry
    ///
    /// Returns the number loaded. Stops at the first failure.
    pub fn load_all(&self) -> Result<usize> {
        let Some(store) = self.store.as_ref() else {
            return Ok(0);
        };

        let mut loaded = 0;
        for id in store.list()? {
            if self.registry.contains(&id) {
                continue;
            }
            self.load(&id)?;
            loaded += 1;
        }
        info!(loaded, "definitions loaded from store");
        Ok(loaded)
    }

    /// Migrate a definition to the catalog's schema version if needed
    ///
    /// `Ok(None)` means it is already current.
    fn bring_current(&self, definition: &Definition, schema: &CategorySchema) -> Result<Option<Definition>> {
        let from = &definition.schema_version;
        let to = &schema.version;

        match to.check(from) {
            VersionCheck::Current => Ok(None),
            VersionCheck::Newer => Err(WorkbenchError::SchemaIncompatible {
                id: definition.id.clone(),
                found: from.clone(),
                expected: to.clone(),
                reason: "definition is newer than the catalog schema".into(),
            }),
            VersionCheck::Stale => {
                let hook = self.migrations.get(definition.category()).ok_or_else(|| {
                    WorkbenchError::SchemaIncompatible {
                        id: definition.id.clone(),
                        found: from.clone(),
                        expected: to.clone(),
                        reason: format!("no migration registered for '{}'", definition.category()),
                    }
                })?;

                let unmigratable = |reason: String| WorkbenchError::Unmigratable {
                    id: definition.id.clone(),
                    from: from.clone(),
                    to: to.clone(),
                    reason,
                };

                let mut migrated = hook
                    .migrate(definition.clone(), from, to)
                    .map_err(|e| unmigratable(e.reason))?;
                if migrated.id != definition.id {
                    return Err(unmigratable(format!("migration changed the id to {}", migrated.id)));
                }
                migrated.schema_version = to.clone();

                warn!(id = %definition.id, from = %from, to = %to, "definition migrated");
                Ok(Some(migrated))
            }
        }
    }
}
