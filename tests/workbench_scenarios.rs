//! End-to-end workbench scenarios
//!
//! Open, edit, undo, validate and commit definitions against the fixture
//! schemas in `tests/fixtures/schemas`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use definition_workbench::{
    CategorySchema, ChangeKind, Definition, DefinitionRegistry, DefinitionStore, DiagnosticCode, FieldEdit,
    FieldPath, FieldValue, FillNewFields, JsonDirectoryStore, MemoryStore, SchemaCatalog, SchemaVersion,
    SessionState, StableId, StoreError, Unmigratable, Workbench, WorkbenchError,
};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn schema(json: &str) -> CategorySchema {
    serde_json::from_str(json).unwrap()
}

fn catalog() -> Arc<SchemaCatalog> {
    Arc::new(
        SchemaCatalog::from_schemas([
            schema(include_str!("fixtures/schemas/weapon.json")),
            schema(include_str!("fixtures/schemas/ammo.json")),
        ])
        .unwrap(),
    )
}

fn workbench() -> Workbench {
    Workbench::new(Arc::new(DefinitionRegistry::new()), catalog())
}

fn revolver_v1() -> Definition {
    serde_json::from_str(include_str!("fixtures/definitions/weapon_revolver.json")).unwrap()
}

fn path(p: &str) -> FieldPath {
    FieldPath::parse(p).unwrap()
}

fn id(s: &str) -> StableId {
    StableId::parse(s).unwrap()
}

/// Commit a new definition with the given edits applied
fn create(wb: &Workbench, category: &str, name: &str, edits: Vec<FieldEdit>) -> StableId {
    let mut wc = wb.open_new(category).unwrap();
    wc.set_name(name).unwrap();
    for edit in edits {
        wc.edit(edit).unwrap();
    }
    wb.commit(&mut wc).unwrap().id
}

/// Store whose writes can be switched off
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    offline: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk offline".into()));
        }
        Ok(())
    }
}

impl DefinitionStore for FlakyStore {
    fn load(&self, id: &StableId) -> Result<Definition, StoreError> {
        self.inner.load(id)
    }

    fn save(&self, definition: &Definition) -> Result<(), StoreError> {
        self.check()?;
        self.inner.save(definition)
    }

    fn remove(&self, id: &StableId) -> Result<(), StoreError> {
        self.check()?;
        self.inner.remove(id)
    }

    fn list(&self) -> Result<Vec<StableId>, StoreError> {
        self.inner.list()
    }
}

/// Store that can hold the next save until released
#[derive(Default)]
struct GateStore {
    inner: MemoryStore,
    gate: Mutex<Option<(Sender<u64>, Receiver<()>)>>,
}

impl GateStore {
    /// Arm the gate; returns (entered, release)
    fn hold_next_save(&self) -> (Receiver<u64>, Sender<()>) {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        *self.gate.lock() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }
}

impl DefinitionStore for GateStore {
    fn load(&self, id: &StableId) -> Result<Definition, StoreError> {
        self.inner.load(id)
    }

    fn save(&self, definition: &Definition) -> Result<(), StoreError> {
        let gate = self.gate.lock().take();
        if let Some((entered, release)) = gate {
            entered
                .send(definition.revision)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            release.recv().map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        self.inner.save(definition)
    }

    fn remove(&self, id: &StableId) -> Result<(), StoreError> {
        self.inner.remove(id)
    }

    fn list(&self) -> Result<Vec<StableId>, StoreError> {
        self.inner.list()
    }
}

/// Open, set damage and commit; returns the new revision
fn commit_damage(wb: &Workbench, target: &StableId, damage: i64) -> Result<u64, WorkbenchError> {
    let mut wc = wb.open(target)?;
    wc.edit(FieldEdit::set(FieldPath::field("damage"), damage))?;
    Ok(wb.commit(&mut wc)?.revision)
}

// =============================================================================
// Schema fixtures
// =============================================================================

#[test]
fn test_fixture_schemas_load_from_directory() {
    let catalog = SchemaCatalog::load_dir(fixtures_path().join("schemas")).unwrap();
    assert_eq!(catalog.categories(), vec!["ammo", "weapon"]);
    assert_eq!(catalog.get("weapon").unwrap().version, SchemaVersion::new(1, 1, 0));
}

// =============================================================================
// Commit and validation
// =============================================================================

#[test]
fn test_weapon_damage_range_blocks_commit() {
    let wb = workbench();
    let mut wc = wb.open_new("weapon").unwrap();
    wc.set_name("pistol").unwrap();

    wc.edit(FieldEdit::set(path("damage"), 150i64)).unwrap();
    let err = wb.commit(&mut wc).unwrap_err();
    let diagnostics = match &err {
        WorkbenchError::ValidationFailed(diagnostics) => diagnostics,
        other => panic!("Expected ValidationFailed, got {:?}", other),
    };
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, path("damage"));
    assert_eq!(errors[0].code, DiagnosticCode::OutOfRange);
    assert!(wc.is_open(), "a rejected commit keeps the session");

    wc.edit(FieldEdit::set(path("damage"), 42i64)).unwrap();
    let receipt = wb.commit(&mut wc).unwrap();
    assert_eq!(receipt.kind, ChangeKind::Created);

    let pistol = wb.registry().resolve(&id("weapon_pistol")).unwrap();
    assert_eq!(pistol.field("damage"), Some(&FieldValue::Integer(42)));
    assert_eq!(pistol.schema_version, SchemaVersion::new(1, 1, 0));
}

#[test]
fn test_failed_commit_leaves_registry_untouched() {
    let wb = workbench();
    create(&wb, "weapon", "pistol", vec![FieldEdit::set(path("damage"), 42i64)]);
    let before = wb.registry().snapshot();

    let mut wc = wb.open(&id("weapon_pistol")).unwrap();
    wc.edit(FieldEdit::set(path("damage"), -1i64)).unwrap();
    assert!(matches!(wb.commit(&mut wc), Err(WorkbenchError::ValidationFailed(_))));

    let after = wb.registry().snapshot();
    assert_eq!(before.generation(), after.generation());
    assert_eq!(before.fingerprint(), after.fingerprint());
    assert!(wb.is_open(&id("weapon_pistol")), "lock is kept until commit or discard");
}

#[test]
fn test_duplicate_id_on_commit() {
    let wb = workbench();
    create(&wb, "weapon", "pistol", vec![FieldEdit::set(path("damage"), 42i64)]);

    let mut wc = wb.open_new("weapon").unwrap();
    wc.set_name("pistol").unwrap();
    wc.edit(FieldEdit::set(path("damage"), 7i64)).unwrap();
    assert!(matches!(wb.commit(&mut wc), Err(WorkbenchError::DuplicateId(_))));
    assert!(wc.is_open());

    let pistol = wb.registry().resolve(&id("weapon_pistol")).unwrap();
    assert_eq!(pistol.field("damage"), Some(&FieldValue::Integer(42)));
}

#[test]
fn test_cross_field_rule() {
    let wb = workbench();
    let mut wc = wb.open_new("weapon").unwrap();
    wc.edit(FieldEdit::set(path("min_range"), 30.0)).unwrap();

    let diagnostics = wb.diagnostics(&mut wc);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, DiagnosticCode::CrossFieldViolation);
    assert_eq!(diagnostics[0].path, path("min_range"));
}

#[test]
fn test_warnings_do_not_block_commit() {
    let wb = workbench();
    let mut wc = wb.open_new("weapon").unwrap();
    wc.set_name("blunderbuss").unwrap();
    wc.edit(FieldEdit::set(path("legacy_sound"), "boom")).unwrap();
    wc.edit(FieldEdit::set(path("damge"), 3i64)).unwrap();

    let receipt = wb.commit(&mut wc).unwrap();
    let codes: Vec<_> = receipt.warnings.iter().map(|d| d.code).collect();
    assert!(codes.contains(&DiagnosticCode::DeprecatedField));
    assert!(codes.contains(&DiagnosticCode::UnknownField));
    assert!(receipt.warnings.iter().any(|d| d.message.contains("did you mean 'damage'")));
}

#[test]
fn test_references_revalidate_when_registry_changes() {
    let wb = workbench();
    let mut wc = wb.open_new("weapon").unwrap();
    wc.set_name("pistol").unwrap();
    wc.edit(FieldEdit::set(path("ammo"), id("ammo_nine_mm"))).unwrap();

    let diagnostics = wb.diagnostics(&mut wc);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, DiagnosticCode::UnresolvedReference);

    create(&wb, "ammo", "nine_mm", vec![]);
    assert!(wb.diagnostics(&mut wc).is_empty(), "a registry change invalidates cached diagnostics");
    wb.commit(&mut wc).unwrap();

    let mut wrong = wb.open(&id("weapon_pistol")).unwrap();
    wrong.edit(FieldEdit::set(path("ammo"), id("weapon_pistol"))).unwrap();
    let diagnostics = wb.diagnostics(&mut wrong);
    assert_eq!(diagnostics[0].code, DiagnosticCode::WrongReferenceCategory);
}

// =============================================================================
// Undo / redo
// =============================================================================

#[test]
fn test_undo_twice_then_redo_twice() {
    let wb = workbench();
    let mut wc = wb.open_new("weapon").unwrap();
    let damage = path("damage");
    let default = wc.get(&damage).cloned();

    wc.edit(FieldEdit::set(damage.clone(), 10i64)).unwrap();
    wc.edit(FieldEdit::set(damage.clone(), 20i64)).unwrap();

    wc.undo().unwrap();
    wc.undo().unwrap();
    assert_eq!(wc.get(&damage).cloned(), default);
    assert!(!wc.is_dirty());
    assert!(matches!(wc.undo(), Err(WorkbenchError::NothingToUndo)));

    wc.redo().unwrap();
    wc.redo().unwrap();
    assert_eq!(wc.get(&damage), Some(&FieldValue::Integer(20)));
    assert!(matches!(wc.redo(), Err(WorkbenchError::NothingToRedo)));
}

#[test]
fn test_undo_redo_pair_is_invisible() {
    let wb = workbench();
    let mut wc = wb.open_new("weapon").unwrap();
    wc.edit(FieldEdit::insert(path("tags"), 0, "loud")).unwrap();
    wc.edit(FieldEdit::insert(path("tags"), 1, "heavy")).unwrap();
    wc.edit(FieldEdit::remove(path("tags"), 0)).unwrap();
    let fields = wc.fields().clone();
    let dirty: Vec<String> = wc.dirty_fields().map(String::from).collect();

    wc.undo().unwrap();
    assert_eq!(
        wc.get(&path("tags")),
        Some(&FieldValue::List(vec!["loud".into(), "heavy".into()]))
    );
    wc.redo().unwrap();

    assert_eq!(wc.fields(), &fields);
    assert_eq!(wc.dirty_fields().map(String::from).collect::<Vec<_>>(), dirty);
}

#[test]
fn test_text_edits_coalesce() {
    let wb = workbench();
    let mut wc = wb.open_new("weapon").unwrap();
    let name = path("display_name");
    let t0 = Instant::now();

    for (i, text) in ["P", "Pi", "Pis", "Pistol"].into_iter().enumerate() {
        wc.edit_at(FieldEdit::set(name.clone(), text), t0 + Duration::from_millis(100 * i as u64))
            .unwrap();
    }

    wc.undo().unwrap();
    assert_eq!(wc.get(&name), Some(&FieldValue::from("Unnamed")));
    assert!(!wc.can_undo());
}

#[test]
fn test_revert_field_clears_redo_and_is_undoable() {
    let wb = workbench();
    create(&wb, "weapon", "pistol", vec![FieldEdit::set(path("damage"), 42i64)]);
    let damage = path("damage");

    let mut wc = wb.open(&id("weapon_pistol")).unwrap();
    wc.edit(FieldEdit::set(damage.clone(), 50i64)).unwrap();
    wc.edit(FieldEdit::set(damage.clone(), 60i64)).unwrap();
    wc.undo().unwrap();
    assert!(wc.can_redo());

    // Revert is an ordinary step: forward history is gone.
    wc.revert_field(&damage).unwrap();
    assert_eq!(wc.get(&damage), Some(&FieldValue::Integer(42)));
    assert!(!wc.can_redo());
    assert!(!wc.is_dirty());

    // Undo crosses the revert back into earlier edits.
    wc.undo().unwrap();
    assert_eq!(wc.get(&damage), Some(&FieldValue::Integer(50)));
    wc.undo().unwrap();
    assert_eq!(wc.get(&damage), Some(&FieldValue::Integer(42)));
}

// =============================================================================
// Locks and lifecycle
// =============================================================================

#[test]
fn test_single_open_copy_per_definition() {
    let wb = workbench();
    let pistol = create(&wb, "weapon", "pistol", vec![]);

    let mut first = wb.open(&pistol).unwrap();
    assert!(matches!(wb.open(&pistol), Err(WorkbenchError::AlreadyOpen(_))));

    wb.discard(&mut first);
    let mut second = wb.open(&pistol).unwrap();
    second.edit(FieldEdit::set(path("damage"), 9i64)).unwrap();
    wb.commit(&mut second).unwrap();
    assert_eq!(second.state(), SessionState::Committed);
    assert!(!second.can_undo(), "history is dropped on commit");

    let third = wb.open(&pistol).unwrap();
    assert_eq!(third.base().map(|b| b.revision), Some(2));
}

#[test]
fn test_discard_has_no_registry_effect() {
    let wb = workbench();
    let pistol = create(&wb, "weapon", "pistol", vec![]);
    let generation = wb.registry().generation();

    let mut wc = wb.open(&pistol).unwrap();
    wc.edit(FieldEdit::set(path("damage"), 99i64)).unwrap();
    wb.discard(&mut wc);
    wb.discard(&mut wc);

    assert_eq!(wb.registry().generation(), generation);
    assert_eq!(
        wb.registry().resolve(&pistol).unwrap().field("damage"),
        Some(&FieldValue::Integer(5))
    );
}

#[test]
fn test_list_by_category() {
    let wb = workbench();
    create(&wb, "weapon", "rifle", vec![]);
    create(&wb, "ammo", "nine_mm", vec![]);
    create(&wb, "weapon", "pistol", vec![]);

    let weapons: Vec<String> = wb
        .registry()
        .list_by_category("weapon")
        .map(|d| d.id.to_string())
        .collect();
    assert_eq!(weapons, vec!["weapon_pistol", "weapon_rifle"]);
}

#[test]
fn test_delete_refuses_referenced_definition() {
    let wb = workbench();
    let ammo = create(&wb, "ammo", "nine_mm", vec![]);
    let pistol = create(&wb, "weapon", "pistol", vec![FieldEdit::set(path("ammo"), ammo.clone())]);
    let generation = wb.registry().generation();

    match wb.delete(&ammo) {
        Err(WorkbenchError::Referenced { id, referrers }) => {
            assert_eq!(id, ammo);
            assert_eq!(referrers, vec![pistol.clone()]);
        }
        other => panic!("Expected Referenced, got {:?}", other),
    }
    assert!(wb.registry().contains(&ammo));
    assert_eq!(wb.registry().generation(), generation);
    assert!(!wb.is_open(&ammo), "a refused delete releases the lock");

    let mut wc = wb.open(&pistol).unwrap();
    wc.edit(FieldEdit::set(path("ammo"), FieldValue::Null)).unwrap();
    wb.commit(&mut wc).unwrap();
    assert_eq!(wb.delete(&ammo).unwrap().kind, ChangeKind::Deleted);
}

// =============================================================================
// Events
// =============================================================================

#[test]
fn test_commit_publishes_changes() {
    let wb = workbench();
    let sub = wb.subscribe();
    let pistol = create(&wb, "weapon", "pistol", vec![]);

    let created = sub.try_recv().unwrap();
    assert_eq!(created.kind, ChangeKind::Created);
    assert_eq!(created.revision, 1);

    let mut wc = wb.open(&pistol).unwrap();
    wc.edit(FieldEdit::set(path("damage"), 11i64)).unwrap();
    wc.edit(FieldEdit::set(path("rarity"), FieldValue::Enum("rare".into()))).unwrap();
    wb.commit(&mut wc).unwrap();

    let updated = sub.try_recv().unwrap();
    assert_eq!(updated.kind, ChangeKind::Updated);
    assert_eq!(updated.changed_fields, vec!["damage", "rarity"]);
    assert_eq!(updated.revision, 2);

    wb.delete(&pistol).unwrap();
    assert_eq!(sub.try_recv().map(|e| e.kind), Some(ChangeKind::Deleted));
}

#[test]
fn test_subscriber_failure_does_not_roll_back() {
    let wb = workbench();
    wb.events().on_change(|_| Err("search index offline".into()));

    let pistol = create(&wb, "weapon", "pistol", vec![FieldEdit::set(path("damage"), 42i64)]);
    assert!(wb.registry().contains(&pistol));
    assert_eq!(wb.events().stats().handler_failures, 1);
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_persist_failure_defers_write() {
    let store = Arc::new(FlakyStore::default());
    let wb = workbench().with_store(store.clone());
    let sub = wb.subscribe();
    store.offline.store(true, Ordering::SeqCst);

    let mut wc = wb.open_new("weapon").unwrap();
    wc.set_name("pistol").unwrap();
    let receipt = match wb.commit(&mut wc) {
        Err(WorkbenchError::PersistDeferred { receipt, .. }) => receipt,
        other => panic!("Expected PersistDeferred, got {:?}", other),
    };

    assert_eq!(receipt.id, id("weapon_pistol"));
    assert!(wb.registry().contains(&receipt.id), "the in-memory commit stands");
    assert!(sub.try_recv().is_some(), "the change was published");
    assert_eq!(wb.pending_writes(), vec![receipt.id.clone()]);

    let report = wb.retry_deferred();
    assert_eq!(report.failed.len(), 1);

    store.offline.store(false, Ordering::SeqCst);
    let report = wb.retry_deferred();
    assert!(report.is_clean());
    assert_eq!(report.persisted, vec![receipt.id.clone()]);
    assert!(wb.pending_writes().is_empty());
    assert!(store.load(&receipt.id).is_ok());
}

#[test]
fn test_slow_store_write_does_not_overwrite_newer_revision() {
    let store = Arc::new(GateStore::default());
    let wb = Arc::new(workbench().with_store(store.clone()));
    let pistol = create(&wb, "weapon", "pistol", vec![]);

    let (entered, release) = store.hold_next_save();
    let first = {
        let wb = Arc::clone(&wb);
        let pistol = pistol.clone();
        thread::spawn(move || commit_damage(&wb, &pistol, 50))
    };
    assert_eq!(entered.recv_timeout(Duration::from_secs(5)).unwrap(), 2);

    // Revision 2 is committed in memory, its store write is still in flight.
    let second = {
        let wb = Arc::clone(&wb);
        let pistol = pistol.clone();
        thread::spawn(move || commit_damage(&wb, &pistol, 60))
    };
    release.send(()).unwrap();

    assert_eq!(first.join().unwrap().unwrap(), 2);
    assert_eq!(second.join().unwrap().unwrap(), 3);

    let stored = store.load(&pistol).unwrap();
    assert_eq!(stored.revision, 3);
    assert_eq!(stored.field("damage"), Some(&FieldValue::Integer(60)));
    assert!(wb.pending_writes().is_empty());
}

#[test]
fn test_superseded_store_write_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let wb = Arc::new(workbench().with_store(store.clone()));
    let pistol = create(&wb, "weapon", "pistol", vec![]);

    // Commit revision 3 between revision 2's publish and its store write.
    let weak = Arc::downgrade(&wb);
    wb.events().on_change(move |event| {
        match (event.revision, weak.upgrade()) {
            (2, Some(wb)) => commit_damage(&wb, &event.id, 60).map(|_| ()).map_err(Into::into),
            _ => Ok(()),
        }
    });

    assert_eq!(commit_damage(&wb, &pistol, 50).unwrap(), 2);
    assert_eq!(wb.events().stats().handler_failures, 0);

    let current = wb.registry().resolve(&pistol).unwrap();
    assert_eq!(current.revision, 3);
    let stored = store.load(&pistol).unwrap();
    assert_eq!(stored.revision, 3);
    assert_eq!(stored.field("damage"), Some(&FieldValue::Integer(60)));
}

#[test]
fn test_json_directory_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonDirectoryStore::open(dir.path()).unwrap());

    let wb = workbench().with_store(store.clone());
    create(&wb, "ammo", "nine_mm", vec![]);
    create(
        &wb,
        "weapon",
        "pistol",
        vec![FieldEdit::set(path("ammo"), id("ammo_nine_mm"))],
    );

    let fresh = workbench().with_store(store);
    assert_eq!(fresh.load_all().unwrap(), 2);
    let pistol = fresh.registry().resolve(&id("weapon_pistol")).unwrap();
    assert_eq!(pistol.field("ammo"), Some(&FieldValue::Reference(id("ammo_nine_mm"))));
    assert_eq!(pistol.revision, 1);
}

// =============================================================================
// Migration
// =============================================================================

#[test]
fn test_load_without_migration_is_incompatible() {
    let store = Arc::new(MemoryStore::new());
    store.save(&revolver_v1()).unwrap();
    let wb = workbench().with_store(store);

    let result = wb.load(&id("weapon_revolver"));
    assert!(matches!(result, Err(WorkbenchError::SchemaIncompatible { .. })));
    assert!(wb.registry().is_empty());
}

#[test]
fn test_load_migrates_stale_definition() {
    let store = Arc::new(MemoryStore::new());
    store.save(&revolver_v1()).unwrap();
    let catalog = catalog();
    let wb = Workbench::new(Arc::new(DefinitionRegistry::new()), catalog.clone())
        .with_store(store)
        .with_migration("weapon", FillNewFields::new(catalog.get("weapon").unwrap()));

    let revolver = wb.load(&id("weapon_revolver")).unwrap();
    assert_eq!(revolver.schema_version, SchemaVersion::new(1, 1, 0));
    assert_eq!(revolver.revision, 3);
    assert_eq!(revolver.field("damage"), Some(&FieldValue::Integer(35)));
    assert_eq!(revolver.field("max_range"), Some(&FieldValue::Float(25.0)));
    assert!(revolver.field("muzzle_flash").is_none());

    let wc = wb.open(&revolver.id).unwrap();
    assert!(!wc.is_dirty());
}

#[test]
fn test_open_migrates_and_commit_records_new_version() {
    let catalog = catalog();
    let wb = Workbench::new(Arc::new(DefinitionRegistry::new()), catalog.clone())
        .with_migration("weapon", FillNewFields::new(catalog.get("weapon").unwrap()));
    wb.registry().register(revolver_v1()).unwrap();

    let mut wc = wb.open(&id("weapon_revolver")).unwrap();
    assert_eq!(wc.field("max_range"), Some(&FieldValue::Float(25.0)));

    let receipt = wb.commit(&mut wc).unwrap();
    assert_eq!(receipt.revision, 4);
    assert!(receipt.changed_fields.contains(&"max_range".to_string()));
    assert!(receipt.changed_fields.contains(&"muzzle_flash".to_string()));

    let committed = wb.registry().resolve(&id("weapon_revolver")).unwrap();
    assert_eq!(committed.schema_version, SchemaVersion::new(1, 1, 0));
}

#[test]
fn test_refused_migration() {
    let wb = workbench().with_migration(
        "weapon",
        |_: Definition, _: &SchemaVersion, _: &SchemaVersion| -> Result<Definition, Unmigratable> {
            Err(Unmigratable::new("damage model changed"))
        },
    );
    wb.registry().register(revolver_v1()).unwrap();

    let result = wb.open(&id("weapon_revolver"));
    assert!(matches!(result, Err(WorkbenchError::Unmigratable { .. })));
    assert!(!wb.is_open(&id("weapon_revolver")), "a failed open releases the lock");
}

#[test]
fn test_newer_definition_is_incompatible() {
    let wb = workbench();
    let mut future = revolver_v1();
    future.schema_version = SchemaVersion::new(2, 0, 0);
    wb.registry().register(future).unwrap();

    assert!(matches!(
        wb.open(&id("weapon_revolver")),
        Err(WorkbenchError::SchemaIncompatible { .. })
    ));
}
