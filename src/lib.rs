//! Definition Workbench
//!
//! Schema-typed game content ("definitions") addressed by stable ids, plus a
//! working-copy editing layer for authoring them safely.
//!
//! ## Features
//!
//! - **Stable Ids**: `category_name` ids that never change once committed
//! - **Copy-on-Write Registry**: lock-free reads, atomic commit swaps
//! - **Schema Validation**: typed fields, ranges, enums, references, cross-field rules
//! - **Working Copies**: isolated edits with exclusive locks and dirty tracking
//! - **Undo/Redo**: per-session history with text-edit coalescing
//! - **Change Events**: bounded channels and callbacks, never blocking a commit
//! - **Persistence & Migration**: pluggable stores, per-category schema migrations
//!
//! ## Architecture
//!
//! ```text
//! presentation ──FieldEdit──▶ WorkingCopy ──commit──▶ Workbench
//!                               │  UndoHistory          │ ValidationEngine
//!                               │  EditLock             │ DefinitionRegistry (arc-swap)
//!                               ▼                       │ EventBus ──▶ subscribers
//!                          Diagnostics ◀────────────────┘ DefinitionStore
//! ```

pub mod checksum;
pub mod commit;
pub mod config;
pub mod definition;
pub mod edit;
pub mod error;
pub mod events;
pub mod history;
pub mod id;
mod lock;
pub mod migration;
pub mod persistence;
pub mod registry;
pub mod schema;
pub mod validation;
pub mod value;
pub mod version;
pub mod workbench;
pub mod working_copy;

pub use checksum::Checksum;
pub use commit::{CommitReceipt, RetryReport};
pub use config::WorkbenchConfig;
pub use definition::Definition;
pub use edit::{EditOperation, FieldEdit};
pub use error::{Result, WorkbenchError};
pub use events::{BusStats, ChangeEvent, ChangeKind, EventBus, Subscription};
pub use history::UndoHistory;
pub use id::StableId;
pub use migration::{FillNewFields, MigrationHooks, SchemaMigration, Unmigratable};
pub use persistence::{DefinitionStore, JsonDirectoryStore, MemoryStore, StoreError};
pub use registry::{DefinitionRegistry, RegistrySnapshot};
pub use schema::{CategorySchema, CrossFieldRule, FieldSpec, FieldType, SchemaCatalog};
pub use validation::{Diagnostic, DiagnosticCode, ReferenceResolver, Severity, ValidationEngine};
pub use value::{FieldPath, FieldValue, Fields};
pub use version::SchemaVersion;
pub use workbench::Workbench;
pub use working_copy::{SessionId, SessionState, WorkingCopy};
