//! Definition Workbench CLI
//!
//! Validates stored definitions against their category schemas and inspects
//! the store and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use definition_workbench::{
    DefinitionRegistry, DefinitionStore, FillNewFields, JsonDirectoryStore, SchemaCatalog, Severity, StableId, Workbench,
    WorkbenchConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "definition-workbench")]
#[command(about = "Validate and inspect stable-id definitions")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Schema directory (overrides storage.schemas_dir)
    #[arg(long, global = true)]
    schemas: Option<PathBuf>,

    /// Definition directory (overrides storage.definitions_dir)
    #[arg(long, global = true)]
    definitions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every stored definition
    Validate {
        /// Only validate this category
        #[arg(short = 'C', long)]
        category: Option<String>,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },

    /// List stored definitions
    List {
        /// Only list this category
        category: Option<String>,
    },

    /// Print one definition
    Show {
        /// Stable id, e.g. weapon_pistol
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the categories in the schema catalog
    Schemas,

    /// View and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path
        #[arg(short, long, default_value = "workbench.toml")]
        output: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = WorkbenchConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.schemas {
        config.storage.schemas_dir = Some(dir);
    }
    if let Some(dir) = cli.definitions {
        config.storage.definitions_dir = Some(dir);
    }

    match cli.command {
        Commands::Config { command } => run_config(command, &config),

        Commands::Schemas => {
            let catalog = open_catalog(&config)?;
            println!("📚 {} categories", catalog.len());
            for category in catalog.categories() {
                let schema = catalog.get(category)?;
                println!("  {} {} ({} fields)", category, schema.version, schema.fields.len());
            }
            Ok(())
        }

        Commands::List { category } => {
            let store = open_store(&config)?;
            let ids = store.list()?;
            let mut shown = 0;
            for id in ids
                .iter()
                .filter(|id| category.as_deref().map_or(true, |c| id.category() == c))
            {
                println!("  {}", id);
                shown += 1;
            }
            println!("\n{} definition(s)", shown);
            Ok(())
        }

        Commands::Show { id, json } => {
            let wb = open_workbench(&config)?;
            let id = StableId::parse(&id)?;
            let definition = wb.load(&id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(definition.as_ref())?);
            } else {
                println!("📄 {} (revision {}, schema {})", definition.id, definition.revision, definition.schema_version);
                println!("   checksum {}", definition.checksum().short());
                for (name, value) in &definition.fields {
                    println!("   {} = {}", name, value);
                }
            }
            Ok(())
        }

        Commands::Validate { category, strict } => {
            let wb = open_workbench(&config)?;
            let loaded = wb.load_all()?;
            println!("🔍 Validating {} definition(s)...", loaded);

            let mut errors = 0;
            let mut warnings = 0;
            let ids = wb.registry().snapshot().ids();
            for id in ids
                .iter()
                .filter(|id| category.as_deref().map_or(true, |c| id.category() == c))
            {
                let mut wc = wb.open(id)?;
                let diagnostics = wb.validate(&wc);
                wb.discard(&mut wc);

                if diagnostics.is_empty() {
                    println!("  ✅ {}", id);
                    continue;
                }
                println!("  {} {}", if diagnostics.iter().any(|d| d.is_error()) { "❌" } else { "⚠️ " }, id);
                for d in &diagnostics {
                    match d.severity {
                        Severity::Error => errors += 1,
                        Severity::Warning => warnings += 1,
                    }
                    println!("     └─ {}", d);
                }
            }

            println!();
            println!("{} error(s), {} warning(s)", errors, warnings);
            if errors > 0 || (strict && warnings > 0) {
                bail!("validation failed");
            }
            Ok(())
        }
    }
}

fn run_config(command: ConfigCommands, config: &WorkbenchConfig) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show { toml, json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(config)?);
            } else {
                println!("📋 Workbench Configuration\n");
                println!("History:");
                println!("  Coalesce window: {} ms", config.history.coalesce_window_ms);
                println!("  Max depth: {}", config.history.max_depth);

                println!("\nEvents:");
                println!("  Channel capacity: {}", config.events.channel_capacity);

                println!("\nValidation:");
                println!("  Warn on unknown fields: {}", config.validation.warn_unknown_fields);
                println!("  Suggest field names: {}", config.validation.suggest_field_names);

                println!("\nStorage:");
                println!("  Definitions: {:?}", config.storage.definitions_dir);
                println!("  Schemas: {:?}", config.storage.schemas_dir);
            }
        }

        ConfigCommands::Init { output } => {
            WorkbenchConfig::default().save(&output)?;
            println!("✅ Created config file: {}", output);
        }
    }
    Ok(())
}

fn open_catalog(config: &WorkbenchConfig) -> anyhow::Result<SchemaCatalog> {
    let Some(dir) = config.storage.schemas_dir.as_ref() else {
        bail!("no schema directory configured (storage.schemas_dir or --schemas)");
    };
    SchemaCatalog::load_dir(dir).with_context(|| format!("loading schemas from {}", dir.display()))
}

fn open_store(config: &WorkbenchConfig) -> anyhow::Result<JsonDirectoryStore> {
    let Some(dir) = config.storage.definitions_dir.as_ref() else {
        bail!("no definition directory configured (storage.definitions_dir or --definitions)");
    };
    Ok(JsonDirectoryStore::open(dir)?)
}

fn open_workbench(config: &WorkbenchConfig) -> anyhow::Result<Workbench> {
    let catalog = Arc::new(open_catalog(config)?);
    let store = Arc::new(open_store(config)?);

    let mut wb = Workbench::with_config(Arc::new(DefinitionRegistry::new()), Arc::clone(&catalog), config.clone())
        .with_store(store);
    for category in catalog.categories() {
        wb = wb.with_migration(category, FillNewFields::new(catalog.get(category)?));
    }
    Ok(wb)
}
