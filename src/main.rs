//! catalog-sync - multilingual taxonomy sync for a statistical metadata catalog
//!
//! Entry point: loads configuration, sets up logging and dispatches the
//! command-line operations to the library.

use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog_sync::catalog::{ArtifactDirectory, ArtifactHeader, CatalogTransport, HttpCatalog};
use catalog_sync::cli::{Args, CacheAction, Commands, ConfigAction};
use catalog_sync::config::Config;
use catalog_sync::model::TextField;
use catalog_sync::translate::{Glossary, ProviderFactory, TranslationCache, TranslationFillEngine, YamlFileStore};
use catalog_sync::workflow::TaxonomySync;

const DEFAULT_CONFIG_FILE: &str = "catalog-sync.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The guard flushes the file writer on drop
    let _log_guard = setup_logging(args.verbose)?;
    info!("Starting catalog-sync");

    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if let Commands::Config { action: ConfigAction::Init { force } } = &args.command {
        if config_path.exists() && !force {
            anyhow::bail!(
                "{} already exists, use --force to overwrite it",
                config_path.display()
            );
        }
        Config::default().save_to_file(&config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::List { kind } => {
            let directory = ArtifactDirectory::new(transport(&config)?);
            let headers = directory.list(kind).await?;

            println!("\n{} artifacts ({}):", kind, headers.len());
            println!("{:<30} {:<15} {:<10} {}", "Id", "Agency", "Version", "Name");
            println!("{}", "-".repeat(80));
            for header in &headers {
                let name = header
                    .names
                    .get(config.primary_language())
                    .or_else(|| header.names.values().next())
                    .map(String::as_str)
                    .unwrap_or("");
                println!(
                    "{:<30} {:<15} {:<10} {}",
                    header.identity.id, header.identity.agency, header.identity.version, name
                );
            }
        }

        Commands::Show { artifact } => {
            let mut sync = TaxonomySync::new(
                artifact.kind,
                artifact.identity(),
                config.catalog.languages.clone(),
                transport(&config)?,
            );
            let table = sync.refresh().await?;

            println!("\n{} {} ({} items):", artifact.kind, artifact.identity(), table.len());
            for record in &table.records {
                println!("{:<20} parent={}", record.id, record.parent.as_deref().unwrap_or("-"));
                for language in &table.languages {
                    println!(
                        "    {:<4} {} | {}",
                        language,
                        record.text(TextField::Name, language).unwrap_or(""),
                        record.text(TextField::Description, language).unwrap_or("")
                    );
                }
            }
        }

        Commands::Translate { artifact } => {
            let mut engine = fill_engine(&config)?;
            let mut sync = TaxonomySync::new(
                artifact.kind,
                artifact.identity(),
                config.catalog.languages.clone(),
                transport(&config)?,
            );
            sync.refresh().await?;
            let reports = sync.push_translations(&mut engine).await?;

            if reports.is_empty() {
                println!("Nothing to translate in {}", artifact.identity());
            }
            for report in &reports {
                println!("Uploaded {} translated items ({})", report.rows, report.language);
            }
        }

        Commands::Add {
            artifact,
            code_id,
            parent,
            name,
            description,
            lang,
            translate,
        } => {
            let language = lang.unwrap_or_else(|| config.primary_language().to_string());
            let mut engine = if translate { Some(fill_engine(&config)?) } else { None };
            let mut sync = TaxonomySync::new(
                artifact.kind,
                artifact.identity(),
                config.catalog.languages.clone(),
                transport(&config)?,
            );
            sync.refresh().await?;

            if !sync.add_item(&code_id, parent.as_deref(), &language, &name, description.as_deref()) {
                println!("{} already exists in {}", code_id, artifact.identity());
            }
            let report = sync.synchronize(&language, engine.as_mut()).await?;
            println!(
                "Added {} items, uploaded translations for {} languages",
                report.added,
                report.translations.len()
            );
        }

        Commands::Create {
            artifact,
            name,
            description,
            lang,
            translate,
        } => {
            let language = lang.unwrap_or_else(|| config.primary_language().to_string());
            let mut engine = if translate { Some(fill_engine(&config)?) } else { None };
            let header = ArtifactHeader {
                identity: artifact.identity(),
                names: BTreeMap::from([(language.clone(), name)]),
                descriptions: description.map(|d| BTreeMap::from([(language.clone(), d)])),
            };

            let directory = ArtifactDirectory::new(transport(&config)?);
            let created = directory
                .ensure(artifact.kind, header, &config.catalog.languages, engine.as_mut())
                .await?;
            if created {
                println!("Created {} {}", artifact.kind, artifact.identity());
            } else {
                println!("{} {} already exists", artifact.kind, artifact.identity());
            }
        }

        Commands::Cache { action } => match action {
            CacheAction::Stats => {
                let cache = TranslationCache::open(Box::new(YamlFileStore::new(&config.cache.path)))?;
                let stats = cache.stats();

                println!("\nTranslation cache: {}", config.cache.path.display());
                println!("  Texts:        {}", stats.texts);
                println!("  Translations: {}", stats.translations);
                for (language, count) in &stats.per_language {
                    println!("    {:<4} {}", language, count);
                }
            }
        },

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                info!("No configuration file found, using defaults");
                Config::default()
            }
        }
    };
    Ok(config)
}

fn transport(config: &Config) -> Result<Arc<dyn CatalogTransport>> {
    Ok(Arc::new(HttpCatalog::new(&config.catalog)?))
}

fn fill_engine(config: &Config) -> Result<TranslationFillEngine> {
    if !config.translate.enabled {
        anyhow::bail!("Translation is disabled in the configuration");
    }
    let provider = ProviderFactory::create_provider(
        &config.translate,
        Duration::from_secs(config.catalog.timeout_secs),
    )?;
    let cache = TranslationCache::open(Box::new(YamlFileStore::new(&config.cache.path)))?;
    let glossary = Glossary::new(config.translate.glossary.clone());
    info!("Translation cache loaded with {} texts", cache.len());
    Ok(TranslationFillEngine::new(provider, cache, glossary))
}

fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".catalog-sync").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "catalog-sync.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("catalog-sync.log").display()
    );

    Ok(guard)
}
