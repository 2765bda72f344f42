use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use search_mcp::{
    ColbertEmbedder,
    DataDir,
    FolderConfig,
    FolderIdentity,
    ModelManager,
    Registry,
    SearchHit,
    SearchOptions,
    Searcher,
    VectorDb,
    error,
    mcp,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, SearchArgs};

const LOG_ENV_VAR: &str = "SEARCH_MCP_LOG";

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV_VAR) {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match &cli.command {
        Command::Serve { lazy_model } => {
            let searcher = startup(&cli, !lazy_model)?;
            mcp::run_mcp(searcher)?;
        }
        Command::Search(args) => {
            let searcher = startup(&cli, false)?;
            cmd_search(searcher, args)?;
        }
        Command::Directories { json } => {
            let searcher = startup(&cli, false)?;
            cmd_directories(&searcher, *json);
        }
        Command::Status { json } => {
            cmd_status(&cli, *json)?;
        }
        Command::Completions(args) => {
            args.generate();
        }
    }

    Ok(())
}

/// Load configuration, open the store and build the shared search context.
///
/// Everything here runs before the first request is accepted.
fn startup(cli: &Cli, preload_model: bool) -> error::Result<Searcher> {
    let config_path = FolderConfig::locate(cli.config.as_deref())?;
    let config = FolderConfig::load(&config_path).map_err(|e| {
        error::Error::RegistryBuildFailed(format!(
            "cannot load folder configuration: {e}"
        ))
    })?;
    tracing::info!(
        config = %config_path.display(),
        folders = config.folders.len(),
        "loaded folder configuration"
    );

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let store = VectorDb::open(&data_dir.vector_store()).map_err(|e| {
        error::Error::RegistryBuildFailed(format!(
            "cannot open vector store at {}: {e}",
            data_dir.vector_store().display()
        ))
    })?;
    let registry = Registry::build(&config.folders, &store)?;

    let embedder = ColbertEmbedder::new(model_manager(cli, &config));
    if preload_model {
        embedder.preload()?;
    }

    Ok(Searcher::new(
        Arc::new(registry),
        Arc::new(embedder),
        SearchOptions {
            query_timeout: config.query_timeout,
        },
    ))
}

/// `--model` wins over the config file, which wins over the environment.
fn model_manager(cli: &Cli, config: &FolderConfig) -> ModelManager {
    match cli.model.clone().or_else(|| config.model.clone()) {
        Some(model_id) => ModelManager::with_model_id(model_id),
        None => ModelManager::default(),
    }
}

fn cmd_search(searcher: Searcher, args: &SearchArgs) -> error::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    let hits = runtime.block_on(searcher.search(
        &args.query,
        args.count,
        args.directory.as_deref(),
    ));

    if args.json {
        let text = serde_json::to_string_pretty(&hits)
            .map_err(|e| error::Error::Store(e.to_string()))?;
        println!("{text}");
    } else {
        format_human(&hits);
    }
    Ok(())
}

fn format_human(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results found.");
        return;
    }

    for (rank, hit) in hits.iter().enumerate() {
        match hit {
            SearchHit::Match(r) => {
                println!("{:>3}. [{:.3}] {}", rank + 1, r.score, r.file_path);
                if let Some(line) = r.snippet.lines().find(|l| !l.trim().is_empty())
                {
                    println!("     {}", line.trim());
                }
            }
            SearchHit::Error(e) => {
                println!("{:>3}. [error] {}", rank + 1, e.error);
            }
        }
    }
    println!("\n{} result(s)", hits.len());
}

fn cmd_directories(searcher: &Searcher, json: bool) {
    let directories = searcher.list_directories();

    if json {
        println!("{}", json!(directories));
    } else if directories.is_empty() {
        println!("No indexed directories.");
    } else {
        for dir in &directories {
            println!("{dir}");
        }
    }

    for omitted in searcher.registry().omitted() {
        eprintln!(
            "skipped {}: {}",
            omitted.path.display(),
            omitted.reason
        );
    }
}

/// Per-folder index state, as reported by `status`.
struct FolderStatus {
    path: PathBuf,
    collection: Option<String>,
    documents: Option<u64>,
}

fn cmd_status(cli: &Cli, json: bool) -> error::Result<()> {
    let config_path = FolderConfig::locate(cli.config.as_deref())?;
    let config = FolderConfig::load(&config_path)?;
    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let store = VectorDb::open(&data_dir.vector_store())?;
    let model = model_manager(cli, &config);

    let mut folders = Vec::with_capacity(config.folders.len());
    for path in &config.folders {
        let status = match FolderIdentity::resolve(path) {
            Ok(identity) => {
                let name = identity.collection_name();
                FolderStatus {
                    path: identity.as_path().to_path_buf(),
                    documents: store.collection_len(&name)?,
                    collection: Some(name.to_string()),
                }
            }
            Err(_) => FolderStatus {
                path: path.clone(),
                collection: None,
                documents: None,
            },
        };
        folders.push(status);
    }

    if json {
        let folders: Vec<_> = folders
            .iter()
            .map(|f| {
                json!({
                    "path": f.path.display().to_string(),
                    "collection": f.collection,
                    "documents": f.documents,
                })
            })
            .collect();
        println!(
            "{}",
            json!({
                "config": config_path.display().to_string(),
                "data_dir": data_dir.root().display().to_string(),
                "model": model.model_id(),
                "query_timeout_ms": config.query_timeout.as_millis() as u64,
                "folders": folders,
            })
        );
    } else {
        println!("Config: {}", config_path.display());
        println!("Data directory: {}", data_dir.root().display());
        println!("Model: {}", model.model_id());
        println!("Query timeout: {}ms", config.query_timeout.as_millis());
        println!("Folders: {}", folders.len());
        for f in &folders {
            match (&f.collection, f.documents) {
                (Some(name), Some(n)) => {
                    println!("  {} [{name}]: {n} document(s)", f.path.display())
                }
                (Some(name), None) => {
                    println!("  {} [{name}]: not indexed", f.path.display())
                }
                (None, _) => {
                    println!("  {}: path cannot be resolved", f.path.display())
                }
            }
        }
    }
    Ok(())
}
