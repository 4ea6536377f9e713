use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser as ClapParser;
use indexer_orchestrator::cli::{Cli, Command, IndexArgs, SearchArgs, SearchType, VectorStoreKind};
use indexer_orchestrator::{
    Config, GraphViews, IndexerOrchestrator, OrchestratorError, ProjectConfig, Result, RunMode,
    RunOptions,
};
use indexer_storage::{
    Distance, HttpEmbeddingProvider, HttpVectorStore, MemoryVectorStore, Point, PointFilter,
    ScrollPage, VectorStore,
};

/// Dispatches `VectorStore` calls to whichever backend `--store` picked,
/// so the orchestrator stays generic over a single concrete type per run.
enum StoreBackend {
    Memory(MemoryVectorStore),
    Http(HttpVectorStore),
}

#[async_trait]
impl VectorStore for StoreBackend {
    async fn ensure_collection(&self, name: &str, vector_dim: usize, distance: Distance) -> indexer_storage::Result<()> {
        match self {
            StoreBackend::Memory(s) => s.ensure_collection(name, vector_dim, distance).await,
            StoreBackend::Http(s) => s.ensure_collection(name, vector_dim, distance).await,
        }
    }

    async fn upsert(&self, name: &str, points: Vec<Point>) -> indexer_storage::Result<()> {
        match self {
            StoreBackend::Memory(s) => s.upsert(name, points).await,
            StoreBackend::Http(s) => s.upsert(name, points).await,
        }
    }

    async fn delete(&self, name: &str, ids: Vec<String>) -> indexer_storage::Result<()> {
        match self {
            StoreBackend::Memory(s) => s.delete(name, ids).await,
            StoreBackend::Http(s) => s.delete(name, ids).await,
        }
    }

    async fn delete_by_filter(&self, name: &str, filter: PointFilter) -> indexer_storage::Result<u64> {
        match self {
            StoreBackend::Memory(s) => s.delete_by_filter(name, filter).await,
            StoreBackend::Http(s) => s.delete_by_filter(name, filter).await,
        }
    }

    async fn scroll(
        &self,
        name: &str,
        filter: PointFilter,
        with_vector: bool,
        cursor: Option<String>,
        limit: usize,
    ) -> indexer_storage::Result<ScrollPage> {
        match self {
            StoreBackend::Memory(s) => s.scroll(name, filter, with_vector, cursor, limit).await,
            StoreBackend::Http(s) => s.scroll(name, filter, with_vector, cursor, limit).await,
        }
    }

    async fn count(&self, name: &str, filter: PointFilter) -> indexer_storage::Result<u64> {
        match self {
            StoreBackend::Memory(s) => s.count(name, filter).await,
            StoreBackend::Http(s) => s.count(name, filter).await,
        }
    }
}

fn build_store(kind: VectorStoreKind, config: &Config) -> StoreBackend {
    match kind {
        VectorStoreKind::Memory => StoreBackend::Memory(MemoryVectorStore::new()),
        VectorStoreKind::Http => StoreBackend::Http(HttpVectorStore::new(
            config.vector_store_url.clone(),
            config.vector_store_api_key.clone(),
        )),
    }
}

fn build_provider(config: &Config) -> HttpEmbeddingProvider {
    match config.embedding_provider {
        indexer_orchestrator::EmbeddingProviderKind::Openai => HttpEmbeddingProvider::openai(
            config.embedding_model.clone(),
            config.vector_dimension,
            config.embedding_api_key.clone(),
        ),
        indexer_orchestrator::EmbeddingProviderKind::Voyage => HttpEmbeddingProvider::voyage(
            config.embedding_model.clone(),
            config.vector_dimension,
            config.embedding_api_key.clone(),
        ),
    }
}

fn load_config(store: VectorStoreKind) -> Result<Config> {
    match store {
        VectorStoreKind::Memory => Ok(Config::for_memory_store()),
        VectorStoreKind::Http => Config::from_env(),
    }
}

async fn run_index(args: IndexArgs) -> Result<i32> {
    let config = load_config(args.store)?;
    let project_config = ProjectConfig::load(&args.project)?;

    let store = Arc::new(build_store(args.store, &config));
    let provider = build_provider(&config);
    let coordinator = Arc::new(indexer_storage::EmbeddingCoordinator::new(
        provider,
        Box::new(indexer_storage::ApproximateTokenCounter::new(8192, 96)),
        3,
    ));

    let orchestrator = IndexerOrchestrator::new(args.project.clone(), store, coordinator);
    let mode = match (args.clear, args.clear_all) {
        (_, true) => RunMode::ClearAll,
        (true, false) => RunMode::Clear,
        (false, false) => RunMode::Index,
    };
    let options = RunOptions {
        project_root: args.project,
        collection: args.collection,
        mode,
        force: args.force,
        include_globs: project_config.include_globs,
        exclude_globs: project_config.exclude_globs,
    };

    let summary = orchestrator.run(options, config.vector_dimension).await?;
    if args.verbose {
        eprintln!("{summary:#?}");
    } else {
        println!(
            "indexed={} skipped={} failed={} upserted={} deleted={} tokens={} usd={:.4}",
            summary.files_indexed,
            summary.files_skipped,
            summary.files_failed,
            summary.chunks_upserted,
            summary.chunks_deleted,
            summary.tokens_used,
            summary.usd_estimate
        );
    }
    for failure in &summary.failures {
        eprintln!("FAILED {}: {} ({})", failure.file_path.display(), failure.detail, failure.kind);
    }
    Ok(summary.exit_code())
}

async fn run_search(args: SearchArgs) -> Result<i32> {
    let config = load_config(args.store)?;
    let store = build_store(args.store, &config);
    let views = GraphViews::new(&store);

    let point_type = match args.r#type {
        SearchType::Entity | SearchType::Chunk => Some("chunk"),
        SearchType::Relation => Some("relation"),
    };
    let mut cursor = None;
    let mut matched = 0usize;
    loop {
        let page = views
            .global_view(&args.collection, point_type, None, cursor, Some(100))
            .await?;
        if page.points.is_empty() {
            break;
        }
        for point in &page.points {
            if point.payload.to_string().contains(&args.query) {
                matched += 1;
                println!("{}", serde_json::to_string(&point.payload).unwrap_or_default());
            }
        }
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }
    eprintln!("{matched} matches");
    Ok(0)
}

async fn run_graph(args: indexer_orchestrator::cli::GraphArgs) -> Result<i32> {
    let config = load_config(args.store)?;
    let store = build_store(args.store, &config);
    let views = GraphViews::new(&store);

    let view = views.entity_view(&args.collection, &args.entity, args.depth).await?;
    println!("{}", serde_json::to_string_pretty(&view).map_err(OrchestratorError::from)?);
    Ok(0)
}

fn exit_not_implemented(name: &str) -> i32 {
    eprintln!("`{name}` is not implemented in this core");
    indexer_orchestrator::cli::NOT_IMPLEMENTED_EXIT
}

#[tokio::main]
async fn main() {
    indexer_orchestrator::logging::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Index(args) => run_index(args).await,
        Command::Search(args) => run_search(args).await,
        Command::Graph(args) => run_graph(args).await,
        Command::WatchStart => Ok(exit_not_implemented("watch-start")),
        Command::Service => Ok(exit_not_implemented("service")),
        Command::AddMcp => Ok(exit_not_implemented("add-mcp")),
    };

    match exit_code {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "fatal error");
            std::process::exit(2);
        }
    }
}

