//! Command-line interface for catalog similarity search
//!
//! Operational access to the search layer: probing a deployment, running
//! similarity queries from a seed record or a literal vector, and reading or
//! writing single embeddings.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use catalog_similarity::config::SearchConfig;
use catalog_similarity::vector_search::{
    backend, codec, CatalogKind, Recommender, SearchError, SimilarityQuery,
    SimilaritySearchService,
};

/// CLI arguments for catalog-similarity
#[derive(Parser, Debug)]
#[command(name = "catalog-similarity")]
#[command(version = catalog_similarity::VERSION)]
#[command(about = "Embedding similarity search over catalog tables", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Store connection string (postgres://…, sqlite://path, or a file path)
    #[arg(short = 'd', long, env = "CATALOG_SIMILARITY_DATABASE_URL")]
    pub database_url: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Print results as JSON")]
    pub json: bool,

    #[arg(long, help = "Enable JSON output for logs")]
    pub json_logs: bool,

    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report whether vector search is usable in this deployment
    Probe,

    /// Create the catalog tables in a SQLite database
    InitSchema,

    /// Find records similar to a seed record or a literal vector
    Similar {
        /// Catalog to search (media or notes)
        #[arg(short = 'k', long, default_value = "media")]
        catalog: CatalogKind,

        /// Seed the query from this record's stored embedding
        #[arg(short, long, conflicts_with = "vector")]
        seed: Option<Uuid>,

        /// Query vector literal, e.g. "[0.1,0.2,0.3]"
        #[arg(short, long)]
        vector: Option<String>,

        /// Media type (media) or vault name (notes) to restrict to
        #[arg(short, long)]
        filter: Option<String>,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep the seed record in the results
        #[arg(long)]
        include_seed: bool,
    },

    /// Find records in the other catalog related to a record
    Related {
        /// Catalog the record belongs to
        #[arg(short = 'k', long)]
        catalog: CatalogKind,

        /// Record id
        #[arg(short, long)]
        id: Uuid,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Recommend media items from a set of liked media items
    Recommend {
        /// Liked media item ids
        #[arg(short, long = "seed", required = true)]
        seeds: Vec<Uuid>,

        /// Keep only results with this lifecycle status
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Read or write a single stored embedding
    Embedding {
        #[command(subcommand)]
        embedding_command: EmbeddingCommands,
    },
}

/// Embedding subcommands
#[derive(Subcommand, Debug)]
pub enum EmbeddingCommands {
    /// Print a record's stored embedding
    Get {
        #[arg(short = 'k', long)]
        catalog: CatalogKind,
        #[arg(short, long)]
        id: Uuid,
    },

    /// Replace a record's stored embedding
    Set {
        #[arg(short = 'k', long)]
        catalog: CatalogKind,
        #[arg(short, long)]
        id: Uuid,
        /// Vector literal, e.g. "[0.1,0.2,0.3]"
        #[arg(short, long)]
        vector: String,
    },

    /// Remove a record's stored embedding
    Clear {
        #[arg(short = 'k', long)]
        catalog: CatalogKind,
        #[arg(short, long)]
        id: Uuid,
    },
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    vector_capability: bool,
    media_embeddings: bool,
    note_embeddings: bool,
}

/// Resolve configuration from file, flags, and environment
pub fn load_config(args: &Args) -> Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => SearchConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => SearchConfig::default(),
    };

    if let Some(url) = &args.database_url {
        config = config.with_database_url(url.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Execute the selected command
pub async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    let config = load_config(&args)?;
    let default_limit = config.default_limit;

    match args.command {
        Commands::InitSchema => init_schema(&config).await?,
        Commands::Probe => {
            let service = open_service(&config, cancel).await?;
            let report = ProbeReport {
                vector_capability: service.is_vector_capability_available().await,
                media_embeddings: service.has_any_embeddings(CatalogKind::MediaItems).await,
                note_embeddings: service.has_any_embeddings(CatalogKind::Notes).await,
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Vector capability: {}", yes_no(report.vector_capability));
                println!("Media embeddings:  {}", yes_no(report.media_embeddings));
                println!("Note embeddings:   {}", yes_no(report.note_embeddings));
            }
        }
        Commands::Similar {
            catalog,
            seed,
            vector,
            filter,
            limit,
            include_seed,
        } => {
            let service = open_service(&config, cancel).await?;
            let embedding = match (seed, vector) {
                (Some(id), _) => match service.get_stored_embedding(catalog, id).await {
                    Some(embedding) => embedding,
                    None => {
                        println!("No stored embedding for {} record {}", catalog, id);
                        return Ok(());
                    }
                },
                (None, Some(literal)) => parse_vector(&literal)?,
                (None, None) => anyhow::bail!("either --seed or --vector is required"),
            };

            let mut query =
                SimilarityQuery::new(embedding).with_limit(limit.unwrap_or(default_limit));
            if let (Some(id), false) = (seed, include_seed) {
                query = query.excluding(id);
            }
            if let Some(filter) = filter {
                query = query.filtered_by(filter);
            }

            match catalog {
                CatalogKind::MediaItems => {
                    let results = service
                        .find_similar_media_items(&query)
                        .await
                        .map_err(search_failure)?;
                    print_results(&results, args.json)?;
                }
                CatalogKind::Notes => {
                    let results =
                        service.find_similar_notes(&query).await.map_err(search_failure)?;
                    print_results(&results, args.json)?;
                }
            }
        }
        Commands::Related { catalog, id, limit } => {
            let recommender = Recommender::new(open_service(&config, cancel).await?);
            let limit = limit.unwrap_or(default_limit);
            match catalog {
                CatalogKind::Notes => {
                    let results = recommender
                        .media_related_to_note(id, limit)
                        .await
                        .map_err(search_failure)?;
                    print_results(&results, args.json)?;
                }
                CatalogKind::MediaItems => {
                    let results = recommender
                        .notes_related_to_media(id, limit)
                        .await
                        .map_err(search_failure)?;
                    print_results(&results, args.json)?;
                }
            }
        }
        Commands::Recommend { seeds, status, limit } => {
            let recommender = Recommender::new(open_service(&config, cancel).await?);
            let results = recommender
                .recommend_from_seeds(&seeds, limit.unwrap_or(default_limit), status.as_deref())
                .await
                .map_err(search_failure)?;
            print_results(&results, args.json)?;
        }
        Commands::Embedding { embedding_command } => {
            let service = open_service(&config, cancel).await?;
            run_embedding_command(&service, embedding_command, args.json).await?;
        }
    }

    Ok(())
}

async fn open_service(
    config: &SearchConfig,
    cancel: CancellationToken,
) -> Result<SimilaritySearchService> {
    let backend = backend::connect(config).await?;
    Ok(SimilaritySearchService::new(backend).with_cancellation(cancel))
}

async fn run_embedding_command(
    service: &SimilaritySearchService,
    command: EmbeddingCommands,
    json: bool,
) -> Result<()> {
    match command {
        EmbeddingCommands::Get { catalog, id } => {
            match service.get_stored_embedding(catalog, id).await {
                Some(embedding) if json => println!("{}", serde_json::to_string(&embedding)?),
                Some(embedding) => println!("{}", codec::encode(&embedding)?),
                None => println!("No stored embedding for {} record {}", catalog, id),
            }
        }
        EmbeddingCommands::Set { catalog, id, vector } => {
            let embedding = parse_vector(&vector)?;
            let stored = service
                .store_embedding(catalog, id, &embedding)
                .await
                .map_err(search_failure)?;
            if stored {
                println!(
                    "Stored {}-dimensional embedding for {} record {}",
                    embedding.len(),
                    catalog,
                    id
                );
            } else {
                println!("No {} record {}", catalog, id);
            }
        }
        EmbeddingCommands::Clear { catalog, id } => {
            if service.clear_embedding(catalog, id).await.map_err(search_failure)? {
                println!("Cleared embedding for {} record {}", catalog, id);
            } else {
                println!("No {} record {}", catalog, id);
            }
        }
    }
    Ok(())
}

async fn init_schema(config: &SearchConfig) -> Result<()> {
    #[cfg(feature = "sqlite")]
    {
        use catalog_similarity::config::StoreLocation;
        use catalog_similarity::vector_search::SqliteBackend;

        let backend = match config.store_location()? {
            StoreLocation::SqliteFile(path) => SqliteBackend::open(&path)?,
            StoreLocation::SqliteMemory => SqliteBackend::open_in_memory()?,
            StoreLocation::Postgres(_) => {
                anyhow::bail!(
                    "init-schema only manages SQLite databases; \
                     PostgreSQL schemas are owned by migrations"
                )
            }
        };
        backend.create_schema().await?;
        println!("Catalog schema ready");
        return Ok(());
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        anyhow::bail!("init-schema requires the sqlite feature")
    }
}

fn parse_vector(literal: &str) -> Result<Vec<f32>> {
    codec::decode(literal)
        .ok_or_else(|| anyhow::anyhow!("'{literal}' is not a valid vector literal"))
}

/// Report a search failure without mistaking it for an empty result
fn search_failure(err: SearchError) -> anyhow::Error {
    tracing::error!(error = %err, "Similarity search failed");
    anyhow::anyhow!("{}", err.user_message())
}

fn print_results<T: Serialize + std::fmt::Display>(results: &[T], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No similar records found");
    } else {
        for (rank, result) in results.iter().enumerate() {
            println!("{:>3}. {}", rank + 1, result);
        }
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
