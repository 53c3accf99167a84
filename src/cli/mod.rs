//! CLI entry point and command dispatch.
//!
//! The CLI is an operator surface: the tenant comes from a flag or
//! LEASEFLOW_TENANT. In a service deployment the same operations are
//! driven by an API layer that derives the tenant from the authenticated
//! session instead.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::normalize::{FieldNormalizer, FieldSchema};
use crate::parsers::ParserRouter;
use crate::redact::PatternRedactor;
use crate::repository::{DocumentRepository, ExtractionRepository, ReviewQueueRepository};
use crate::services::{ExtractionOrchestrator, QueueRules, ReviewQueueService};
use crate::tenant::TenantContext;

#[derive(Parser)]
#[command(name = "leaseflow")]
#[command(about = "Commercial-lease document extraction and review pipeline")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the database
    #[arg(long, short = 'd', global = true, default_value = ".")]
    data: PathBuf,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Tenant to operate as (verified identity in service deployments)
    #[arg(long, global = true, env = "LEASEFLOW_TENANT", default_value = "default")]
    tenant: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file and run extraction on it
    Ingest {
        /// Path to the document file
        file: PathBuf,
        /// MIME type (sniffed from content when omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Re-run extraction for an existing document (creates a new version)
    Process {
        /// Document id
        document_id: String,
        /// Path to the document file
        file: PathBuf,
    },
    /// Review queue operations
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Show parser adapter availability
    Parsers,
    /// Show document and queue counts
    Status,
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List pending items, most urgent first
    List,
    /// Claim an item for review
    Claim {
        item_id: String,
        #[arg(long)]
        user: String,
    },
    /// Complete a claimed item
    Complete {
        item_id: String,
        #[arg(long)]
        user: String,
    },
    /// Skip an item
    Skip {
        item_id: String,
        #[arg(long)]
        user: String,
    },
    /// Release stale claims now
    Sweep,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Everything a command handler needs, assembled from settings.
pub(crate) struct AppContext {
    pub ctx: TenantContext,
    pub documents: DocumentRepository,
    pub orchestrator: ExtractionOrchestrator,
    pub review: ReviewQueueService,
    pub router: ParserRouter,
}

impl AppContext {
    fn build(cli: &Cli) -> anyhow::Result<Self> {
        let settings = Settings::load(cli.config.as_deref(), &cli.data)?;
        std::fs::create_dir_all(&cli.data)?;
        let db_path = settings.database_path(&cli.data);

        let documents = DocumentRepository::new(&db_path)?;
        let extractions = ExtractionRepository::new(&db_path)?;
        let queue = ReviewQueueRepository::new(&db_path)?;

        let rules = QueueRules::from_settings(&settings);
        let schema =
            FieldSchema::lease().with_critical_fields(rules.critical_field_override());
        let router = ParserRouter::from_settings(&settings.pipeline);

        let orchestrator = ExtractionOrchestrator::new(
            ParserRouter::from_settings(&settings.pipeline),
            FieldNormalizer::new(schema),
            Arc::new(PatternRedactor::new()),
            DocumentRepository::new(&db_path)?,
            extractions,
            ReviewQueueRepository::new(&db_path)?,
            rules.clone(),
        );

        let review = ReviewQueueService::new(queue, rules.claim_timeout_minutes());

        Ok(Self {
            ctx: TenantContext::new(cli.tenant.clone()),
            documents,
            orchestrator,
            review,
            router,
        })
    }
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app = AppContext::build(&cli)?;

    match cli.command {
        Commands::Ingest { file, mime } => commands::ingest(&app, &file, mime.as_deref()).await,
        Commands::Process { document_id, file } => {
            commands::process(&app, &document_id, &file).await
        }
        Commands::Queue { command } => match command {
            QueueCommands::List => commands::queue_list(&app),
            QueueCommands::Claim { item_id, user } => commands::queue_claim(&app, &item_id, &user),
            QueueCommands::Complete { item_id, user } => {
                commands::queue_complete(&app, &item_id, &user)
            }
            QueueCommands::Skip { item_id, user } => commands::queue_skip(&app, &item_id, &user),
            QueueCommands::Sweep => commands::queue_sweep(&app),
        },
        Commands::Parsers => commands::parsers(&app).await,
        Commands::Status => commands::status(&app),
    }
}
