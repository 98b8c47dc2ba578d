use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use lessonrag_core::chat::AskRequest;
use lessonrag_core::config::{Config, StorageMode};
use lessonrag_core::rag::{DocumentId, DocumentMetadata};
use lessonrag_core::service::{RagService, Upload};
use lessonrag_core::{IngestionState, Locale, Server};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lessonrag")]
#[command(about = "Lesson-plan assistant: ingest documents and ask grounded questions", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    #[command(about = "Ingest a lesson plan and wait for the report")]
    Ingest {
        #[arg(help = "Path to a PDF, DOCX or TXT file")]
        file: PathBuf,

        #[arg(long, help = "Title (defaults to the file name)")]
        title: Option<String>,

        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        age_group: Option<String>,

        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(long, help = "Language tag, detected from the text when omitted")]
        language: Option<String>,
    },

    #[command(about = "Ask a question against ingested lesson plans")]
    Ask {
        question: String,

        #[arg(long, help = "Restrict retrieval to one document")]
        document: Option<DocumentId>,

        #[arg(long, help = "Prompt language: ar or en")]
        locale: Option<Locale>,
    },

    #[command(about = "Serve requests over the configured Unix socket")]
    Serve,
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current completion and embedding models")]
    Show,

    #[command(about = "Set the completion model")]
    Set {
        #[arg(help = "Model name (e.g., 'gpt-3.5-turbo' or 'llama3.2:latest')")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show => show_config(&cli.config),
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&cli.config),
            ModelCommands::Set { model } => set_model(&cli.config, &model),
        },
        Commands::Ingest {
            file,
            title,
            subject,
            age_group,
            tags,
            language,
        } => {
            let metadata = DocumentMetadata {
                subject,
                age_group,
                tags,
            };
            ingest(&cli.config, &file, title, language, metadata).await
        }
        Commands::Ask {
            question,
            document,
            locale,
        } => ask(&cli.config, question, document, locale).await,
        Commands::Serve => serve(&cli.config).await,
    }
}

fn load_config(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        Config::load(config_path).context("Failed to load config")
    } else {
        Ok(Config::default())
    }
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Provider:       {:?}", config.llm.provider);
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url);
    println!("  Temperature:    {}", config.llm.temperature);
    println!("  Max Tokens:     {}", config.llm.max_tokens);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!("  Dimension:      {}", config.embedding.dimension);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Chunk Size:     {}", config.rag.chunk_size);
    println!("  Chunk Overlap:  {}", config.rag.chunk_overlap);
    println!("  Limit:          {}", config.retrieval.limit);
    println!("  Threshold:      {}", config.retrieval.threshold);
    println!();
    println!("{}", "Storage:".bold());
    match &config.storage.storage_mode {
        StorageMode::Memory => println!("  Mode:           memory"),
        StorageMode::Grpc { url } => println!("  Mode:           grpc ({})", url),
    }
    println!("  Collection:     {}", config.storage.vector_db.collection_name);
    println!("  Socket:         {}", config.server.socket_path);

    Ok(())
}

fn show_model(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}: {}", "Completion model".bold(), config.llm.model.cyan());
    println!("{}: {}", "Embedding model".bold(), config.embedding.model.cyan());
    Ok(())
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.llm.model = model.to_string();

    let updated_content = serde_yaml::to_string(&config).context("Failed to serialize config")?;
    std::fs::write(config_path, updated_content).context("Failed to write config file")?;

    println!("{} Model updated to: {}", "✓".green().bold(), model.cyan());

    Ok(())
}

async fn ingest(
    config_path: &Path,
    file: &Path,
    title: Option<String>,
    language: Option<String>,
    metadata: DocumentMetadata,
) -> Result<()> {
    let service = RagService::from_config(load_config(config_path)?).await?;

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let upload = Upload {
        title: title.unwrap_or_else(|| file_name.clone()),
        file_name,
        declared_type: None,
        language,
        metadata,
    };

    let handle = service.add_upload(upload, &bytes).await?;
    println!("{} Document {}", "→".blue(), handle.document_id().to_string().cyan());

    let report = handle.wait().await?;
    let state = match report.state {
        IngestionState::Persisted => report.state.to_string().green(),
        IngestionState::PartiallyPersisted => report.state.to_string().yellow(),
        _ => report.state.to_string().red(),
    };

    println!("  State:          {}", state.bold());
    println!("  Chunks:         {}", report.total_chunks);
    println!("  Written:        {}", report.written);
    println!("  Dropped Noise:  {}", report.dropped_noise);
    if !report.failed_indices.is_empty() {
        println!("  Failed Chunks:  {:?}", report.failed_indices);
    }
    if let Some(reason) = report.reason {
        println!("  Reason:         {}", reason);
    }

    Ok(())
}

async fn ask(
    config_path: &Path,
    question: String,
    document: Option<DocumentId>,
    locale: Option<Locale>,
) -> Result<()> {
    let service = RagService::from_config(load_config(config_path)?).await?;

    let mut request = AskRequest::new(question);
    request.document_id = document;
    request.locale = locale;

    let answer = service
        .ask_stream(request, |chunk| {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();
    println!();

    if answer.degraded {
        println!("{}", "Answered with a fallback".yellow());
    }
    for source in &answer.sources {
        println!(
            "{} {} #{} ({:.2})",
            "source".dimmed(),
            source.document_id,
            source.chunk_index,
            source.score
        );
    }

    Ok(())
}

async fn serve(config_path: &Path) -> Result<()> {
    let service = RagService::from_config(load_config(config_path)?).await?;
    let server = Server::new(service);

    println!("{} Listening on {}", "→".blue(), server.socket_path().cyan());
    server.start().await?;

    Ok(())
}
