//! # RepoLens CLI (`repolens`)
//!
//! ## Usage
//!
//! ```bash
//! repolens --config ./config/repolens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repolens init` | Create the SQLite database and run schema migrations |
//! | `repolens analyze <url> --owner <user>` | Register a repository and run all pipelines |
//! | `repolens status <repo-id>` | Show the three pipeline statuses |
//! | `repolens ingest <repo-id>` | Re-run ingestion only |
//! | `repolens embed <repo-id>` | Re-run embedding only |
//! | `repolens summarize <repo-id>` | Re-run summarization only |
//! | `repolens chat <repo-id> "<question>"` | Ask a question about a repository |
//! | `repolens history <repo-id>` | Print the chat history |

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use repolens::chat;
use repolens::config;
use repolens::context::Services;
use repolens::embed;
use repolens::ingest;
use repolens::migrate;
use repolens::pipeline::{run_stage, PipelineSupervisor};
use repolens::summarize;
use repolens_core::models::{Repository, StatusField};

/// RepoLens: repository ingestion, embeddings, summaries and chat.
#[derive(Parser)]
#[command(name = "repolens", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/repolens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Register a GitHub repository and run ingestion, embedding and
    /// summarization. Waits for all three to finish.
    Analyze {
        /// Repository URL, e.g. `https://github.com/owner/name`.
        url: String,

        /// User the analysis belongs to.
        #[arg(long)]
        owner: String,
    },

    /// Show a repository's pipeline statuses.
    Status { repo_id: String },

    /// Re-run ingestion for a repository.
    Ingest { repo_id: String },

    /// Re-run embedding for a repository.
    Embed { repo_id: String },

    /// Re-run summarization for a repository.
    Summarize { repo_id: String },

    /// Ask a question about a repository.
    Chat { repo_id: String, question: String },

    /// Print a repository's chat history.
    History { repo_id: String },
}

fn print_status(repo: &Repository) {
    println!("{}  {}", repo.id, repo.url);
    for field in StatusField::ALL {
        println!("  {:<10} {}", field.to_string(), repo.status(field));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let services = Services::from_config(cfg).await?;

    match cli.command {
        Commands::Init => {}
        Commands::Analyze { url, owner } => {
            let mut supervisor = PipelineSupervisor::new(services.clone());
            let repo = supervisor.analyze(&url, &owner).await?;
            println!("Analyzing {} ({})", repo.url, repo.id);
            supervisor.wait_all().await;
            print_status(&services.repository(&repo.id).await?);
        }
        Commands::Status { repo_id } => {
            let repo = services.repository(&repo_id).await?;
            print_status(&repo);
            if let Some(summary_id) = &repo.summary_id {
                if let Some(summary) = services.store.get_summary(summary_id).await? {
                    println!("\nSummary ({}):\n{}", summary.complexity, summary.summary);
                    println!("\nArchitecture:\n{}", summary.architecture);
                    if !summary.potential_issues.is_empty() {
                        println!("\nPotential issues:");
                        for issue in &summary.potential_issues {
                            println!("  - {}", issue);
                        }
                    }
                }
            }
            println!("\nVectors: {}", services.store.count_vectors(&repo_id).await?);
        }
        Commands::Ingest { repo_id } => {
            services.repository(&repo_id).await?;
            let ok = run_stage(
                &services,
                &repo_id,
                StatusField::Structure,
                ingest::ingest_and_persist(&services, &repo_id),
            )
            .await;
            print_status(&services.repository(&repo_id).await?);
            if !ok {
                anyhow::bail!("ingestion failed");
            }
        }
        Commands::Embed { repo_id } => {
            services.repository(&repo_id).await?;
            let ok = run_stage(
                &services,
                &repo_id,
                StatusField::Embedding,
                embed::embed_repo(&services, &repo_id),
            )
            .await;
            print_status(&services.repository(&repo_id).await?);
            if !ok {
                anyhow::bail!("embedding failed");
            }
        }
        Commands::Summarize { repo_id } => {
            services.repository(&repo_id).await?;
            let ok = run_stage(
                &services,
                &repo_id,
                StatusField::Ai,
                summarize::summarize(&services, &repo_id),
            )
            .await;
            print_status(&services.repository(&repo_id).await?);
            if !ok {
                anyhow::bail!("summarization failed");
            }
        }
        Commands::Chat { repo_id, question } => {
            let answer = chat::chat(&services, &repo_id, &question).await?;
            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!("\nSources:");
                for (i, source) in answer.sources.iter().enumerate() {
                    println!("  {}. {}", i + 1, source);
                }
            }
        }
        Commands::History { repo_id } => {
            let messages = chat::history(&services, &repo_id).await?;
            if messages.is_empty() {
                println!("No chat history.");
            }
            for message in messages {
                println!(
                    "[{}] {}: {}",
                    message.created_at.format("%Y-%m-%d %H:%M:%S"),
                    message.role.as_str(),
                    message.content
                );
            }
        }
    }

    Ok(())
}
