//! # ChatMuse CLI (`chatmuse`)
//!
//! Chat with a PDF from the terminal or through the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! chatmuse [--config ./chatmuse.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chatmuse serve` | Start the HTTP chat server |
//! | `chatmuse chat <PDF>` | Chat about a PDF in the terminal |
//! | `chatmuse reset` | Drop the configured vector collection |
//!
//! Without `--config` every setting takes its default: Qdrant on
//! `localhost:6333`, Ollama on `localhost:11434`, local MiniLM embeddings.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatmuse::config;
use chatmuse::session::{ChatSession, Services};
use chatmuse::{chat_cmd, server};

/// ChatMuse: ask questions about a PDF and hear the answers.
#[derive(Parser)]
#[command(
    name = "chatmuse",
    about = "ChatMuse: chat with a PDF using local embeddings, Qdrant and Ollama",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server on `[server].bind`.
    Serve,

    /// Chat about a PDF in the terminal.
    ///
    /// Each input line is a question. `/clear`, `/save`, `/new <PDF>` and
    /// `/quit` control the session.
    Chat {
        /// PDF to load.
        pdf: PathBuf,
    },

    /// Drop the configured vector collection.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatmuse=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Chat { pdf } => {
            chat_cmd::run_chat(&cfg, &pdf).await?;
        }
        Commands::Reset => {
            let session = ChatSession::new(cfg.clone(), Services::from_config(&cfg)?);
            session.reset_collection().await?;
            println!("Collection '{}' reset.", cfg.store.collection);
        }
    }

    Ok(())
}
