//! Terminal chat (`chatmuse chat <PDF>`).
//!
//! Loads a PDF, then reads questions from stdin one line at a time. Lines
//! starting with `/` are commands:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `/clear` | Clear the conversation, keep the document |
//! | `/save` | Write the transcript into `[export].dir` |
//! | `/new <PDF>` | Start over with another document |
//! | `/quit` | Exit |

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::session::{AskOutcome, ChatSession, Services};

enum Command<'a> {
    Ask(&'a str),
    Clear,
    Save,
    New(&'a str),
    Quit,
    Unknown(&'a str),
}

fn parse_line(line: &str) -> Command<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line);
    };
    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    match name {
        "clear" => Command::Clear,
        "save" => Command::Save,
        "new" => Command::New(arg.trim()),
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(name),
    }
}

async fn load_document(session: &mut ChatSession, path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let summary = session.upload_pdf(&name, &bytes).await?;
    println!(
        "PDF processed: {} ({} pages, {} chunks). Ask away.",
        summary.source, summary.pages, summary.chunks
    );
    Ok(())
}

/// Run the interactive chat until `/quit` or end of input.
pub async fn run_chat(config: &Config, pdf: &Path) -> Result<()> {
    let services = Services::from_config(config)?;
    let mut session = ChatSession::new(config.clone(), services);
    load_document(&mut session, pdf).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            Command::Ask(question) => match session.ask(question).await {
                Ok(AskOutcome::Answered(turn)) => println!("{}\n", turn.answer),
                Ok(AskOutcome::Duplicate) => println!("(same question as before; skipped)"),
                Ok(AskOutcome::Ignored) => {}
                Err(e) => eprintln!("Error: {:#}", e),
            },
            Command::Clear => {
                session.clear_chat();
                println!("Chat history cleared.");
            }
            Command::Save => match session.save_history() {
                Ok(Some(path)) => println!("Saved {}", path.display()),
                Ok(None) => println!("Nothing to save yet."),
                Err(e) => eprintln!("Error: {:#}", e),
            },
            Command::New("") => println!("Usage: /new <PDF>"),
            Command::New(path) => {
                if let Err(e) = load_document(&mut session, Path::new(path)).await {
                    eprintln!("Error: {:#}", e);
                }
            }
            Command::Quit => break,
            Command::Unknown(name) => {
                println!("Unknown command /{}. Try /clear, /save, /new <PDF> or /quit.", name)
            }
        }
    }

    Ok(())
}
