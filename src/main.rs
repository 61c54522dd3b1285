use std::{path::Path, sync::Arc};

use clap::Parser;
use docask::{
    ConfigDb,
    DataDir,
    Error,
    Result,
    Session,
    completion::AnthropicProvider,
    config_db::{self, API_KEY_ENV, MODEL_ENV},
    ingestion,
    mcp,
    session::Conversation,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, KeyAction, ModelAction, RetrievalArgs};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCASK_LOG") {
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

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    tracing::debug!(
        data_dir = %data_dir.root().display(),
        "using data directory"
    );
    let config_db = ConfigDb::open(&data_dir.config_db())?;
    let model_flag = cli.model.as_deref();

    match cli.command {
        Command::Chunks(args) => {
            cmd_chunks(&args.file, &args.retrieval, args.json)?;
        }
        Command::Context(args) => {
            let session = Session::new(
                args.retrieval.chunking(),
                args.retrieval.retrieval(),
            );
            session.load_file(&args.file)?;
            cmd_context(&session, &args.question, args.json)?;
        }
        Command::Ask(args) => {
            let session =
                build_session(&config_db, model_flag, &args.retrieval)?;
            session.load_file(&args.file)?;
            let answer =
                runtime()?.block_on(session.answer(&args.question, &[]))?;
            println!("{answer}");
        }
        Command::Chat(args) => {
            let session =
                build_session(&config_db, model_flag, &args.retrieval)?;
            if !session.is_configured() {
                return Err(Error::Unconfigured);
            }
            let summary = session.load_file(&args.file)?;
            eprintln!(
                "Loaded \"{}\" ({} pages, {} chunks). Empty line or /quit \
                 to exit, /reset to forget the conversation.",
                summary.name, summary.pages, summary.chunks
            );
            runtime()?.block_on(chat_loop(&session))?;
        }
        Command::Key { action } => match action {
            KeyAction::Set { key } => {
                config_db.set_api_key(&key)?;
                println!(
                    "API key stored in {}",
                    data_dir.config_db().display()
                );
            }
            KeyAction::Show => key_show(&config_db)?,
            KeyAction::Clear => {
                if config_db.clear_api_key()? {
                    println!("Removed stored API key");
                } else {
                    println!("No API key was stored");
                }
            }
        },
        Command::Model { action } => match action {
            ModelAction::Show { json } => {
                model_show(&config_db, model_flag, json)?
            }
            ModelAction::Set { model } => {
                config_db.set_model(&model)?;
                println!("Default model set to {}", model.trim());
            }
            ModelAction::Clear => {
                config_db.clear_model()?;
                println!("Model setting cleared");
            }
        },
        Command::Mcp(args) => {
            let session =
                build_session(&config_db, model_flag, &args.retrieval)?;
            drop(config_db);
            mcp::run_mcp(session)?;
        }
        Command::Completions(args) => {
            args.generate();
        }
    }

    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            Error::Config(format!("failed to start tokio runtime: {e}"))
        })
}

/// Build a session, installing a provider when an API key is available.
fn build_session(
    config_db: &ConfigDb,
    model_flag: Option<&str>,
    retrieval: &RetrievalArgs,
) -> Result<Session> {
    let session = Session::new(retrieval.chunking(), retrieval.retrieval());

    let key = config_db::resolve_api_key(
        std::env::var(API_KEY_ENV).ok(),
        Some(config_db),
    )?;
    match key {
        Some(key) => {
            let model = config_db::resolve_model(
                model_flag,
                std::env::var(MODEL_ENV).ok(),
                Some(config_db),
            )?;
            tracing::debug!(%model, "completion provider configured");
            let provider = AnthropicProvider::new(key, model);
            session.set_provider(Some(Arc::new(provider)));
        }
        None => {
            tracing::debug!("no API key configured");
        }
    }

    Ok(session)
}

fn cmd_chunks(
    file: &Path,
    retrieval: &RetrievalArgs,
    json: bool,
) -> Result<()> {
    let document = ingestion::read_document(file, &retrieval.chunking())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&document.chunks)?);
        return Ok(());
    }

    for chunk in &document.chunks {
        println!("--- chunk {} ({} chars) ---", chunk.index, chunk.char_len());
        println!("{}", chunk.text);
    }
    Ok(())
}

fn cmd_context(session: &Session, question: &str, json: bool) -> Result<()> {
    let context = session.context(question)?;

    if json {
        let output = serde_json::json!({
            "question": question,
            "keywords": context.keywords,
            "synonyms": context.synonym_additions(),
            "baseline": context.baseline,
            "selected": context.selected,
            "context": context.text,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let indices = context
        .indices()
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!("Keywords: {}", context.keywords.join(", "));
    println!("Synonyms: {}", context.synonym_additions().join(", "));
    println!(
        "Chunks:   {indices} ({} chars)",
        context.text.chars().count()
    );
    println!();
    println!("{}", context.text);
    Ok(())
}

async fn chat_loop(session: &Session) -> Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut conversation = Conversation::new();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        match question {
            "" | "/quit" => break,
            "/reset" => {
                conversation.clear();
                eprintln!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        match conversation.ask(session, question).await {
            Ok(answer) => {
                stdout.write_all(answer.as_bytes()).await?;
                stdout.write_all(b"\n\n").await?;
            }
            Err(e @ (Error::Unconfigured | Error::EmptyDocument)) => {
                return Err(e);
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}

fn key_show(config_db: &ConfigDb) -> Result<()> {
    if let Some(key) = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
    {
        println!("{} (from {API_KEY_ENV})", config_db::mask_secret(key.trim()));
        return Ok(());
    }

    match config_db.api_key()? {
        Some(key) => println!("{} (stored)", config_db::mask_secret(&key)),
        None => println!("No API key configured"),
    }
    Ok(())
}

fn model_show(
    config_db: &ConfigDb,
    model_flag: Option<&str>,
    json: bool,
) -> Result<()> {
    let env_value = std::env::var(MODEL_ENV).ok();
    let stored = config_db.model()?;
    let resolved = config_db::resolve_model(
        model_flag,
        env_value.clone(),
        Some(config_db),
    )?;

    let source = if model_flag.is_some_and(|m| !m.trim().is_empty()) {
        "cli"
    } else if env_value.as_deref().is_some_and(|m| !m.trim().is_empty()) {
        "env"
    } else if stored.is_some() {
        "config"
    } else {
        "default"
    };

    if json {
        let output = serde_json::json!({
            "model": resolved,
            "source": source,
            "stored": stored,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{resolved} ({source})");
    }
    Ok(())
}
