use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use docask::{
    chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
    retrieval::{
        DEFAULT_BASELINE_CHARS,
        DEFAULT_MAX_CONTEXT_CHARS,
        RetrievalConfig,
    },
};

#[derive(Debug, Parser)]
#[command(
    name = "docask",
    about = "Ask questions about a long manual using lexical retrieval"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the completion model ID
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the chunks a document is split into
    Chunks(ChunksArgs),
    /// Show the context that would be sent for a question
    Context(ContextArgs),
    /// Answer a single question about a document
    Ask(AskArgs),
    /// Interactive question loop over a document
    Chat(ChatArgs),
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Manage the completion model configuration
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Start MCP server for AI agent integration
    Mcp(McpArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Retrieval knobs --

#[derive(Debug, Clone, Args)]
pub struct RetrievalArgs {
    /// Target chunk size in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Characters carried over between consecutive chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub overlap: usize,

    /// Characters reserved for the leading chunks of the document
    #[arg(long, default_value_t = DEFAULT_BASELINE_CHARS)]
    pub baseline_chars: usize,

    /// Maximum size of the assembled context in characters
    #[arg(long, default_value_t = DEFAULT_MAX_CONTEXT_CHARS)]
    pub max_context_chars: usize,
}

impl RetrievalArgs {
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }

    pub fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            baseline_chars: self.baseline_chars,
            max_context_chars: self.max_context_chars,
        }
    }
}

// -- Document commands --

#[derive(Debug, Parser)]
pub struct ChunksArgs {
    /// Document to load (.pdf, .txt or .md)
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,
}

#[derive(Debug, Parser)]
pub struct ContextArgs {
    /// Document to load (.pdf, .txt or .md)
    pub file: PathBuf,

    /// The question to retrieve context for
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,
}

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// Document to load (.pdf, .txt or .md)
    pub file: PathBuf,

    /// The question to answer
    pub question: String,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,
}

#[derive(Debug, Parser)]
pub struct ChatArgs {
    /// Document to load (.pdf, .txt or .md)
    pub file: PathBuf,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,
}

#[derive(Debug, Parser)]
pub struct McpArgs {
    #[command(flatten)]
    pub retrieval: RetrievalArgs,
}

// -- Key --

#[derive(Debug, Subcommand)]
pub enum KeyAction {
    /// Validate and store an API key in config.redb
    Set {
        /// Anthropic API key (starts with sk-)
        key: String,
    },
    /// Show the resolved API key, masked
    Show,
    /// Remove the stored API key
    Clear,
}

// -- Model --

#[derive(Debug, Subcommand)]
pub enum ModelAction {
    /// Show the currently resolved model
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a default model ID in config.redb
    Set {
        /// Model ID
        model: String,
    },
    /// Clear the stored model setting (revert to default)
    Clear,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docask",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_context_defaults() {
        let cli = Cli::parse_from(["docask", "context", "manual.pdf", "Jak?"]);
        match cli.command {
            Command::Context(args) => {
                assert_eq!(args.file, PathBuf::from("manual.pdf"));
                assert_eq!(args.question, "Jak?");
                assert!(!args.json);
                assert_eq!(
                    args.retrieval.chunking(),
                    ChunkingConfig::default()
                );
                assert_eq!(
                    args.retrieval.retrieval(),
                    RetrievalConfig::default()
                );
            }
            _ => panic!("expected context command"),
        }
    }

    #[test]
    fn parse_retrieval_overrides() {
        let cli = Cli::parse_from([
            "docask",
            "ask",
            "manual.txt",
            "filtr",
            "--chunk-size",
            "200",
            "--overlap",
            "0",
            "--max-context-chars",
            "1000",
        ]);
        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.retrieval.chunk_size, 200);
                assert_eq!(args.retrieval.overlap, 0);
                assert_eq!(
                    args.retrieval.baseline_chars,
                    DEFAULT_BASELINE_CHARS
                );
                assert_eq!(args.retrieval.max_context_chars, 1000);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "docask", "key", "show", "--data-dir", "/tmp/x", "-vv",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Key {
                action: KeyAction::Show
            }
        ));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["docask", "-q", "-v", "mcp"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
