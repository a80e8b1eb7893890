//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::agent::RunMode;

/// Docent: ask questions about your documents.
///
/// Every question runs through retrieval, summarization, analysis and a
/// final review before the answer is printed with its sources.
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging and run traces).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Directory containing prompt template files.
    ///
    /// Overrides `DOCENT_PROMPT_DIR` and `~/.config/docent/prompts`.
    #[arg(long, global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// How several documents are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModeArg {
    /// Answer separately for each document.
    #[default]
    Independent,
    /// One answer drawing on every document.
    Comparative,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Independent => Self::Independent,
            ModeArg::Comparative => Self::Comparative,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question about one or more documents.
    ///
    /// Requires an API key in `OPENAI_API_KEY` or `DOCENT_API_KEY`.
    #[command(after_help = r#"Examples:
  docent ask "What is the main topic?" --doc report.txt
  docent ask "Compare the findings" --doc a.txt --doc b.txt --mode comparative
  docent ask "Summarize risks" --doc notes.md --top-k 8 --retries 2
  docent ask "Key dates?" --doc log.txt --export chat.md
  docent --format json ask "Who is involved?" --doc memo.txt | jq '.results[0].outcome.final_answer'
"#)]
    Ask {
        /// The question to answer.
        query: String,

        /// Plain-text document to query (repeat for several).
        #[arg(short = 'd', long = "doc", required = true)]
        docs: Vec<PathBuf>,

        /// How several documents are queried.
        #[arg(short, long, value_enum, default_value_t = ModeArg::Independent)]
        mode: ModeArg,

        /// Passages retrieved per run.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Per-call timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Retries per gateway call before falling back.
        #[arg(long)]
        retries: Option<u32>,

        /// Fail instead of answering with limited context when retrieval
        /// is unavailable.
        #[arg(long)]
        no_fallback: bool,

        /// Record the exchange in a transcript (`.md` for Markdown, JSON
        /// otherwise).
        ///
        /// A JSON transcript keeps earlier exchanges and gains one entry per
        /// run. A Markdown transcript is rewritten with this exchange only.
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Print a structured overview of a document.
    #[command(after_help = r#"Examples:
  docent digest report.txt
  docent --format json digest report.txt
"#)]
    Digest {
        /// Plain-text document to summarize.
        file: PathBuf,
    },

    /// Write default prompt templates to a directory for customization.
    ///
    /// Existing files are never overwritten.
    #[command(after_help = r#"Examples:
  docent init-prompts                      # ~/.config/docent/prompts
  docent init-prompts --dir ./my-prompts   # Custom directory
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_several_docs() {
        let cli = Cli::try_parse_from([
            "docent", "ask", "what?", "--doc", "a.txt", "-d", "b.txt", "--mode", "comparative",
            "--no-fallback",
        ])
        .unwrap_or_else(|_| unreachable!());
        match cli.command {
            Commands::Ask {
                docs,
                mode,
                no_fallback,
                ..
            } => {
                assert_eq!(docs.len(), 2);
                assert_eq!(RunMode::from(mode), RunMode::Comparative);
                assert!(no_fallback);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_ask_requires_doc() {
        assert!(Cli::try_parse_from(["docent", "ask", "what?"]).is_err());
    }

    #[test]
    fn test_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["docent", "digest", "a.txt", "--format", "json"])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(cli.format, "json");
    }
}
