use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use search_mcp::search::DEFAULT_N_RESULTS;

#[derive(Debug, Parser)]
#[command(
    name = "search-mcp",
    about = "Semantic search across indexed folders, served over MCP"
)]
pub struct Cli {
    /// Override the XDG data directory holding the vector store
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to the folder configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the ColBERT model ID or local model path
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
    /// Start the MCP server on stdio
    Serve {
        /// Load the embedding model on the first search instead of at startup
        #[arg(long)]
        lazy_model: bool,
    },
    /// Run one search across the indexed folders
    Search(SearchArgs),
    /// List the folders available for search
    Directories {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration and index status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_N_RESULTS)]
    pub count: usize,

    /// Search only within this directory
    #[arg(short = 'd', long)]
    pub directory: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
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
            "search-mcp",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["search-mcp", "search", "hello"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "hello");
                assert_eq!(args.count, 5);
                assert!(args.directory.is_none());
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_search_with_directory() {
        let cli = Cli::parse_from([
            "search-mcp",
            "search",
            "ownership",
            "-n",
            "3",
            "-d",
            "/data/notes",
            "--json",
        ]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.count, 3);
                assert_eq!(args.directory.as_deref(), Some("/data/notes"));
                assert!(args.json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from([
            "search-mcp",
            "serve",
            "--lazy-model",
            "--config",
            "/etc/folders.json",
            "-vv",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/folders.json")));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Serve { lazy_model: true }));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let res = Cli::try_parse_from(["search-mcp", "-q", "-v", "directories"]);
        assert!(res.is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
