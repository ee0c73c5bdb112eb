use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use codeindex_core::{CodeIndexConfig, CONFIG_FILE_NAME};
use codeindex_lens::indexer::Progress;
use codeindex_tools::tools::{CodeIndexTools, IndexDirectoryParams, SearchCodeParams, ToolResponse};

#[derive(Parser)]
#[command(
    name = "codeindex",
    version,
    about = "Local semantic code search",
    long_about = "Index a project with local embeddings and search it in natural language.\n\n\
                   Examples:\n  \
                     codeindex index .                        Build the index for this project\n  \
                     codeindex search 'where is auth handled'  Search the nearest index\n  \
                     codeindex search 'retry logic' --rerank   Rescore results with an LLM\n  \
                     codeindex health                          Check the embedding backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .codeindex.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build or rebuild the index for a directory
    #[command(long_about = "Build or rebuild the index for a directory.\n\n\
        Walks the tree, splits files into overlapping chunks, embeds every chunk\n\
        and writes <dir>/.codeindex/index.json. Any previous index is replaced.\n\n\
        Examples:\n  codeindex index\n  codeindex index ../other-project")]
    Index {
        /// Directory to index (default: current directory)
        #[arg(default_value = ".")]
        path: String,
    },
    /// Search the nearest index
    #[command(long_about = "Search the nearest index at or above the current directory.\n\n\
        Results under the similarity threshold are dropped. With --rerank the\n\
        generation model scores the survivors and its score is blended in.\n\n\
        Examples:\n  codeindex search 'config parsing'\n  codeindex search 'token refresh' --top-k 3 --compact")]
    Search {
        /// Natural-language or code query
        query: String,

        /// Results to return (default: from config, 5)
        #[arg(long)]
        top_k: Option<i64>,

        /// Similarity threshold in [0, 1] (default: from config, 0.3)
        #[arg(long)]
        min_similarity: Option<f64>,

        /// Rescore results with the generation model
        #[arg(long)]
        rerank: bool,

        /// Print file and line citations only
        #[arg(long)]
        compact: bool,

        /// Cut each snippet to this many characters
        #[arg(long)]
        max_content_length: Option<usize>,
    },
    /// Show statistics for the nearest index
    Stats,
    /// Check that the embedding backend is reachable
    Health,
    /// Re-read the nearest index from disk
    Reload,
    /// Create a default .codeindex.toml configuration file
    #[command(long_about = "Create a default .codeindex.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .codeindex.toml already exists.")]
    Init,
}

const NO_INDEX_HELP: &str = "run `codeindex index <path>` to build an index first";

const DEFAULT_CONFIG: &str = r#"# codeindex configuration

[embedding]
# provider = "ollama"            # "ollama", "voyage" or "openai"
# model = "nomic-embed-text"
# base_url = "http://localhost:11434"
# api_key = ""                   # falls back to VOYAGE_API_KEY / OPENAI_API_KEY

[generation]
# provider = "ollama"            # "ollama" or "openai"
# model = "qwen2.5:1.5b"
# base_url = "http://localhost:11434"

[chunking]
# max_chunk_size = 1000
# overlap_size = 200

[indexing]
# skip_dirs = []                 # extra directory names to skip
# respect_gitignore = false
# max_file_bytes = 1048576
# embedding_concurrency = 1

[search]
# top_k = 5
# min_similarity = 0.3
# use_llm_rerank = false
# max_results_for_llm = 10
# similarity_weight = 0.4
# llm_weight = 0.6
# missing_llm_score = 0.5
"#;

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("codeindex v{version}: local semantic code search\n");

    println!("Quick start:");
    println!("  codeindex init                Create a .codeindex.toml config file");
    println!("  codeindex index .             Index the current project");
    println!("  codeindex search '<query>'    Search it\n");

    println!("All commands:");
    println!("  index     Build or rebuild an index");
    println!("  search    Semantic search with optional LLM reranking");
    println!("  stats     Index statistics");
    println!("  health    Check the embedding backend");
    println!("  reload    Re-read the index from disk");
    println!("  init      Create default configuration\n");

    println!("Run 'codeindex <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner() -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message("Walking project...");
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

/// Print a successful payload, or turn a failed one into a diagnostic.
fn finish(response: ToolResponse, help: Option<&str>) -> Result<()> {
    if !response.is_error {
        println!("{}", response.text.trim_end());
        return Ok(());
    }
    let mut diagnostic = miette::MietteDiagnostic::new(response.text);
    if let Some(help) = help {
        diagnostic = diagnostic.with_help(help);
    }
    Err(miette::Report::new(diagnostic))
}

fn load_tools(config_path: Option<&Path>, cwd: &Path) -> Result<CodeIndexTools> {
    let config = CodeIndexConfig::resolve(config_path, cwd)?;
    tracing::debug!(
        embedding = %config.embedding.model,
        generation = %config.generation.model,
        "configuration resolved"
    );
    Ok(CodeIndexTools::from_config(&config, cwd)?)
}

fn write_default_config(dir: &Path) -> Result<()> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        miette::bail!("{CONFIG_FILE_NAME} already exists");
    }
    std::fs::write(&path, DEFAULT_CONFIG).into_diagnostic()?;
    println!("Created {CONFIG_FILE_NAME} with default configuration");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir().into_diagnostic()?;

    let Some(command) = cli.command else {
        print_welcome();
        return Ok(());
    };

    match command {
        Command::Init => write_default_config(&cwd)?,
        Command::Index { path } => {
            let tools = load_tools(cli.config.as_deref(), &cwd)?;
            let spinner = spinner();
            let update = |message: &str| {
                if let Some(pb) = &spinner {
                    pb.set_message(message.to_string());
                }
            };
            let progress: Progress<'_> = &update;

            let response = tools
                .index_directory_with_progress(
                    IndexDirectoryParams { path: Some(path) },
                    Some(progress),
                )
                .await;

            if let Some(pb) = &spinner {
                if response.is_error {
                    pb.finish_with_message("Failed");
                } else {
                    pb.finish_and_clear();
                }
            }
            finish(
                response,
                Some("check that the directory exists and the embedding backend is up"),
            )?;
        }
        Command::Search {
            query,
            top_k,
            min_similarity,
            rerank,
            compact,
            max_content_length,
        } => {
            let tools = load_tools(cli.config.as_deref(), &cwd)?;
            let response = tools
                .search_code(SearchCodeParams {
                    query: Some(query),
                    top_k,
                    min_similarity,
                    use_rerank: rerank.then_some(true),
                    max_content_length,
                    compact: Some(compact),
                })
                .await;
            finish(response, Some(NO_INDEX_HELP))?;
        }
        Command::Stats => {
            let tools = load_tools(cli.config.as_deref(), &cwd)?;
            finish(tools.index_stats().await, None)?;
        }
        Command::Health => {
            let tools = load_tools(cli.config.as_deref(), &cwd)?;
            finish(
                tools.check_health().await,
                Some("start the backend (e.g. `ollama serve`) and pull the embedding model"),
            )?;
        }
        Command::Reload => {
            let tools = load_tools(cli.config.as_deref(), &cwd)?;
            finish(tools.reload_index().await, Some(NO_INDEX_HELP))?;
        }
    }

    Ok(())
}
