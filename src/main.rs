//! rustcitations - Scholar profile citations and CV expertise search
//!
//! ## Usage
//!
//! ### Harvest a profile
//! ```bash
//! rustcitations citations "https://scholar.google.com/citations?hl=en&user=wWlI9XMAAAAJ"
//! ```
//!
//! ### Search faculty CVs
//! ```bash
//! rustcitations expertise --query "light-based methods to observe blood flow in the brain"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustcitations::cookies::{parse_cookies, CookieManager};
use rustcitations::expertise::{self, ExpertiseIndex};
use rustcitations::export;
use rustcitations::llm::{ChatClient, EmbeddingClient, LlmConfig, DEFAULT_BASE_URL};
use rustcitations::loader::{load_all, LoaderConfig, Termination};
use rustcitations::profile::{ProfilePage, ProfileQuery};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Scholar profile citation harvester and CV expertise search
#[derive(Parser)]
#[command(name = "rustcitations")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every publication of a Scholar profile and save titles and citations
    Citations {
        /// Profile URL or Scholar user id
        target: String,

        /// Output CSV file
        #[arg(short, long, default_value = "scholar_data.csv")]
        output: PathBuf,

        /// Consecutive "show more" clicks without new rows before giving up
        #[arg(long, default_value = "10")]
        max_tries: u32,

        /// Seconds to pause between fault retries. Profile pages are read
        /// over HTTP and never wait after a click.
        #[arg(long, default_value = "2")]
        settle_secs: u64,

        /// Consecutive transient faults to retry
        #[arg(long, default_value = "3")]
        fault_retries: u32,

        /// Rows requested per page (max 100)
        #[arg(long, default_value = "100")]
        page_size: u32,

        /// Mirror site URL
        #[arg(long)]
        mirror: Option<String>,

        /// Proxy URL (e.g., http://127.0.0.1:7890)
        #[arg(long)]
        proxy: Option<String>,

        /// Write every parsed column instead of Title,Citations
        #[arg(long)]
        detailed: bool,

        /// Do not print the publication listing
        #[arg(short, long)]
        quiet: bool,

        /// Exit successfully even if loading stopped on a fault
        #[arg(long)]
        allow_partial: bool,
    },

    /// Find faculty whose CVs match a research interest
    Expertise {
        /// Expertise you are looking for
        #[arg(
            long,
            default_value = "light-based methods to observe and measure blood flow in the living brain"
        )]
        query: String,

        /// Faculty directory CSV
        #[arg(long, default_value = "Data.csv")]
        faculty: PathBuf,

        /// JSON object mapping "<name> CV.pdf" to CV text
        #[arg(long, default_value = "CV.json")]
        cvs: PathBuf,

        /// Directory holding the embedding index
        #[arg(long, default_value = "./expertise_index")]
        index_dir: PathBuf,

        /// Number of matches
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Rebuild the index even if one exists
        #[arg(long)]
        rebuild: bool,

        /// LLM API base URL
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        llm_base_url: String,

        /// LLM API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        llm_key: Option<String>,

        /// Chat model used for match summaries
        #[arg(long, default_value = "o1-mini")]
        llm_model: String,

        /// Embedding model used for the index
        #[arg(long, default_value = "text-embedding-ada-002")]
        embedding_model: String,
    },

    /// Manage cookies
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Subcommand)]
enum CookieAction {
    /// Clear stored cookies
    Clear,
    /// Show cookie file path
    Path,
    /// Import cookies exported from a browser (JSON array; stdin if no file)
    Import {
        /// JSON file with cookies
        file: Option<PathBuf>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Citations {
            target,
            output,
            max_tries,
            settle_secs,
            fault_retries,
            page_size,
            mirror,
            proxy,
            detailed,
            quiet,
            allow_partial,
        } => {
            let mut query = ProfileQuery::from_target(&target)?;
            query.page_size = page_size;
            query.proxy = proxy;
            if let Some(mirror) = mirror {
                query.base_url = mirror.trim_end_matches('/').to_string();
            }

            let config = LoaderConfig::new(max_tries)?
                .with_settle(Duration::from_secs(settle_secs))
                .with_max_fault_retries(fault_retries);

            run_citations(query, config, output, detailed, quiet, allow_partial).await
        }
        Commands::Expertise {
            query,
            faculty,
            cvs,
            index_dir,
            top_k,
            rebuild,
            llm_base_url,
            llm_key,
            llm_model,
            embedding_model,
        } => {
            let api_key = llm_key.context("OpenAI API key is not set (use --llm-key or OPENAI_API_KEY)")?;
            let embedder = EmbeddingClient::new(LlmConfig {
                base_url: llm_base_url.clone(),
                api_key: api_key.clone(),
                model: embedding_model,
            })?;
            let chat = ChatClient::new(LlmConfig {
                base_url: llm_base_url,
                api_key,
                model: llm_model,
            })?;

            let index = ExpertiseIndex::open_or_build(
                &index_dir,
                &embedder,
                || expertise::load_directory(&faculty, &cvs),
                rebuild,
            )
            .await
            .context("Failed to open expertise index")?;

            println!("Searching {} CVs with {}...", index.len(), chat.model());
            let matches = expertise::search(&index, &embedder, &chat, &query, top_k).await?;
            println!("{}", expertise::format_report(&query, &matches));
            Ok(())
        }
        Commands::Cookies { action } => handle_cookies(action),
    }
}

// ============================================================================
// Citations
// ============================================================================

async fn run_citations(
    query: ProfileQuery,
    config: LoaderConfig,
    output: PathBuf,
    detailed: bool,
    quiet: bool,
    allow_partial: bool,
) -> Result<()> {
    let mut page = ProfilePage::open(query)
        .await
        .context("Failed to open Scholar profile")?;

    if let Some(name) = page.author_name() {
        println!("Profile: {}", name);
    }

    let outcome = load_all(&mut page, &config).await;
    let publications = page.publications()?;
    drop(page);

    info!(
        publications = publications.len(),
        activations = outcome.activations,
        "Profile loaded"
    );

    if !quiet {
        println!("{}", export::render_listing(&publications));
    }

    if detailed {
        export::save_detailed_csv(&output, &publications)?;
    } else {
        export::save_citations_csv(&output, &publications)?;
    }
    println!("Data saved to {}", output.display());

    match outcome.termination {
        Termination::Faulted(err) if !allow_partial => {
            Err::<(), _>(err).context("Loading stopped early; saved rows may be incomplete")
        }
        Termination::Faulted(err) => {
            warn!(error = %err, "Loading stopped early; saved rows may be incomplete");
            Ok(())
        }
        Termination::StallLimitReached => {
            warn!("Gave up after repeated clicks added no rows");
            Ok(())
        }
        Termination::ControlAbsent | Termination::ControlDisabled => Ok(()),
    }
}

// ============================================================================
// Cookie Management
// ============================================================================

fn handle_cookies(action: CookieAction) -> Result<()> {
    let manager = CookieManager::new()?;

    match action {
        CookieAction::Clear => {
            manager.clear()?;
            println!("Cookies cleared.");
        }
        CookieAction::Path => {
            println!("Cookie file: {:?}", manager.path());
        }
        CookieAction::Import { file } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    println!("Paste cookies as JSON, then press Ctrl-D:");
                    println!("Format: [{{\"name\":\"NID\",\"value\":\"xxx\",\"domain\":\".google.com\"}},...]");
                    let mut input = String::new();
                    std::io::stdin().read_to_string(&mut input)?;
                    input
                }
            };

            let cookies = parse_cookies(content.trim()).context("Invalid cookie JSON")?;
            manager.save(&cookies)?;
            println!("Saved {} cookies to {:?}", cookies.len(), manager.path());
        }
    }

    Ok(())
}
