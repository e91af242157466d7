//! CLI command definitions, routing, and tracing setup.

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use wikiscope_core::{ProgressReporter, RebuildOutcome, rebuild};
use wikiscope_shared::{
    ProjectKey, RebuildConfig, expand_path, init_config, load_config,
};
use wikiscope_storage::{IndexStore, WikiStore};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// WikiScope — map wiki categories to projects and their discussion scope.
#[derive(Parser)]
#[command(
    name = "wikiscope",
    version,
    about = "Rebuild and query the WikiProject scope index.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Rebuild the full project index from the wiki replica.
    Rebuild {
        /// Rows per bulk-insert statement.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Path to the wiki replica database (overrides config).
        #[arg(long)]
        wiki_db: Option<String>,

        /// Path to the index database (overrides config).
        #[arg(long)]
        index_db: Option<String>,
    },

    /// List the projects whose scope contains a discussion page.
    Projects {
        /// Exact prefixed page title, e.g. "Talk:Battle_of_Hastings".
        page: String,

        /// Path to the index database (overrides config).
        #[arg(long)]
        index_db: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "wikiscope=info",
        1 => "wikiscope=debug",
        _ => "wikiscope=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Rebuild {
            batch_size,
            wiki_db,
            index_db,
        } => cmd_rebuild(batch_size, wiki_db.as_deref(), index_db.as_deref()).await,
        Command::Projects { page, index_db } => cmd_projects(&page, index_db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_rebuild(
    batch_size: Option<usize>,
    wiki_db: Option<&str>,
    index_db: Option<&str>,
) -> Result<()> {
    let config = load_config()?;
    let mut rebuild_config = RebuildConfig::from(&config);
    if let Some(batch_size) = batch_size {
        rebuild_config.batch_size = batch_size;
    }

    let wiki_path = expand_path(wiki_db.unwrap_or(&config.stores.wiki_db))?;
    let index_path = expand_path(index_db.unwrap_or(&config.stores.index_db))?;

    info!(
        wiki_db = %wiki_path.display(),
        index_db = %index_path.display(),
        batch_size = rebuild_config.batch_size,
        "opening stores"
    );
    let wiki = WikiStore::open_readonly(&wiki_path, rebuild_config.query_timeout).await?;
    let index = IndexStore::open(&index_path, rebuild_config.query_timeout).await?;

    let progress = CliProgress::new();
    let outcome = rebuild(&rebuild_config, &wiki, &index, &progress).await?;

    println!(
        "Rebuilt index: {} records across {} projects in {} batches ({} unresolved keys, {:.1}s)",
        outcome.records,
        outcome.projects,
        outcome.batches,
        outcome.unresolved.len(),
        outcome.elapsed.as_secs_f64(),
    );
    Ok(())
}

async fn cmd_projects(page: &str, index_db: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let rebuild_config = RebuildConfig::from(&config);
    let index_path = expand_path(index_db.unwrap_or(&config.stores.index_db))?;

    let index = IndexStore::open(&index_path, rebuild_config.query_timeout).await?;
    let projects = index.projects_for_page(page).await?;

    if projects.is_empty() {
        println!("No projects claim {page}");
    } else {
        for project in projects {
            println!("{project}");
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    print!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Spinner-based progress display for the rebuild pipeline.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("progress template"));
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn bucket_resolved(&self, key: &ProjectKey, current: usize, total: usize) {
        self.bar.set_message(format!("[{current}/{total}] {key}"));
    }

    fn batch_written(&self, current: usize, total: usize) {
        self.bar.set_message(format!("staging batch {current}/{total}"));
    }

    fn done(&self, _outcome: &RebuildOutcome) {
        self.bar.finish_and_clear();
    }
}
