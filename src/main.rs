//! Postrefs CLI - typed references between content records

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use postrefs::config::{self, PostrefsConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "postrefs")]
#[command(version)]
#[command(about = "Typed reference relationships between content records")]
#[command(long_about = r#"
Postrefs lets you declare named relation kinds between content types and
attach target records to source records:
  • A registry of reference definitions (source type, key, target types)
  • Per-record attachment lists stored as record meta
  • Reverse lookup: which records reference a given record
  • HTML rendering: inline [ref] tags, a sidebar widget, editor fields

Example usage:
  postrefs init
  postrefs types add article --label Articles
  postrefs refs upsert article related --target news --title "Related news"
  postrefs attach set 1 related 4 7
  postrefs find 7
  postrefs serve --port 8080
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (default: ./postrefs.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file, create the database and install default settings
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,

        /// Public base URL used for record links
        #[arg(long)]
        site_url: Option<String>,

        /// Port for `serve`
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage content types
    Types {
        #[command(subcommand)]
        command: TypesCommand,
    },

    /// Manage content records
    Records {
        #[command(subcommand)]
        command: RecordsCommand,
    },

    /// Manage reference definitions
    Refs {
        #[command(subcommand)]
        command: RefsCommand,
    },

    /// Read and write attachment lists
    Attach {
        #[command(subcommand)]
        command: AttachCommand,
    },

    /// Find records that reference a record
    Find {
        /// Target record id
        target: i64,

        /// Only consider referrers of these types
        #[arg(short, long = "type", value_delimiter = ',')]
        types: Vec<String>,

        /// Only published referrers
        #[arg(long)]
        published: bool,
    },

    /// Render a record's reference lists as HTML
    Render {
        /// Record id
        record: i64,

        /// Only this relation
        #[arg(short, long)]
        key: Option<String>,

        /// Render the record body with inline tags expanded instead
        #[arg(long)]
        body: bool,
    },

    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides the config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Show a sidebar widget for this relation key on record pages
        #[arg(long)]
        widget: Option<String>,

        /// Widget title
        #[arg(long, default_value = "References")]
        widget_title: String,
    },

    /// Run the removal hook (settings are kept)
    Uninstall,

    /// Show database statistics
    Stats,
}

#[derive(Subcommand)]
pub enum TypesCommand {
    /// Register a content type
    Add {
        name: String,

        /// Display label (defaults to the name)
        #[arg(short, long)]
        label: Option<String>,

        /// Hide the type from admin selectors
        #[arg(long)]
        hidden: bool,
    },

    /// List content types
    List {
        /// Include hidden types
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum RecordsCommand {
    /// Create a record
    Add {
        record_type: String,
        title: String,

        /// publish, draft, pending, private or trash
        #[arg(short, long, default_value = "publish")]
        status: String,

        /// Content body (may contain [ref] tags)
        #[arg(short, long, default_value = "")]
        body: String,
    },

    /// List records
    List {
        /// Only records of this type
        #[arg(short = 't', long = "type")]
        record_type: Option<String>,
    },

    /// Change a record's publish status
    Status { id: i64, status: String },

    /// Delete a record and its meta
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum RefsCommand {
    /// List definitions
    List {
        /// Only definitions for this source type
        #[arg(short = 't', long = "type")]
        source_type: Option<String>,

        /// Only definitions with this key
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Create or update the definition for (source type, key)
    Upsert {
        source_type: String,
        key: String,

        /// Allowed target types
        #[arg(short, long = "target", value_delimiter = ',', required = true)]
        targets: Vec<String>,

        /// Editor field title
        #[arg(long)]
        title: String,
    },

    /// Remove every definition matching (source type, key)
    Remove { source_type: String, key: String },

    /// Delete one definition by its id, as the settings screen does
    Delete { id: u64 },
}

#[derive(Subcommand)]
pub enum AttachCommand {
    /// Replace a record's list for one relation
    Set {
        record: i64,
        key: String,
        /// Target record ids, in display order
        targets: Vec<i64>,
    },

    /// Show a record's lists
    Get {
        record: i64,

        /// Only this relation
        #[arg(short, long)]
        key: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print a JSON success envelope
pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

/// Config plus the database it points at
pub struct Context {
    pub config: PostrefsConfig,
    pub config_path: PathBuf,
    /// Directory relative database paths are resolved against
    pub base_dir: PathBuf,
    pub database_path: PathBuf,
}

impl Context {
    fn resolve(config_path: Option<&Path>, database: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = config_path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
        let config = config::load_config(Some(&config_path))?.unwrap_or_default();
        let base = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let database_path = database
            .or_else(|| config.database.as_ref().map(|d| base.join(d)))
            .unwrap_or_else(|| config::default_database_path_in(&base));
        Ok(Self {
            config,
            config_path,
            base_dir: base,
            database_path,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let ctx = Context::resolve(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Init { force, site_url, port } => commands::run_init(output_mode, &ctx, force, site_url, port),
        Commands::Types { command } => commands::run_types(output_mode, &ctx, command),
        Commands::Records { command } => commands::run_records(output_mode, &ctx, command),
        Commands::Refs { command } => commands::run_refs(output_mode, &ctx, command),
        Commands::Attach { command } => commands::run_attach(output_mode, &ctx, command),
        Commands::Find { target, types, published } => commands::run_find(output_mode, &ctx, target, &types, published),
        Commands::Render { record, key, body } => commands::run_render(&ctx, record, key.as_deref(), body),
        Commands::Serve { port, widget, widget_title } => commands::run_serve(&ctx, port, widget, widget_title),
        Commands::Uninstall => commands::run_uninstall(output_mode, &ctx),
        Commands::Stats => commands::run_stats(output_mode, &ctx),
    }
}
