//! # notes-export CLI (`notex`)
//!
//! Convert note files into Notion blocks, save them to a Notion database,
//! and run the HTTP proxy used by the notes front-end.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `notex chunk <file>` | Print the paragraph chunks for a file |
//! | `notex blocks <file>...` | Print the Notion blocks for one or more notes |
//! | `notex save <file> --title T --database-id D` | Create a page from a note |
//! | `notex save <file> --page-id P` | Append a note to an existing page |
//! | `notex databases` | List databases shared with the integration |
//! | `notex whoami` | Show the connected workspace |
//! | `notex serve` | Start the HTTP server |
//!
//! Commands that talk to Notion read the token from `NOTION_TOKEN`.
//!
//! ## Examples
//!
//! ```bash
//! notex blocks notes/standup.md --mode markdown
//! NOTION_TOKEN=ntn_... notex save notes/standup.md --title "Standup" --database-id 1ac7...
//! notex serve --config ./config/notex.toml
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use notes_export::chunk::chunk_text;
use notes_export::config::{self, Config};
use notes_export::credentials::NotionCredentials;
use notes_export::export::{
    build_blocks, save_notes, DatabaseSchema, ExportMode, ExportOptions, ExportRequest, SaveTarget,
};
use notes_export::logging;
use notes_export::models::Note;
use notes_export::notion::{NotionApi, NotionClient};
use notes_export::server;
use std::io::Read;
use std::path::{Path, PathBuf};

/// notes-export — turn meeting notes into Notion pages.
#[derive(Parser)]
#[command(
    name = "notex",
    about = "notes-export — turn meeting notes into Notion pages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/notex.toml`. When the file does not exist,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/notex.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a note into paragraph chunks and print them as a JSON array.
    Chunk {
        /// Note file, or `-` for stdin.
        file: PathBuf,

        /// Maximum chunk length in characters (defaults to `export.max_chunk_chars`).
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Convert notes to Notion blocks and print them as JSON.
    Blocks {
        /// Note files, or `-` for stdin. Blocks are concatenated in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Export mode: `chunked`, `markdown`, or `flat`.
        #[arg(long)]
        mode: Option<String>,
    },

    /// Save a note to Notion.
    ///
    /// With `--database-id`, creates a new page in that database. With
    /// `--page-id`, appends to the existing page instead.
    Save {
        /// Note file, or `-` for stdin.
        file: PathBuf,

        /// Page title (used when creating a page).
        #[arg(long, default_value = "Meeting notes")]
        title: String,

        /// Target database ID.
        #[arg(long, required_unless_present = "page_id")]
        database_id: Option<String>,

        /// Existing page to append to.
        #[arg(long)]
        page_id: Option<String>,

        /// Name of the database's title property; looked up when omitted.
        #[arg(long)]
        title_property: Option<String>,

        /// Export mode: `chunked`, `markdown`, or `flat`.
        #[arg(long)]
        mode: Option<String>,
    },

    /// List databases shared with the integration.
    Databases,

    /// Show the workspace the token belongs to.
    Whoami,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

fn read_note(path: &Path) -> Result<Note> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read note: {}", path.display()))?
    };
    Ok(Note::new(text))
}

fn export_options(cfg: &Config, mode: Option<&str>) -> Result<ExportOptions> {
    let options = ExportOptions::from_config(&cfg.export)?;
    Ok(match mode {
        Some(m) => options.with_mode(m.parse::<ExportMode>()?),
        None => options,
    })
}

fn notion_client(cfg: &Config) -> Result<NotionClient> {
    NotionClient::new(&cfg.notion, NotionCredentials::from_env()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref())?;
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Chunk { file, max_chars } => {
            let note = read_note(&file)?;
            let max = max_chars.unwrap_or(cfg.export.max_chunk_chars);
            if max == 0 {
                bail!("--max-chars must be > 0");
            }
            let chunks = chunk_text(&note.text, max);
            println!("{}", serde_json::to_string_pretty(&chunks)?);
        }
        Commands::Blocks { files, mode } => {
            let notes = files
                .iter()
                .map(|f| read_note(f))
                .collect::<Result<Vec<_>>>()?;
            let options = export_options(&cfg, mode.as_deref())?;
            let blocks = build_blocks(&notes, &options)?;
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        Commands::Save {
            file,
            title,
            database_id,
            page_id,
            title_property,
            mode,
        } => {
            let note = read_note(&file)?;
            let options = export_options(&cfg, mode.as_deref())?;
            let target = match (page_id, database_id) {
                (Some(page_id), _) => SaveTarget::ExistingPage { page_id },
                (None, Some(database_id)) => SaveTarget::NewPage { database_id },
                (None, None) => bail!("Either --database-id or --page-id is required"),
            };
            let request = ExportRequest {
                title,
                content: note.text,
                database_schema: title_property.map(|name| DatabaseSchema {
                    title_property_name: name,
                }),
            };
            let client = notion_client(&cfg)?;
            let outcome = save_notes(&client, &request, &target, &options).await?;
            println!("Saved {} blocks to page {}", outcome.blocks_written, outcome.page_id);
            if let Some(url) = outcome.url {
                println!("{}", url);
            }
        }
        Commands::Databases => {
            let client = notion_client(&cfg)?;
            let databases = client.search_databases().await?;
            if databases.is_empty() {
                println!("No databases shared with this integration.");
            }
            for db in databases {
                println!("{}  {}", db.id, db.title);
            }
        }
        Commands::Whoami => {
            let client = notion_client(&cfg)?;
            let user = client.me().await?;
            let workspace = user.workspace();
            println!("Workspace: {}", workspace.name);
            if let Some(name) = user.name {
                println!("Integration: {}", name);
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
