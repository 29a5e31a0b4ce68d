use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use colored::Colorize;
use gridkv_server::{AppState, Engine, GridServer, ServerConfig};
use gridkv_store::Descriptor;
use tracing::{debug, info};

use crate::cli::*;

/// Database file used by the blob commands when neither `--db` nor the
/// config file names one.
pub const DEFAULT_DB_PATH: &str = "gridkv.redb";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Put(args) => cmd_put(&*open_engine(config)?, args, format),
        Command::Get(args) => cmd_get(&*open_engine(config)?, args),
        Command::Stat(args) => cmd_stat(&*open_engine(config)?, args, format),
        Command::Rm(args) => cmd_rm(&*open_engine(config)?, args, format),
        Command::Serve(args) => cmd_serve(config, args),
    }
}

/// Merge the config file with command-line overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.data_path = Some(db.clone());
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    Ok(config)
}

/// Open the engine for a one-shot blob command. These always use a
/// database file since an in-memory store would not outlive the process.
fn open_engine(mut config: ServerConfig) -> anyhow::Result<Arc<Engine>> {
    let path = config
        .data_path
        .get_or_insert_with(|| PathBuf::from(DEFAULT_DB_PATH))
        .clone();
    let state = AppState::from_config(&config)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(state.engine().clone())
}

fn cmd_put(engine: &Engine, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let source = args.file.display().to_string();
    let descriptor = store_file(engine, args)?;
    if let Some(id) = &descriptor.id {
        info!(id = %id, file = %source, bytes = descriptor.length, "file stored");
    }
    match format {
        OutputFormat::Json => print_json(&descriptor)?,
        OutputFormat::Text => {
            let id = descriptor.id.as_ref().map(|id| id.to_string()).unwrap_or_default();
            println!(
                "{} Stored {} as {}",
                "✓".green().bold(),
                descriptor.name.bold(),
                id.yellow()
            );
            println!(
                "  {} bytes in {} chunks",
                descriptor.length, descriptor.chunk_count
            );
        }
    }
    Ok(())
}

fn store_file(engine: &Engine, args: PutArgs) -> anyhow::Result<Descriptor> {
    let file = File::open(&args.file)
        .with_context(|| format!("opening {}", args.file.display()))?;
    let length = file.metadata()?.len();
    let name = args.name.unwrap_or_else(|| file_name(&args.file));
    let mime = args.mime.unwrap_or_else(|| guess_mime(&args.file).to_string());
    Ok(engine.create(name, mime, length, BufReader::new(file))?)
}

fn cmd_get(engine: &Engine, args: GetArgs) -> anyhow::Result<()> {
    let descriptor = engine.find(&args.id)?;
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let written = engine.stream_id(&args.id, BufWriter::new(file))?;
            eprintln!(
                "{} Wrote {} ({} bytes) to {}",
                "✓".green().bold(),
                descriptor.name.bold(),
                written,
                path.display()
            );
        }
        None => {
            let stdout = io::stdout();
            engine.stream_id(&args.id, stdout.lock())?;
        }
    }
    Ok(())
}

fn cmd_stat(engine: &Engine, args: StatArgs, format: OutputFormat) -> anyhow::Result<()> {
    let descriptor = engine.find(&args.id)?;
    match format {
        OutputFormat::Json => print_json(&descriptor)?,
        OutputFormat::Text => {
            println!("{}  {}", args.id.yellow().bold(), descriptor.name.bold());
            println!("  Type:    {}", descriptor.mime_type);
            println!("  Length:  {} bytes", descriptor.length);
            println!(
                "  Chunks:  {} x {} bytes",
                descriptor.chunk_count, descriptor.chunk_size
            );
            if let Some(created) = descriptor.created_at {
                println!("  Created: {}", created.to_rfc3339());
            }
            if let Some(hash) = &descriptor.content_hash {
                println!("  BLAKE3:  {}", hash.dimmed());
            }
        }
    }
    Ok(())
}

fn cmd_rm(engine: &Engine, args: RmArgs, format: OutputFormat) -> anyhow::Result<()> {
    engine.destroy_id(&args.id)?;
    info!(id = %args.id, "blob removed");
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "removed": args.id }))?,
        OutputFormat::Text => println!("{} Removed {}", "✓".green().bold(), args.id.yellow()),
    }
    Ok(())
}

fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind}"))?;
    }
    debug!(?config, "server configuration resolved");
    let server = GridServer::new(config)?;
    println!(
        "gridkv server on {} (backend: {})",
        server.config().bind_addr.to_string().bold(),
        server.state().engine().store().name()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
