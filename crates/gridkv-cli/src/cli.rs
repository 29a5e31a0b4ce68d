use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gridkv",
    about = "Chunked blob storage on an ordered key-value store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// redb database file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Chunk size in bytes for new blobs
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a file as a new blob
    Put(PutArgs),
    /// Write a blob's bytes to a file or stdout
    Get(GetArgs),
    /// Show a blob's descriptor
    Stat(StatArgs),
    /// Delete a blob
    Rm(RmArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub file: PathBuf,
    /// Stored name (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,
    /// Stored mime type (guessed from the extension when absent)
    #[arg(long)]
    pub mime: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub id: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct StatArgs {
    pub id: String,
}

#[derive(Args)]
pub struct RmArgs {
    pub id: String,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address, overriding the config file
    #[arg(long)]
    pub bind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_put() {
        let cli = Cli::try_parse_from(["gridkv", "put", "photo.jpg"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("photo.jpg"));
            assert!(args.name.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_put_with_overrides() {
        let cli = Cli::try_parse_from([
            "gridkv", "put", "a.bin", "--name", "sample.jpg", "--mime", "image/jpg",
        ])
        .unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.name.as_deref(), Some("sample.jpg"));
            assert_eq!(args.mime.as_deref(), Some("image/jpg"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_get_with_output() {
        let cli = Cli::try_parse_from(["gridkv", "get", "abc", "-o", "out.bin"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.id, "abc");
            assert_eq!(args.output, Some(PathBuf::from("out.bin")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gridkv",
            "stat",
            "abc",
            "--db",
            "blobs.redb",
            "--format",
            "json",
            "--chunk-size",
            "1024",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("blobs.redb")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.chunk_size, Some(1024));
        assert!(cli.verbose);
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["gridkv", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind.as_deref(), Some("0.0.0.0:9000"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_rm_requires_id() {
        assert!(Cli::try_parse_from(["gridkv", "rm"]).is_err());
    }

    #[test]
    fn format_rejects_unknown() {
        assert!(Cli::try_parse_from(["gridkv", "stat", "x", "--format", "yaml"]).is_err());
    }
}
