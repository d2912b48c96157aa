use clap::{Parser, Subcommand};
use crossid_common::MediaKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crossid")]
#[command(author, version, about = "Resolve titles to external metadata provider ids")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve one title against the configured providers
    Resolve {
        /// Title to look up
        #[arg(required = true)]
        title: String,

        /// Original-language title, tried when the title finds nothing
        #[arg(long)]
        original_title: Option<String>,

        /// Release year
        #[arg(short, long)]
        year: Option<u16>,

        /// Catalog to search (movie or tv)
        #[arg(short, long, default_value = "movie")]
        kind: MediaKind,

        /// Only resolve against this provider (e.g. tmdb, imdb)
        #[arg(short, long)]
        provider: Option<String>,

        /// Already known id as source=id (repeatable)
        #[arg(long = "known", value_name = "SOURCE=ID")]
        known: Vec<String>,

        /// Fail instead of reporting a miss when a provider is unavailable
        #[arg(long)]
        strict: bool,

        /// Also fetch metadata, artwork and trailers for resolved ids
        #[arg(long)]
        details: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve every title in a file (one `title` or `title|year` per line)
    Batch {
        /// File with one title per line
        #[arg(required = true)]
        file: PathBuf,

        /// Catalog to search (movie or tv)
        #[arg(short, long, default_value = "movie")]
        kind: MediaKind,

        /// Pause the run when a provider is unavailable
        #[arg(long)]
        strict: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
