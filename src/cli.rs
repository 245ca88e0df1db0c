use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ClientConfig, DEFAULT_BASE_URL};

#[derive(Parser, Debug)]
#[command(name = "mangacbz")]
#[command(version)]
#[command(about = "Search manga and package chapters as CBZ archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  mangacbz search \"one piece\"                 search by title\n  \
  mangacbz info one_piece                     series details and chapters\n  \
  mangacbz download one_piece c001 -d cbz     package a chapter into ./cbz\n  \
  mangacbz pack *.png -o chapter.cbz          package local images\n  \
  mangacbz serve --port 5000                  run the HTTP API")]
pub struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub client: ClientArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Outbound HTTP settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Site to scrape
    #[arg(long, global = true, env = "MANGACBZ_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Attempts per request on timeouts, 429 and 5xx responses
    #[arg(long, global = true, default_value_t = 3)]
    pub max_retry: u32,

    /// Pause between page downloads, in milliseconds
    #[arg(long, global = true, value_name = "MS", default_value_t = 500)]
    pub page_delay: u64,
}

impl ClientArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.timeout),
            max_retry: self.max_retry,
            ..ClientConfig::default()
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search series by title
    Search {
        query: String,

        /// Result page, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Show a series' details and chapter list
    Info { manga_id: String },

    /// List the page images of a chapter
    Pages { manga_id: String, chapter_id: String },

    /// Download a chapter and package it as a CBZ archive
    Download {
        manga_id: String,
        chapter_id: String,

        /// Directory the archive is written to
        #[arg(short = 'd', long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Upload to catbox.moe instead of writing locally
        #[arg(long)]
        upload: bool,

        /// catbox.moe account hash used for uploads
        #[arg(long, env = "CATBOX_USER_HASH", hide_env_values = true)]
        catbox_user_hash: Option<String>,
    },

    /// Package local image files, in the given order, into a CBZ archive
    Pack {
        #[arg(required = true, value_name = "IMAGES")]
        images: Vec<PathBuf>,

        /// Archive to write
        #[arg(short = 'o', long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(short = 'p', long, env = "PORT", default_value_t = 5000)]
        port: u16,

        /// Upload archives to catbox.moe with this account hash instead of
        /// keeping them on disk
        #[arg(long, env = "CATBOX_USER_HASH", hide_env_values = true)]
        catbox_user_hash: Option<String>,

        /// Where archives are kept when they are not uploaded
        #[arg(long, value_name = "DIR", default_value = "downloads")]
        storage_dir: PathBuf,

        /// Hours a kept archive stays downloadable
        #[arg(long, value_name = "HOURS", default_value_t = 48)]
        retention_hours: u64,
    },
}
