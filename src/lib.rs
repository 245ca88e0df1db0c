//! # mangacbz
//!
//! A manga scraping proxy that packages chapters as CBZ archives.
//!
//! The heart of the crate is [`zip`], a dependency-free writer for
//! store-only ZIP archives with its own CRC-32. Around it sit a scraper for
//! the manga site ([`source`]), the chapter packager ([`cbz`]), archive
//! storage on disk or catbox.moe ([`store`]) and an HTTP API ([`server`]).
//!
//! ## Features
//!
//! - Search, series details and chapter page listing
//! - Chapter downloads packaged as CBZ, with failed pages skipped
//! - Archives written byte-exactly, every entry stored uncompressed
//! - Local storage with expiry, or upload to catbox.moe
//!
//! ## Example
//!
//! ```
//! use mangacbz::zip::{ArchiveEntry, archive_len, build_archive};
//!
//! let entries = vec![
//!     ArchiveEntry::new("001.jpg", vec![0xFF, 0xD8, 0xFF]),
//!     ArchiveEntry::new("002.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0]),
//! ];
//! let archive = build_archive(&entries)?;
//! assert_eq!(archive.len() as u64, archive_len(&entries));
//! assert_eq!(&archive[..4], b"PK\x03\x04");
//! # Ok::<(), mangacbz::zip::ArchiveError>(())
//! ```

pub mod cbz;
pub mod cli;
pub mod config;
pub mod http;
pub mod logs;
pub mod server;
pub mod service;
pub mod source;
pub mod store;
pub mod zip;

pub use cli::Cli;
pub use config::ClientConfig;
pub use http::HttpClient;
pub use service::{CbzReport, MangaService};
pub use crate::zip::{ArchiveEntry, ArchiveError, build_archive, crc32};
