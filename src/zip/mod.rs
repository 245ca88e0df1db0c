//! Store-only ZIP archive construction.
//!
//! This module builds complete ZIP archives in memory from a list of named
//! byte buffers. It is the format used for CBZ comic archives, which are
//! plain ZIP files with a different extension.
//!
//! ## Architecture
//!
//! - [`crc32`](crc32()): table-driven CRC-32 over a byte buffer
//! - [`structures`]: the three record types and their byte encodings
//! - [`builder`]: entry validation, offset bookkeeping and buffer assembly
//!
//! ## ZIP Format Overview
//!
//! An archive written here consists of:
//! 1. A Local File Header followed by the raw data, for each entry
//! 2. The Central Directory, one record per entry, pointing back at the
//!    local headers
//! 3. The End of Central Directory (EOCD) record
//!
//! All integers are little-endian.
//!
//! ## Limitations
//!
//! - STORED only, no compression
//! - No ZIP64: archives and entries are limited to 4 GiB, 65534 entries
//! - No encryption, no multi-disk archives
//! - No reading

mod builder;
mod crc32;
mod error;
mod structures;

pub use builder::{ArchiveEntry, MAX_ENTRIES, MAX_NAME_LEN, archive_len, build_archive};
pub use crc32::{CRC32_TABLE, crc32, crc32_with_table};
pub use error::ArchiveError;
pub use structures::*;
