//! In-memory construction of store-only ZIP archives.
//!
//! Building happens in two passes over the entries: the first validates
//! names and sizes and lays out every offset, the second serialises into
//! a buffer allocated at its exact final size. Nothing is written unless
//! every entry is valid.

use tracing::debug;

use super::crc32::crc32;
use super::error::ArchiveError;
use super::structures::{CentralDirectoryEntry, EndOfCentralDirectory, LocalFileHeader};

/// Longest name a ZIP header can describe.
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// Most entries a non-ZIP64 archive can hold. `0xFFFF` itself is the
/// ZIP64 marker in the EOCD, so it is excluded.
pub const MAX_ENTRIES: usize = u16::MAX as usize - 1;

/// One file to be stored in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Relative path inside the archive; ASCII and unique within it.
    pub name: String,
    /// Uncompressed content, stored as-is.
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// An entry that passed validation, with its header and position.
struct PlannedEntry<'a> {
    header: LocalFileHeader<'a>,
    data: &'a [u8],
    lfh_offset: u32,
}

/// Build a complete ZIP archive holding `entries`, in order.
///
/// The layout is: one local header + data block per entry, then one
/// central directory record per entry, then the end-of-central-directory
/// record. Every entry is stored uncompressed with a zero timestamp, so
/// identical input always yields identical bytes.
///
/// # Errors
///
/// - [`ArchiveError::EmptyInput`] when `entries` is empty.
/// - [`ArchiveError::InvalidEntryName`] for an empty, non-ASCII or
///   over-long name.
/// - [`ArchiveError::EntryTooLarge`], [`ArchiveError::TooManyEntries`] or
///   [`ArchiveError::ArchiveTooLarge`] when the input needs ZIP64.
pub fn build_archive(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
    if entries.is_empty() {
        return Err(ArchiveError::EmptyInput);
    }
    if entries.len() > MAX_ENTRIES {
        return Err(ArchiveError::TooManyEntries(entries.len()));
    }
    let total_entries = entries.len() as u16;

    let mut planned = Vec::with_capacity(entries.len());
    let mut offset = 0u64;
    let mut cd_size = 0u64;

    for entry in entries {
        let name = validate_name(&entry.name)?;
        let size = fit_u32(entry.data.len() as u64).ok_or_else(|| ArchiveError::EntryTooLarge {
            name: entry.name.clone(),
            size: entry.data.len(),
        })?;
        let lfh_offset = fit_u32(offset).ok_or(ArchiveError::ArchiveTooLarge)?;

        let header = LocalFileHeader::stored(name, crc32(&entry.data), size);
        offset += (header.encoded_len() + entry.data.len()) as u64;
        cd_size += (CentralDirectoryEntry::SIZE + name.len()) as u64;

        planned.push(PlannedEntry {
            header,
            data: &entry.data,
            lfh_offset,
        });
    }

    // The local section ends where the central directory begins.
    let cd_offset = fit_u32(offset).ok_or(ArchiveError::ArchiveTooLarge)?;
    let cd_size = fit_u32(cd_size).ok_or(ArchiveError::ArchiveTooLarge)?;
    let total_len = usize::try_from(offset + cd_size as u64 + EndOfCentralDirectory::SIZE as u64)
        .map_err(|_| ArchiveError::ArchiveTooLarge)?;

    let mut out = Vec::with_capacity(total_len);

    for entry in &planned {
        entry.header.append_to(&mut out);
        out.extend_from_slice(entry.data);
    }

    for entry in &planned {
        CentralDirectoryEntry::for_local(&entry.header, entry.lfh_offset).append_to(&mut out);
    }

    out.extend_from_slice(
        &EndOfCentralDirectory::single_disk(total_entries, cd_size, cd_offset).to_bytes(),
    );

    debug_assert_eq!(out.len(), total_len);
    debug!(
        entries = entries.len(),
        bytes = out.len(),
        cd_offset,
        cd_size,
        "built archive"
    );

    Ok(out)
}

/// Exact size in bytes of the archive [`build_archive`] would produce.
pub fn archive_len(entries: &[ArchiveEntry]) -> u64 {
    let records: u64 = entries
        .iter()
        .map(|e| {
            let name = e.name.len() as u64;
            (LocalFileHeader::SIZE as u64 + name + e.data.len() as u64)
                + (CentralDirectoryEntry::SIZE as u64 + name)
        })
        .sum();
    records + EndOfCentralDirectory::SIZE as u64
}

fn validate_name(name: &str) -> Result<&[u8], ArchiveError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if !name.is_ascii() {
        Some("name is not ASCII")
    } else if name.len() > MAX_NAME_LEN {
        Some("name is longer than 65535 bytes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ArchiveError::InvalidEntryName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(name.as_bytes()),
    }
}

/// `0xFFFFFFFF` marks a ZIP64 field, so it is not a usable 32-bit value.
fn fit_u32(value: u64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v != u32::MAX)
}
