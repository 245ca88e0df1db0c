use thiserror::Error;

use super::builder::MAX_ENTRIES;

/// Reasons an archive cannot be built.
///
/// All of them are caller-input errors: retrying with the same entries
/// fails the same way.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot build an archive with no entries")]
    EmptyInput,
    #[error("invalid entry name {name:?}: {reason}")]
    InvalidEntryName { name: String, reason: &'static str },
    #[error("entry {name:?} is {size} bytes, over the 4 GiB limit of a ZIP entry")]
    EntryTooLarge { name: String, size: usize },
    #[error("{0} entries do not fit in a ZIP central directory (max {})", MAX_ENTRIES)]
    TooManyEntries(usize),
    #[error("archive content exceeds the 4 GiB offset limit")]
    ArchiveTooLarge,
}
