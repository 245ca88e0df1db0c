//! CBZ packaging: turning a chapter's pages into a comic archive.

mod naming;
mod package;

pub use naming::{cbz_file_name, format_size, infer_extension, page_file_name};
pub use package::{
    ChapterPackager, DEFAULT_PAGE_DELAY, ImageFetcher, PackageError, PackagedChapter, pack_files,
};
