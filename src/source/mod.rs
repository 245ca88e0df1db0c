mod mangahere;
mod models;

pub use mangahere::MangaHere;
pub use models::{ChapterSummary, MangaInfo, MangaStatus, Page, SearchPage, SearchResult};

use anyhow::Result;
use async_trait::async_trait;

/// A site that can be searched and read from.
///
/// Each backend hides its own fetching and parsing strategy behind the
/// same three operations and record types.
#[async_trait]
pub trait MangaSource: Send + Sync {
    /// Display name of the backing site
    fn name(&self) -> &str;

    /// Search series by title. `page` is 1-based.
    async fn search(&self, query: &str, page: u32) -> Result<SearchPage>;

    /// Metadata and chapter list for a series
    async fn fetch_info(&self, manga_id: &str) -> Result<MangaInfo>;

    /// Ordered page images of a chapter, given as `{manga_id}/{chapter_id}`
    async fn fetch_pages(&self, chapter_id: &str) -> Result<Vec<Page>>;
}
