//! The operations the CLI and the HTTP server both expose.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::cbz::{
    ChapterPackager, DEFAULT_PAGE_DELAY, ImageFetcher, PackagedChapter, cbz_file_name, format_size,
};
use crate::source::{MangaInfo, MangaSource, Page, SearchPage};
use crate::store::{ArchiveStore, is_catbox_file_url};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no archive store is configured")]
    NoStore,
    #[error("refusing to proxy {0}")]
    ForeignUrl(String),
}

/// Result of publishing a chapter archive
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CbzReport {
    pub success: bool,
    pub message: String,
    pub download_url: String,
    pub file_name: String,
    pub file_size: String,
    /// Pages the chapter lists, packed or not. Absent when an already
    /// stored archive was reused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_pages: Vec<usize>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct MangaService {
    source: Arc<dyn MangaSource>,
    fetcher: Arc<dyn ImageFetcher>,
    store: Option<Arc<dyn ArchiveStore>>,
    page_delay: Duration,
}

impl MangaService {
    pub fn new(source: Arc<dyn MangaSource>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            source,
            fetcher,
            store: None,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ArchiveStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<SearchPage> {
        let query = query.trim();
        if query.is_empty() {
            bail!("Query parameter is required");
        }
        self.source.search(query, page.max(1)).await
    }

    pub async fn info(&self, manga_id: &str) -> Result<MangaInfo> {
        self.source.fetch_info(manga_id).await
    }

    pub async fn pages(&self, manga_id: &str, chapter_id: &str) -> Result<Vec<Page>> {
        let chapter_id = relative_chapter_id(manga_id, chapter_id);
        self.source
            .fetch_pages(&format!("{manga_id}/{chapter_id}"))
            .await
    }

    /// Download a chapter's pages and pack them into a CBZ buffer
    pub async fn build_chapter(&self, manga_id: &str, chapter_id: &str) -> Result<PackagedChapter> {
        let pages = self.pages(manga_id, chapter_id).await?;
        let packager =
            ChapterPackager::new(self.fetcher.clone()).with_page_delay(self.page_delay);
        Ok(packager.package(&pages).await?)
    }

    /// Build a chapter archive and hand it to the store, reusing one the
    /// store still holds.
    ///
    /// `base_url` is this server's own origin; download links are made
    /// relative to it.
    pub async fn publish_chapter(
        &self,
        manga_id: &str,
        chapter_id: &str,
        base_url: &str,
    ) -> Result<CbzReport> {
        let store = self.store.as_ref().ok_or(ServiceError::NoStore)?;
        let file_name = chapter_file_name(manga_id, chapter_id);

        if let Some(stored) = store.lookup(&file_name).await? {
            info!(file_name, "reusing stored archive");
            return Ok(CbzReport {
                success: true,
                message: "CBZ file already exists".to_string(),
                download_url: store.download_link(&stored, base_url)?,
                file_name,
                file_size: format_size(stored.size),
                total_pages: None,
                skipped_pages: Vec::new(),
                created_at: stored.created_at,
                expires_at: stored.expires_at,
            });
        }

        let chapter = self.build_chapter(manga_id, chapter_id).await?;
        let total_pages = chapter.pages_total;
        let stored = store.put(&file_name, chapter.bytes).await?;

        Ok(CbzReport {
            success: true,
            message: "CBZ file created successfully".to_string(),
            download_url: store.download_link(&stored, base_url)?,
            file_name,
            file_size: format_size(stored.size),
            total_pages: Some(total_pages),
            skipped_pages: chapter.skipped,
            created_at: stored.created_at,
            expires_at: stored.expires_at,
        })
    }

    /// Fetch an uploaded archive back from the file host
    pub async fn fetch_stored(&self, url: &str) -> Result<Vec<u8>> {
        if !is_catbox_file_url(url) {
            return Err(ServiceError::ForeignUrl(url.to_string()).into());
        }
        self.fetcher.fetch_image(url, &BTreeMap::new()).await
    }
}

/// Archive file name for a chapter, e.g. `one_piece_c001.cbz`
pub fn chapter_file_name(manga_id: &str, chapter_id: &str) -> String {
    cbz_file_name(manga_id, relative_chapter_id(manga_id, chapter_id))
}

/// Chapter ids listed by a source may already carry the manga prefix.
fn relative_chapter_id<'a>(manga_id: &str, chapter_id: &'a str) -> &'a str {
    chapter_id
        .strip_prefix(manga_id)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(chapter_id)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::{ChapterSummary, MangaStatus, SearchResult};
    use crate::store::StoredArchive;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A source with one manga, `demo`, whose chapter `c001` has two pages,
    /// whose chapter `c002` has one page that cannot be downloaded and whose
    /// chapter `empty` has none.
    pub(crate) struct FakeSource {
        pub requested: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub(crate) fn new() -> Self {
            Self {
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MangaSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn search(&self, query: &str, page: u32) -> Result<SearchPage> {
            Ok(SearchPage {
                current_page: page,
                has_next_page: false,
                results: vec![SearchResult {
                    id: "demo".to_string(),
                    title: format!("Result for {query}"),
                    image: None,
                    description: String::new(),
                    status: MangaStatus::Ongoing,
                }],
            })
        }

        async fn fetch_info(&self, manga_id: &str) -> Result<MangaInfo> {
            if manga_id != "demo" {
                bail!("unknown manga {manga_id}");
            }
            Ok(MangaInfo {
                id: "demo".to_string(),
                title: "Demo".to_string(),
                description: String::new(),
                image: None,
                status: MangaStatus::Completed,
                genres: vec![],
                authors: vec![],
                chapters: vec![ChapterSummary {
                    id: "demo/c001".to_string(),
                    title: "Ch.001".to_string(),
                    chapter_number: Some(1.0),
                    released_date: None,
                }],
            })
        }

        async fn fetch_pages(&self, chapter_id: &str) -> Result<Vec<Page>> {
            self.requested.lock().unwrap().push(chapter_id.to_string());
            match chapter_id {
                "demo/c001" => Ok(vec![
                    Page {
                        page: 0,
                        img: "https://img/1.png".to_string(),
                        header_for_image: BTreeMap::new(),
                    },
                    Page {
                        page: 1,
                        img: "https://img/2.webp".to_string(),
                        header_for_image: BTreeMap::new(),
                    },
                ]),
                "demo/c002" => Ok(vec![
                    Page {
                        page: 0,
                        img: "https://img/1.png".to_string(),
                        header_for_image: BTreeMap::new(),
                    },
                    Page {
                        page: 1,
                        img: "https://img/gone.jpg".to_string(),
                        header_for_image: BTreeMap::new(),
                    },
                ]),
                "demo/empty" => Ok(vec![]),
                other => bail!("unknown chapter {other}"),
            }
        }
    }

    pub(crate) struct FakeFetcher(pub HashMap<String, Vec<u8>>);

    impl FakeFetcher {
        pub(crate) fn new() -> Self {
            Self(HashMap::from([
                ("https://img/1.png".to_string(), b"first".to_vec()),
                ("https://img/2.webp".to_string(), b"second".to_vec()),
                (
                    "https://files.catbox.moe/ab12.cbz".to_string(),
                    b"uploaded".to_vec(),
                ),
            ]))
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch_image(
            &self,
            url: &str,
            _headers: &BTreeMap<String, String>,
        ) -> Result<Vec<u8>> {
            match self.0.get(url) {
                Some(data) => Ok(data.clone()),
                None => bail!("HTTP 404 for {url}"),
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        archives: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl ArchiveStore for MemoryStore {
        async fn put(&self, file_name: &str, archive: Vec<u8>) -> Result<StoredArchive> {
            let size = archive.len() as u64;
            self.archives
                .lock()
                .unwrap()
                .insert(file_name.to_string(), archive);
            Ok(StoredArchive {
                file_name: file_name.to_string(),
                location: format!("mem://{file_name}"),
                size,
                created_at: Utc::now(),
                expires_at: None,
            })
        }

        async fn lookup(&self, file_name: &str) -> Result<Option<StoredArchive>> {
            Ok(self.archives.lock().unwrap().get(file_name).map(|a| StoredArchive {
                file_name: file_name.to_string(),
                location: format!("mem://{file_name}"),
                size: a.len() as u64,
                created_at: Utc::now(),
                expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            }))
        }

        fn download_link(&self, stored: &StoredArchive, base_url: &str) -> Result<String> {
            Ok(format!("{base_url}/download/{}", stored.file_name))
        }
    }

    pub(crate) fn service() -> MangaService {
        MangaService::new(Arc::new(FakeSource::new()), Arc::new(FakeFetcher::new()))
            .with_page_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn blank_queries_are_rejected() {
        assert!(service().search("   ", 1).await.is_err());
        let page = service().search(" one piece ", 0).await.unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.results[0].title, "Result for one piece");
    }

    #[tokio::test]
    async fn chapter_ids_are_joined_once() {
        let source = Arc::new(FakeSource::new());
        let service = MangaService::new(source.clone(), Arc::new(FakeFetcher::new()));
        service.pages("demo", "c001").await.unwrap();
        service.pages("demo", "demo/c001").await.unwrap();
        assert_eq!(*source.requested.lock().unwrap(), ["demo/c001", "demo/c001"]);
    }

    #[test]
    fn file_names_ignore_the_manga_prefix() {
        assert_eq!(chapter_file_name("demo", "c001"), "demo_c001.cbz");
        assert_eq!(chapter_file_name("demo", "demo/v01/c001"), "demo_v01_c001.cbz");
        assert_eq!(chapter_file_name("demo", "demon/c001"), "demo_demon_c001.cbz");
    }

    #[tokio::test]
    async fn builds_chapter_archives() {
        let chapter = service().build_chapter("demo", "c001").await.unwrap();
        assert_eq!(chapter.pages_packed, 2);

        let mut archive = ::zip::ZipArchive::new(std::io::Cursor::new(chapter.bytes)).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "001.png");
        assert_eq!(archive.by_index(1).unwrap().name(), "002.webp");
    }

    #[tokio::test]
    async fn publishing_needs_a_store() {
        let err = service()
            .publish_chapter("demo", "c001", "http://localhost")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::NoStore)
        ));
    }

    #[tokio::test]
    async fn publishing_reuses_stored_archives() {
        let service = service().with_store(Arc::new(MemoryStore::default()));

        let first = service
            .publish_chapter("demo", "c001", "http://localhost")
            .await
            .unwrap();
        assert_eq!(first.file_name, "demo_c001.cbz");
        assert_eq!(first.download_url, "http://localhost/download/demo_c001.cbz");
        assert_eq!(first.total_pages, Some(2));
        assert_eq!(first.message, "CBZ file created successfully");
        assert_eq!(first.expires_at, None);

        let second = service
            .publish_chapter("demo", "demo/c001", "http://localhost")
            .await
            .unwrap();
        assert_eq!(second.file_name, "demo_c001.cbz");
        assert_eq!(second.message, "CBZ file already exists");
        assert_eq!(second.total_pages, None);
        assert_eq!(second.file_size, first.file_size);
        assert!(second.expires_at.is_some_and(|at| at > second.created_at));
    }

    #[tokio::test]
    async fn reports_count_every_listed_page() {
        let service = service().with_store(Arc::new(MemoryStore::default()));
        let report = service
            .publish_chapter("demo", "c002", "http://localhost")
            .await
            .unwrap();
        assert_eq!(report.total_pages, Some(2));
        assert_eq!(report.skipped_pages, [2]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["skippedPages"], serde_json::json!([2]));
        assert!(json.get("expiresAt").is_none());
    }

    #[tokio::test]
    async fn only_catbox_files_are_proxied() {
        let service = service();
        assert_eq!(
            service
                .fetch_stored("https://files.catbox.moe/ab12.cbz")
                .await
                .unwrap(),
            b"uploaded"
        );
        let err = service.fetch_stored("http://localhost/secret").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::ForeignUrl(_))
        ));
    }
}
